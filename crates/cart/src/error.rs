//! Cart error types.

use thiserror::Error;

use crate::backend::BackendError;
use crate::reconcile::ReconcileReport;

/// Errors returned by cart operations that talk to the backend.
#[derive(Debug, Error)]
pub enum CartError {
    /// The backend was unreachable or answered with a 5xx. The cart was
    /// left unchanged; the caller may retry.
    #[error("backend unavailable: {0}")]
    Transport(#[source] BackendError),

    /// The backend refused the validation request itself (4xx).
    #[error("validation rejected: {0}")]
    Rejected(#[source] BackendError),

    /// The backend answered with something we could not interpret.
    #[error("unexpected validation response: {0}")]
    Protocol(String),

    /// Checkout needs at least one line.
    #[error("cart is empty")]
    Empty,

    /// The cart changed while it was being validated.
    #[error("cart changed during validation")]
    Stale,

    /// Validation corrected or removed lines; the user has to look at the
    /// cart again before paying.
    #[error("cart was updated and needs review ({} change(s))", .0.changes.len())]
    NeedsReview(ReconcileReport),
}

impl From<BackendError> for CartError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Malformed(message) => Self::Protocol(message),
            err if err.is_transport() => Self::Transport(err),
            err => Self::Rejected(err),
        }
    }
}

impl CartError {
    /// Whether retrying the same operation may succeed without the user
    /// changing anything.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Stale | Self::NeedsReview(_))
    }

    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => {
                "Could not check your cart with the store. Please try again.".to_string()
            }
            Self::Rejected(err) => err.user_message(),
            Self::Protocol(_) => "The store sent an unexpected response.".to_string(),
            Self::Empty => "Your cart is empty.".to_string(),
            Self::Stale => "Your cart changed. Please review it and try again.".to_string(),
            Self::NeedsReview(_) => {
                "Some items in your cart were updated. Please review them before paying."
                    .to_string()
            }
        }
    }
}
