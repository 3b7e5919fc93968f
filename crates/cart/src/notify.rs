//! User-facing notices derived from cart and checkout outcomes.
//!
//! Whether and how to show them is up to the front end; the helpers here
//! only turn outcomes into messages with a consistent severity.

use tracing::{error, info, warn};

use crate::checkout::{CheckoutError, CheckoutOutcome};
use crate::error::CartError;
use crate::reconcile::ReconcileReport;
use crate::service::MutationOutcome;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Receives notices (toast, status line, log).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Sink that writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => info!(message = %notice.message, "Notice"),
            NoticeLevel::Warning => warn!(message = %notice.message, "Notice"),
            NoticeLevel::Error => error!(message = %notice.message, "Notice"),
        }
    }
}

/// One warning per line the backend corrected or removed.
#[must_use]
pub fn notices_for_report(report: &ReconcileReport) -> Vec<Notice> {
    report
        .changes
        .iter()
        .map(|change| Notice::new(NoticeLevel::Warning, change.to_string()))
        .collect()
}

/// Notices for a cart mutation.
#[must_use]
pub fn notices_for_mutation(outcome: &MutationOutcome) -> Vec<Notice> {
    match outcome {
        MutationOutcome::Unchanged | MutationOutcome::Pending => Vec::new(),
        MutationOutcome::Changed => vec![Notice::new(NoticeLevel::Success, "Cart updated")],
        MutationOutcome::Corrected(report) => notices_for_report(report),
    }
}

/// Notices for a failed cart operation.
#[must_use]
pub fn notices_for_cart_error(err: &CartError) -> Vec<Notice> {
    match err {
        CartError::NeedsReview(report) => {
            let mut notices = vec![Notice::new(NoticeLevel::Warning, err.user_message())];
            notices.extend(notices_for_report(report));
            notices
        }
        CartError::Empty | CartError::Stale => {
            vec![Notice::new(NoticeLevel::Info, err.user_message())]
        }
        CartError::Transport(_) | CartError::Rejected(_) | CartError::Protocol(_) => {
            vec![Notice::new(NoticeLevel::Error, err.user_message())]
        }
    }
}

/// Notice for a finished checkout attempt.
#[must_use]
pub fn notice_for_checkout(outcome: &CheckoutOutcome) -> Notice {
    match outcome {
        CheckoutOutcome::Settled {
            order_id: Some(order_id),
            ..
        } => Notice::new(
            NoticeLevel::Success,
            format!("Payment successful. Your order number is {order_id}."),
        ),
        CheckoutOutcome::Settled { order_id: None, .. } => {
            Notice::new(NoticeLevel::Success, "Payment successful.")
        }
        CheckoutOutcome::Failed { message, .. } => Notice::new(NoticeLevel::Error, message.clone()),
    }
}

/// Notices for a checkout that did not start.
#[must_use]
pub fn notices_for_checkout_error(err: &CheckoutError) -> Vec<Notice> {
    match err {
        CheckoutError::InProgress => vec![Notice::new(
            NoticeLevel::Info,
            "Your payment is already being processed.",
        )],
        CheckoutError::InvalidForm(field) => {
            vec![Notice::new(NoticeLevel::Warning, field.to_string())]
        }
        CheckoutError::Cart(err) => notices_for_cart_error(err),
    }
}
