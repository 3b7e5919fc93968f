//! Error types for the merchant backend client.

use thiserror::Error;

/// Errors that can occur when talking to the merchant backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Whether the failure is a transport failure: the backend was
    /// unreachable or answered with a 5xx.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Malformed(_) => false,
        }
    }

    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { status, message } if *status < 500 && !message.is_empty() => {
                message.clone()
            }
            Self::Http(_) | Self::Status { .. } => {
                "The store could not be reached. Please try again.".to_string()
            }
            Self::Malformed(_) => "The store sent an unexpected response.".to_string(),
        }
    }
}
