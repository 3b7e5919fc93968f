//! Error types for the payment gateway.

use thiserror::Error;

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway rejected the customer's input (bad card number, declined
    /// card, failed authentication). The message comes from the gateway and
    /// is meant for the customer.
    #[error("{message}")]
    Client {
        /// Gateway error code, if any.
        code: Option<String>,
        /// Customer-facing message.
        message: String,
    },

    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a 5xx.
    #[error("payment gateway unavailable (status {0})")]
    Unavailable(u16),

    /// The gateway answered with something we could not interpret.
    #[error("unexpected gateway response: {0}")]
    Protocol(String),

    /// The customer did not complete the authentication challenge in time.
    #[error("authentication challenge timed out")]
    ChallengeTimedOut,

    /// The gateway asked for an authentication step this client cannot
    /// perform.
    #[error("unsupported authentication challenge: {0}")]
    UnsupportedChallenge(String),

    /// The gateway client is missing required configuration.
    #[error("payment gateway not configured: {0}")]
    NotConfigured(String),
}

impl GatewayError {
    /// Whether the failure was caused by customer input rather than by the
    /// gateway or the network.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Client { .. } | Self::ChallengeTimedOut)
    }

    /// Whether the gateway could not be reached.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Unavailable(_))
    }

    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Client { message, .. } => message.clone(),
            Self::Http(_) | Self::Unavailable(_) => {
                "The payment service could not be reached. Please try again.".to_string()
            }
            Self::ChallengeTimedOut => {
                "Payment authentication was not completed in time.".to_string()
            }
            Self::UnsupportedChallenge(_) => {
                "Your bank requires a verification step this app cannot complete.".to_string()
            }
            Self::Protocol(_) | Self::NotConfigured(_) => {
                "Payment could not be processed. Please try again later.".to_string()
            }
        }
    }
}
