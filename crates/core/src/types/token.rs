//! Opaque payment references.
//!
//! Both types wrap values issued by the payment gateway or the merchant
//! backend. They are never parsed, only passed along.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Single-use reference to a tokenized payment method.
///
/// Raw card data stays with the gateway; the merchant backend only ever sees
/// this token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMethodToken(String);

impl PaymentMethodToken {
    /// Wrap a token issued by the gateway.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// The token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentMethodToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque value that lets the client finish a pending authentication
/// challenge with the gateway.
///
/// Implements `Debug` manually so the secret never lands in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationSecret(String);

impl ContinuationSecret {
    /// Wrap a secret returned by the backend.
    #[must_use]
    pub const fn new(secret: String) -> Self {
        Self(secret)
    }

    /// Expose the secret for handing it to the gateway.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContinuationSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContinuationSecret([REDACTED])")
    }
}
