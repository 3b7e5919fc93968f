//! Payment and checkout status enums.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Payment status reported by the merchant backend for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// The payment is captured. The only status that settles a checkout.
    Succeeded,
    /// The customer must complete an out-of-band authentication step.
    RequiresAction,
    /// The payment method was declined; another one is needed.
    RequiresPaymentMethod,
    /// The payment failed.
    Failed,
    /// The payment is still being processed.
    Pending,
}

impl PaymentStatus {
    /// The wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::RequiresAction => "requires_action",
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::Failed => "failed",
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(Self::Succeeded),
            "requires_action" => Ok(Self::RequiresAction),
            "requires_payment_method" => Ok(Self::RequiresPaymentMethod),
            "failed" => Ok(Self::Failed),
            "pending" => Ok(Self::Pending),
            _ => Err(format!("unknown payment status: {s}")),
        }
    }
}

/// State of a checkout attempt.
///
/// ```text
/// Idle -> FormValid -> TokenizingPayment -> ConfirmingWithBackend -> Settled
///            |                |                     |
///            v                v                     +-> RequiresAdditionalAuth -> Settled | Failed
///          Idle             Failed                  +-> Failed
/// ```
///
/// `Settled` and `Failed` end the attempt; the next attempt starts again from
/// `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    #[default]
    Idle,
    FormValid,
    TokenizingPayment,
    ConfirmingWithBackend,
    RequiresAdditionalAuth,
    Settled,
    Failed,
}

impl CheckoutStatus {
    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle | Self::Settled | Self::Failed, Self::Idle)
                | (Self::Idle, Self::FormValid)
                | (Self::FormValid, Self::Idle | Self::TokenizingPayment)
                | (
                    Self::TokenizingPayment,
                    Self::ConfirmingWithBackend | Self::Failed
                )
                | (
                    Self::ConfirmingWithBackend,
                    Self::Settled | Self::RequiresAdditionalAuth | Self::Failed
                )
                | (Self::RequiresAdditionalAuth, Self::Settled | Self::Failed)
        )
    }

    /// Whether the attempt has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Failed)
    }

    /// Whether a network step is in progress. Submission is disabled while
    /// this holds.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(
            self,
            Self::TokenizingPayment | Self::ConfirmingWithBackend | Self::RequiresAdditionalAuth
        )
    }
}

impl fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FormValid => "form_valid",
            Self::TokenizingPayment => "tokenizing_payment",
            Self::ConfirmingWithBackend => "confirming_with_backend",
            Self::RequiresAdditionalAuth => "requires_additional_auth",
            Self::Settled => "settled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
