//! Payment gateway collaborator.
//!
//! The gateway turns raw card input into a single-use token, so card data
//! never reaches the merchant backend, and completes out-of-band
//! authentication challenges the backend asks for.

mod error;
mod stripe;

use std::future::Future;

use paperback_core::{ContinuationSecret, PaymentMethodToken, PaymentStatus, ShippingInfo};
use secrecy::SecretString;

pub use error::GatewayError;
pub use stripe::{ChallengePrompt, StripeGateway};

/// Raw card input as typed by the customer.
///
/// Number and CVC are secrets: `Debug` redacts them and they are only
/// exposed when building the tokenization request.
#[derive(Debug, Clone)]
pub struct CardInput {
    pub number: SecretString,
    pub exp_month: u8,
    pub exp_year: u16,
    pub cvc: SecretString,
}

/// Billing details sent along with the card for tokenization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingDetails {
    pub name: String,
    pub address_line1: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl From<&ShippingInfo> for BillingDetails {
    fn from(shipping: &ShippingInfo) -> Self {
        Self {
            name: shipping.full_name().to_string(),
            address_line1: shipping.address_line1().to_string(),
            city: shipping.city().to_string(),
            postal_code: shipping.postal_code().to_string(),
            country: shipping.country().to_string(),
        }
    }
}

/// The two gateway operations checkout consumes.
pub trait PaymentGateway: Send + Sync {
    /// Convert raw card input into a single-use payment method token.
    ///
    /// The only checkout step allowed to fail purely on customer input.
    fn tokenize(
        &self,
        card: &CardInput,
        billing: &BillingDetails,
    ) -> impl Future<Output = Result<PaymentMethodToken, GatewayError>> + Send;

    /// Drive the out-of-band authentication challenge identified by
    /// `secret` to completion and report the resulting payment status.
    fn complete_auth_challenge(
        &self,
        secret: &ContinuationSecret,
    ) -> impl Future<Output = Result<PaymentStatus, GatewayError>> + Send;
}
