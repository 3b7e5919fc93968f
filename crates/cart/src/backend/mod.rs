//! Merchant backend collaborator.
//!
//! The backend alone knows true price and stock, and is the only party that
//! creates orders. The cart talks to it through [`MerchantBackend`]; the
//! HTTP implementation is [`BackendClient`].

mod client;
mod error;
mod types;

use std::future::Future;

use uuid::Uuid;

pub use client::BackendClient;
pub use error::BackendError;
pub use types::{
    CartValidation, OrderRecord, PurchaseRequest, RequestedLine, ValidatedLine, ValidationRequest,
};

/// The two merchant backend endpoints the cart and checkout consume.
pub trait MerchantBackend: Send + Sync {
    /// Validate every line of the cart in one batched call.
    ///
    /// Read-only with respect to server state.
    fn validate_cart(
        &self,
        request: &ValidationRequest,
    ) -> impl Future<Output = Result<CartValidation, BackendError>> + Send;

    /// Submit a purchase. The only call that creates server-side order
    /// state.
    ///
    /// `idempotency_key` identifies the checkout attempt so a backend that
    /// honours it can deduplicate a replayed request.
    fn confirm_purchase(
        &self,
        request: &PurchaseRequest,
        idempotency_key: Uuid,
    ) -> impl Future<Output = Result<OrderRecord, BackendError>> + Send;
}
