//! Paperback cart engine.
//!
//! An offline-first shopping cart that stays consistent with the merchant
//! backend, plus the checkout orchestrator that turns it into a paid order.
//!
//! # Architecture
//!
//! ```text
//! ShoppingCart ──validate──▶ MerchantBackend
//!   │  └─ Cart ──persist──▶ CartStore
//!   ▼
//! Checkout ──tokenize / challenge──▶ PaymentGateway
//!          └──confirm purchase─────▶ MerchantBackend
//! ```
//!
//! - [`store`] - Persistent slot holding the serialized cart
//! - [`model`] - In-memory cart with change notifications
//! - [`reconcile`] - Merging backend validation results into the cart
//! - [`service`] - Cart mutations confirmed by reconciliation
//! - [`checkout`] - Checkout state machine
//! - [`backend`] - Merchant backend contract and HTTP client
//! - [`gateway`] - Payment gateway contract and Stripe client
//! - [`notify`] - User-facing notices
//! - [`config`] - Environment configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod checkout;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod notify;
pub mod reconcile;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{BackendClient, BackendError, MerchantBackend};
pub use checkout::{Checkout, CheckoutError, CheckoutOutcome, CheckoutRequest, FailureKind};
pub use config::{BackendConfig, ClientConfig, ConfigError, GatewayConfig};
pub use error::CartError;
pub use gateway::{BillingDetails, CardInput, GatewayError, PaymentGateway, StripeGateway};
pub use model::{Cart, CartState};
pub use notify::{Notice, NoticeLevel, NotificationSink, TracingSink};
pub use reconcile::{LineChange, ReconcileReport};
pub use service::{MutationOutcome, ReconcileOutcome, ShoppingCart};
pub use store::{CartStore, FileStore, MemoryStore, StoreError};
