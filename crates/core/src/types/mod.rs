//! Core types for Paperback.
//!
//! This module provides type-safe wrappers for the cart and checkout domain.

pub mod id;
pub mod line_item;
pub mod price;
pub mod shipping;
pub mod status;
pub mod token;

pub use id::*;
pub use line_item::{CartSnapshot, LineItem, ProductListing, item_count, subtotal};
pub use price::Money;
pub use shipping::{ShippingField, ShippingFieldError, ShippingForm, ShippingInfo};
pub use status::*;
pub use token::{ContinuationSecret, PaymentMethodToken};
