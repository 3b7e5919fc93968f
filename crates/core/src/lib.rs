//! Paperback Core - Shared domain types.
//!
//! This crate provides the types shared by the cart engine, the command-line
//! front end and the integration tests:
//! - `cart` - Offline-first cart, reconciliation and checkout orchestration
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no persistence. Anything that talks to the merchant backend or
//! the payment gateway lives in `paperback-cart`.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, money, line items, snapshots, shipping form
//!   validation, payment and checkout statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
