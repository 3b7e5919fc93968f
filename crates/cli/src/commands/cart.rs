//! Cart commands.
//!
//! Mutations are applied locally first. When the backend cannot confirm
//! them the change is kept, the user is told, and the command exits with a
//! failure code.

use std::process::ExitCode;

use paperback_cart::notify::{notices_for_cart_error, notices_for_mutation, notices_for_report};
use paperback_cart::{
    CartError, ClientConfig, MutationOutcome, Notice, NoticeLevel, ReconcileOutcome,
};
use paperback_core::{ProductId, ProductListing};

use super::open_cart;
use crate::render::{self, ConsoleSink};

type CommandResult = Result<ExitCode, Box<dyn std::error::Error>>;

/// Print the cart without contacting the backend.
pub fn show(config: &ClientConfig) -> CommandResult {
    let shop = open_cart(config)?;
    render::cart(&shop.cart().state());
    Ok(ExitCode::SUCCESS)
}

/// Add a product and confirm with the backend.
pub async fn add(config: &ClientConfig, listing: &ProductListing, quantity: u32) -> CommandResult {
    let shop = open_cart(config)?;
    let result = shop.add(listing, quantity).await;
    if matches!(result, Ok(MutationOutcome::Unchanged)) {
        tracing::info!(product_id = %listing.id, "Nothing to add");
    }
    let code = finish_mutation(result);
    render::cart(&shop.cart().state());
    Ok(code)
}

/// Set a line's quantity and confirm with the backend.
pub async fn set(config: &ClientConfig, product_id: ProductId, quantity: i64) -> CommandResult {
    let shop = open_cart(config)?;
    let result = shop.set_quantity(product_id, quantity).await;
    if matches!(result, Ok(MutationOutcome::Unchanged)) {
        tracing::info!(product_id = %product_id, "Product not in cart or quantity unchanged");
    }
    let code = finish_mutation(result);
    render::cart(&shop.cart().state());
    Ok(code)
}

/// Remove a line.
pub fn remove(config: &ClientConfig, product_id: ProductId) -> CommandResult {
    let shop = open_cart(config)?;
    let code = finish_mutation(Ok(shop.remove(product_id)));
    render::cart(&shop.cart().state());
    Ok(code)
}

/// Empty the cart.
pub fn clear(config: &ClientConfig) -> CommandResult {
    let shop = open_cart(config)?;
    let code = finish_mutation(Ok(shop.clear()));
    render::cart(&shop.cart().state());
    Ok(code)
}

/// Reconcile the cart with the backend and list any corrections.
pub async fn validate(config: &ClientConfig) -> CommandResult {
    let shop = open_cart(config)?;
    let code = match shop.reconcile().await {
        Ok(ReconcileOutcome::Applied(report)) => {
            if report.has_warnings() {
                render::notices(&ConsoleSink, &notices_for_report(&report));
            }
            if !shop.cart().is_empty() {
                let total = format!("Backend total: {}", report.total_authoritative);
                render::notices(&ConsoleSink, &[Notice::new(NoticeLevel::Info, total)]);
            }
            ExitCode::SUCCESS
        }
        // Only one process touches the cart here, so this needs no retry.
        Ok(ReconcileOutcome::Superseded) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    };
    render::cart(&shop.cart().state());
    Ok(code)
}

fn finish_mutation(result: Result<MutationOutcome, CartError>) -> ExitCode {
    match result {
        Ok(outcome) => {
            render::notices(&ConsoleSink, &notices_for_mutation(&outcome));
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn fail(err: &CartError) -> ExitCode {
    tracing::warn!(error = %err, "Cart not confirmed by backend");
    render::notices(&ConsoleSink, &notices_for_cart_error(err));
    ExitCode::FAILURE
}
