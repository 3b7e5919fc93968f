//! Checkout command.

use std::process::ExitCode;

use paperback_cart::notify::{notice_for_checkout, notices_for_checkout_error};
use paperback_cart::{
    CardInput, CartError, Checkout, CheckoutError, CheckoutRequest, ClientConfig, StripeGateway,
};
use paperback_core::ShippingForm;
use secrecy::SecretString;

use super::open_cart;
use crate::CheckoutArgs;
use crate::render::{self, ConsoleSink};

/// Run one checkout attempt for the persisted cart.
///
/// Exits with a failure code unless the payment settles. If the backend
/// corrected the cart first, the corrections are listed and the command can
/// be run again to pay for the corrected cart.
pub async fn run(
    config: &ClientConfig,
    args: CheckoutArgs,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let shop = open_cart(config)?;
    let gateway = StripeGateway::new(&config.gateway)?.with_challenge_prompt(render::challenge);
    let checkout = Checkout::new(shop, gateway);

    let request = CheckoutRequest {
        shipping: ShippingForm {
            full_name: args.name,
            address_line1: args.address,
            city: args.city,
            postal_code: args.postal_code,
            country: args.country,
        },
        card: CardInput {
            number: SecretString::from(args.card_number),
            exp_month: args.exp_month,
            exp_year: args.exp_year,
            cvc: SecretString::from(args.cvc),
        },
    };

    let mut status = checkout.subscribe();
    let progress = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            render::status(current);
        }
    });

    let result = checkout.submit(request).await;
    progress.abort();

    match result {
        Ok(outcome) => {
            render::notices(&ConsoleSink, &[notice_for_checkout(&outcome)]);
            if outcome.is_settled() {
                render::cart(&checkout.cart().cart().state());
                Ok(ExitCode::SUCCESS)
            } else {
                tracing::info!(attempt_id = %outcome.attempt_id(), "Checkout attempt failed");
                Ok(ExitCode::FAILURE)
            }
        }
        Err(e) => {
            render::notices(&ConsoleSink, &notices_for_checkout_error(&e));
            if matches!(e, CheckoutError::Cart(CartError::NeedsReview(_))) {
                render::cart(&checkout.cart().cart().state());
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
