//! Terminal output.

#![allow(clippy::print_stdout)]

use paperback_cart::{CartState, Notice, NoticeLevel, NotificationSink};
use paperback_core::CheckoutStatus;

/// Sink that prints notices to stdout, one per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&self, notice: &Notice) {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        println!("[{tag}] {}", notice.message);
    }
}

/// Send each notice to the sink.
pub fn notices(sink: &impl NotificationSink, notices: &[Notice]) {
    for notice in notices {
        sink.notify(notice);
    }
}

/// Print the cart as a table.
pub fn cart(state: &CartState) {
    if state.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    for line in state.items() {
        println!(
            "{:>6}  {:<32}  {:>3} x {:>9}  {:>10}",
            line.product_id.to_string(),
            truncate(&line.display_name, 32),
            line.quantity,
            line.unit_price_cached.to_string(),
            line.line_total().to_string(),
        );
    }
    println!(
        "Items: {}  Subtotal: {}",
        state.item_count(),
        state.subtotal()
    );
}

/// Print a checkout status change.
pub fn status(status: CheckoutStatus) {
    let label = match status {
        CheckoutStatus::Idle => return,
        CheckoutStatus::FormValid => "Validating cart",
        CheckoutStatus::TokenizingPayment => "Securing card details",
        CheckoutStatus::ConfirmingWithBackend => "Placing order",
        CheckoutStatus::RequiresAdditionalAuth => "Waiting for card authentication",
        CheckoutStatus::Settled => "Payment settled",
        CheckoutStatus::Failed => "Payment failed",
    };
    println!("... {label}");
}

/// Print the page the customer must open to authenticate the payment.
pub fn challenge(url: &str) {
    println!("Your bank needs to confirm this payment. Open this page to continue:");
    println!("  {url}");
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(max.saturating_sub(1)).collect();
        short.push('…');
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Dune", 32), "Dune");
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("", 4), "");
    }
}
