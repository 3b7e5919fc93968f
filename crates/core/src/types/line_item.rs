//! Cart line items and checkout snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Money;

/// One product and quantity entry in the cart.
///
/// Price and stock are caches of what the backend last told us (or what the
/// product page displayed, for a freshly added line). They are overwritten by
/// reconciliation and must never be trusted for charging.
///
/// Unknown fields are ignored when deserializing so older clients can read
/// carts written by newer ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Identity key within the cart.
    pub product_id: ProductId,
    /// Title shown to the user.
    pub display_name: String,
    /// Last known unit price.
    pub unit_price_cached: Money,
    /// Requested quantity. Always greater than zero for stored lines.
    pub quantity: u32,
    /// Last known available stock.
    pub stock_cached: u32,
    /// Cover image reference (URL or asset key).
    #[serde(default)]
    pub image_ref: String,
}

impl LineItem {
    /// Build a new line from a product listing with an optimistic cache of
    /// the displayed price and stock.
    #[must_use]
    pub fn from_listing(product: &ProductListing, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            display_name: product.title.clone(),
            unit_price_cached: product.price,
            quantity,
            stock_cached: product.stock,
            image_ref: product.image_url.clone().unwrap_or_default(),
        }
    }

    /// `unit_price_cached × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price_cached.times(self.quantity)
    }
}

/// A product as displayed by the catalogue, the input to "add to cart".
///
/// The catalogue itself is an external read API; this is the narrow shape
/// the cart consumes from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
    pub id: ProductId,
    pub title: String,
    pub price: Money,
    pub stock: u32,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Sum of `unit_price_cached × quantity` over the lines.
#[must_use]
pub fn subtotal(items: &[LineItem]) -> Money {
    items.iter().map(LineItem::line_total).sum()
}

/// Sum of quantities over the lines.
#[must_use]
pub fn item_count(items: &[LineItem]) -> u64 {
    items.iter().map(|item| u64::from(item.quantity)).sum()
}

/// Immutable copy of the cart taken when checkout begins.
///
/// Cart edits made after the snapshot is taken do not affect the checkout
/// attempt that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    items: Vec<LineItem>,
    subtotal: Money,
    taken_at: DateTime<Utc>,
}

impl CartSnapshot {
    /// Capture the given lines.
    #[must_use]
    pub fn capture(items: &[LineItem]) -> Self {
        Self {
            items: items.to_vec(),
            subtotal: subtotal(items),
            taken_at: Utc::now(),
        }
    }

    /// The frozen lines.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Subtotal computed at capture time.
    #[must_use]
    pub const fn subtotal(&self) -> Money {
        self.subtotal
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        item_count(&self.items)
    }

    /// Whether the snapshot holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// When the snapshot was taken.
    #[must_use]
    pub const fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }
}
