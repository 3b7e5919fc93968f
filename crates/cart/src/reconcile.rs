//! Merging backend validation results into the cart.
//!
//! [`merge`] is pure: it takes the current lines and the validated lines and
//! returns the reconciled collection plus what changed. Swapping the result
//! into the cart is the caller's job.
//!
//! Per line, in order of precedence:
//! - absent from the response: dropped
//! - nothing available (zero or negative): dropped
//! - `0 < available < requested`: clamped to `available`
//! - flagged invalid: dropped
//! - otherwise: confirmed
//!
//! Kept lines always take the authoritative price and stock.

use std::collections::HashMap;
use std::fmt;

use paperback_core::{LineItem, Money, ProductId};
use tracing::warn;

use crate::backend::ValidatedLine;

/// Why a line was dropped from the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The backend reported zero availability.
    OutOfStock,
    /// The backend flagged the line as structurally invalid (e.g. the
    /// product was discontinued).
    Invalid(Option<String>),
    /// The backend did not mention the line.
    Missing,
}

/// One discrepancy resolved by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineChange {
    /// The quantity was lowered to what is available.
    Clamped {
        product_id: ProductId,
        display_name: String,
        requested: u32,
        granted: u32,
    },
    /// The unit price changed.
    Repriced {
        product_id: ProductId,
        display_name: String,
        old: Money,
        new: Money,
    },
    /// The line was removed.
    Dropped {
        product_id: ProductId,
        display_name: String,
        reason: DropReason,
    },
}

/// Whether a change adjusted a line or removed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The line was kept with corrected values.
    Correction,
    /// The line was removed.
    Rejection,
}

impl LineChange {
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        match self {
            Self::Clamped { product_id, .. }
            | Self::Repriced { product_id, .. }
            | Self::Dropped { product_id, .. } => *product_id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Clamped { .. } | Self::Repriced { .. } => ChangeKind::Correction,
            Self::Dropped { .. } => ChangeKind::Rejection,
        }
    }
}

impl fmt::Display for LineChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clamped {
                display_name,
                requested,
                granted,
                ..
            } => write!(
                f,
                "Only {granted} of {requested} \"{display_name}\" available; quantity adjusted"
            ),
            Self::Repriced {
                display_name,
                old,
                new,
                ..
            } => write!(f, "Price of \"{display_name}\" changed from {old} to {new}"),
            Self::Dropped {
                display_name,
                reason,
                ..
            } => match reason {
                DropReason::OutOfStock => {
                    write!(f, "\"{display_name}\" is out of stock and was removed")
                }
                DropReason::Invalid(Some(message)) => {
                    write!(f, "\"{display_name}\" was removed: {message}")
                }
                DropReason::Invalid(None) => {
                    write!(f, "\"{display_name}\" is no longer available and was removed")
                }
                DropReason::Missing => {
                    write!(f, "\"{display_name}\" could not be confirmed and was removed")
                }
            },
        }
    }
}

/// Outcome of one applied reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Corrections and rejections, in cart order.
    pub changes: Vec<LineChange>,
    /// Backend-computed total for the requested lines.
    pub total_authoritative: Money,
    /// Whether the backend considered every line valid.
    pub all_lines_valid: bool,
}

impl ReconcileReport {
    /// Report for a cart that needed no backend call.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            changes: Vec::new(),
            total_authoritative: Money::ZERO,
            all_lines_valid: true,
        }
    }

    /// Whether the user should be told about anything.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Changes that kept the line with adjusted values.
    pub fn corrections(&self) -> impl Iterator<Item = &LineChange> {
        self.changes
            .iter()
            .filter(|change| change.kind() == ChangeKind::Correction)
    }

    /// Changes that removed a line.
    pub fn rejections(&self) -> impl Iterator<Item = &LineChange> {
        self.changes
            .iter()
            .filter(|change| change.kind() == ChangeKind::Rejection)
    }
}

/// Result of [`merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    /// The reconciled collection, in the original cart order.
    pub items: Vec<LineItem>,
    /// What changed.
    pub changes: Vec<LineChange>,
    /// Lines edited after the request was sent, kept without a verdict.
    pub unconfirmed: usize,
}

/// Merge validated lines into the cart lines they were requested for.
///
/// If the response mentions a product twice, the first mention wins. Lines
/// for products not in the cart are ignored.
#[must_use]
pub fn merge(local: &[LineItem], validated: &[ValidatedLine]) -> Merged {
    merge_into(local, local, validated)
}

/// Merge validated lines for `requested` into `current`, the cart as it is
/// now.
///
/// The cart may have been edited while validation was in flight. Verdicts
/// apply only to current lines that still match the requested quantity;
/// lines added or changed since are kept as they are and counted in
/// [`Merged::unconfirmed`]. Verdicts for lines removed since are dropped.
#[must_use]
pub fn merge_into(
    requested: &[LineItem],
    current: &[LineItem],
    validated: &[ValidatedLine],
) -> Merged {
    let mut by_product: HashMap<ProductId, &ValidatedLine> = HashMap::with_capacity(validated.len());
    for line in validated {
        if by_product.contains_key(&line.product_id) {
            warn!(product_id = %line.product_id, "Duplicate line in validation response, keeping first");
            continue;
        }
        if !requested.iter().any(|item| item.product_id == line.product_id) {
            warn!(product_id = %line.product_id, "Validation response mentions a product not in the cart");
            continue;
        }
        by_product.insert(line.product_id, line);
    }

    let mut items = Vec::with_capacity(current.len());
    let mut changes = Vec::new();
    let mut unconfirmed = 0;

    for item in current {
        let as_requested = requested
            .iter()
            .any(|sent| sent.product_id == item.product_id && sent.quantity == item.quantity);
        if !as_requested {
            unconfirmed += 1;
            items.push(item.clone());
            continue;
        }

        match by_product.get(&item.product_id) {
            Some(validated) => {
                if let Some(kept) = reconcile_line(item, validated, &mut changes) {
                    items.push(kept);
                }
            }
            None => changes.push(dropped(item, DropReason::Missing)),
        }
    }

    Merged {
        items,
        changes,
        unconfirmed,
    }
}

fn reconcile_line(
    item: &LineItem,
    validated: &ValidatedLine,
    changes: &mut Vec<LineChange>,
) -> Option<LineItem> {
    // Oversold products report negative availability.
    let available = u32::try_from(validated.quantity_available.max(0)).unwrap_or(u32::MAX);

    if available == 0 {
        changes.push(dropped(item, DropReason::OutOfStock));
        return None;
    }

    let granted = if available < item.quantity {
        available
    } else if validated.is_valid {
        item.quantity
    } else {
        changes.push(dropped(
            item,
            DropReason::Invalid(validated.reason_message.clone()),
        ));
        return None;
    };

    let mut kept = item.clone();
    kept.quantity = granted;
    kept.stock_cached = available;
    kept.unit_price_cached = validated.unit_price_authoritative;

    if granted < item.quantity {
        changes.push(LineChange::Clamped {
            product_id: item.product_id,
            display_name: item.display_name.clone(),
            requested: item.quantity,
            granted,
        });
    }
    if kept.unit_price_cached != item.unit_price_cached {
        changes.push(LineChange::Repriced {
            product_id: item.product_id,
            display_name: item.display_name.clone(),
            old: item.unit_price_cached,
            new: kept.unit_price_cached,
        });
    }

    Some(kept)
}

fn dropped(item: &LineItem, reason: DropReason) -> LineChange {
    LineChange::Dropped {
        product_id: item.product_id,
        display_name: item.display_name.clone(),
        reason,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: i64, cents: i64, quantity: u32) -> LineItem {
        LineItem {
            product_id: ProductId::new(id),
            display_name: format!("Book {id}"),
            unit_price_cached: Money::from_cents(cents),
            quantity,
            stock_cached: 99,
            image_ref: String::new(),
        }
    }

    fn validated(id: i64, cents: i64, requested: u32, available: i64, valid: bool) -> ValidatedLine {
        ValidatedLine {
            product_id: ProductId::new(id),
            title_echo: format!("Book {id}"),
            unit_price_authoritative: Money::from_cents(cents),
            quantity_requested: requested,
            quantity_available: available,
            is_valid: valid,
            reason_message: None,
        }
    }

    #[test]
    fn test_confirmed_line_refreshes_price_and_stock() {
        let merged = merge(&[item(1, 1000, 2)], &[validated(1, 1000, 2, 8, true)]);
        let kept = merged.items.first().unwrap();
        assert_eq!(kept.quantity, 2);
        assert_eq!(kept.stock_cached, 8);
        assert!(merged.changes.is_empty());
    }

    #[test]
    fn test_price_change_is_a_correction() {
        let merged = merge(&[item(1, 1000, 2)], &[validated(1, 1250, 2, 8, true)]);
        assert_eq!(merged.items.first().unwrap().unit_price_cached, Money::from_cents(1250));
        assert_eq!(
            merged.changes,
            vec![LineChange::Repriced {
                product_id: ProductId::new(1),
                display_name: "Book 1".to_string(),
                old: Money::from_cents(1000),
                new: Money::from_cents(1250),
            }]
        );
        assert_eq!(merged.changes.first().unwrap().kind(), ChangeKind::Correction);
    }

    #[test]
    fn test_partial_availability_clamps_even_when_flagged_invalid() {
        let merged = merge(&[item(7, 1000, 5)], &[validated(7, 1000, 5, 2, false)]);
        let kept = merged.items.first().unwrap();
        assert_eq!(kept.quantity, 2);
        assert_eq!(kept.stock_cached, 2);
        assert!(matches!(
            merged.changes.as_slice(),
            [LineChange::Clamped { requested: 5, granted: 2, .. }]
        ));
    }

    #[test]
    fn test_zero_availability_drops_for_any_quantity() {
        for quantity in [1, 3, 1000] {
            let merged = merge(&[item(1, 1000, quantity)], &[validated(1, 1000, quantity, 0, true)]);
            assert!(merged.items.is_empty());
            assert!(matches!(
                merged.changes.as_slice(),
                [LineChange::Dropped { reason: DropReason::OutOfStock, .. }]
            ));
        }
    }

    #[test]
    fn test_invalid_with_enough_stock_drops() {
        let mut line = validated(3, 1000, 1, 10, false);
        line.reason_message = Some("Discontinued".to_string());
        let merged = merge(&[item(3, 1000, 1)], &[line]);
        assert!(merged.items.is_empty());
        let change = merged.changes.first().unwrap();
        assert_eq!(change.to_string(), "\"Book 3\" was removed: Discontinued");
        assert_eq!(change.kind(), ChangeKind::Rejection);
    }

    #[test]
    fn test_missing_line_is_dropped() {
        let merged = merge(&[item(1, 1000, 1), item(2, 500, 1)], &[validated(1, 1000, 1, 5, true)]);
        assert_eq!(merged.items.len(), 1);
        assert!(matches!(
            merged.changes.as_slice(),
            [LineChange::Dropped { reason: DropReason::Missing, .. }]
        ));
    }

    #[test]
    fn test_order_is_preserved_and_extras_ignored() {
        let local = [item(3, 100, 1), item(1, 100, 1), item(2, 100, 1)];
        let response = [
            validated(9, 100, 1, 5, true),
            validated(2, 100, 1, 5, true),
            validated(1, 100, 1, 5, true),
            validated(3, 100, 1, 5, true),
        ];
        let merged = merge(&local, &response);
        let ids: Vec<i64> = merged.items.iter().map(|i| i.product_id.as_i64()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(merged.changes.is_empty());
    }

    #[test]
    fn test_first_duplicate_wins() {
        let merged = merge(
            &[item(1, 1000, 4)],
            &[validated(1, 1000, 4, 4, true), validated(1, 1000, 4, 0, true)],
        );
        assert_eq!(merged.items.first().unwrap().quantity, 4);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let local = [item(1, 1000, 5), item(2, 800, 1), item(3, 300, 2)];
        let response = [
            validated(1, 1100, 5, 3, false),
            validated(2, 800, 1, 0, true),
            validated(3, 300, 2, 10, true),
        ];
        let once = merge(&local, &response);

        // A backend that saw the reconciled cart reports the same truth.
        let again: Vec<ValidatedLine> = response
            .iter()
            .map(|line| ValidatedLine {
                quantity_requested: u32::try_from(line.quantity_available)
                    .unwrap_or(0)
                    .min(line.quantity_requested),
                is_valid: line.quantity_available > 0,
                ..line.clone()
            })
            .collect();
        let twice = merge(&once.items, &again);

        assert_eq!(once.items, twice.items);
        assert!(twice.changes.is_empty());
    }

    #[test]
    fn test_report_partitions_changes() {
        let merged = merge(
            &[item(1, 1000, 5), item(2, 1000, 1)],
            &[validated(1, 1000, 5, 2, true), validated(2, 1000, 1, 0, true)],
        );
        let report = ReconcileReport {
            changes: merged.changes,
            total_authoritative: Money::from_cents(2000),
            all_lines_valid: false,
        };
        assert!(report.has_warnings());
        assert_eq!(report.corrections().count(), 1);
        assert_eq!(report.rejections().count(), 1);
        assert!(!ReconcileReport::empty().has_warnings());
    }

    #[test]
    fn test_negative_availability_drops_as_out_of_stock() {
        let merged = merge(
            &[item(1, 1000, 2), item(2, 500, 1)],
            &[validated(1, 1000, 2, -1, false), validated(2, 500, 1, 4, true)],
        );
        let ids: Vec<i64> = merged.items.iter().map(|i| i.product_id.as_i64()).collect();
        assert_eq!(ids, vec![2]);
        assert!(matches!(
            merged.changes.as_slice(),
            [LineChange::Dropped { reason: DropReason::OutOfStock, .. }]
        ));
    }

    #[test]
    fn test_merge_into_edited_cart() {
        // Sent 1 x2, 2 x1, 3 x1; since then 2 was removed, 3 changed to x4
        // and 4 was added.
        let requested = [item(1, 1000, 2), item(2, 500, 1), item(3, 300, 1)];
        let current = [item(1, 1000, 2), item(3, 300, 4), item(4, 700, 1)];
        let response = [
            validated(1, 1500, 2, 9, true),
            validated(2, 500, 1, 0, true),
            validated(3, 350, 1, 9, true),
        ];

        let merged = merge_into(&requested, &current, &response);

        assert_eq!(merged.unconfirmed, 2);
        assert_eq!(merged.items.len(), 3);
        let first = merged.items.first().unwrap();
        assert_eq!(first.unit_price_cached, Money::from_cents(1500));
        assert_eq!(merged.items.get(1).unwrap(), &item(3, 300, 4));
        assert_eq!(merged.items.get(2).unwrap(), &item(4, 700, 1));
        assert!(matches!(
            merged.changes.as_slice(),
            [LineChange::Repriced { product_id, .. }] if *product_id == ProductId::new(1)
        ));
    }
}
