//! In-memory cart model.
//!
//! The cart state is held in a `tokio::sync::watch` channel: readers borrow
//! the current value, subscribers are woken on every change, and every write
//! happens inside a single critical section that also persists the new
//! collection. Aggregates are folds over the current lines, recomputed on
//! every read.

use paperback_core::{
    CartSnapshot, LineItem, Money, ProductId, ProductListing, item_count, subtotal,
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::store::CartStore;

/// Cart contents as seen by subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    items: Vec<LineItem>,
    generation: u64,
}

impl CartState {
    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Counter bumped by every write. Used to detect that the cart changed
    /// while a reconciliation was in flight.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// `Σ unit_price_cached × quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        subtotal(&self.items)
    }

    /// `Σ quantity`.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        item_count(&self.items)
    }

    /// Whether the cart holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Line for a product, if present.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }
}

/// Result of swapping in a reconciled collection.
#[derive(Debug)]
pub(crate) enum Swap {
    /// Reconciled lines equal the current ones.
    Unchanged(CartState),
    /// Reconciled lines replaced the current ones.
    Replaced(CartState),
}

/// The cart: an ordered collection of line items backed by a persistent
/// slot.
pub struct Cart {
    state: watch::Sender<CartState>,
    store: Box<dyn CartStore>,
}

impl std::fmt::Debug for Cart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cart")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Cart {
    /// Open the cart stored in `store`.
    ///
    /// An unreadable slot yields an empty cart; the failure is logged.
    #[must_use]
    pub fn open(store: impl CartStore + 'static) -> Self {
        let items = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load stored cart, starting empty");
            Vec::new()
        });
        debug!(lines = items.len(), "Cart loaded");

        let (state, _) = watch::channel(CartState {
            items,
            generation: 0,
        });

        Self {
            state,
            store: Box::new(store),
        }
    }

    /// Copy of the current lines.
    #[must_use]
    pub fn items(&self) -> Vec<LineItem> {
        self.state.borrow().items.clone()
    }

    /// Copy of the current state.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.state.borrow().clone()
    }

    /// Line for a product, if present.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<LineItem> {
        self.state.borrow().get(product_id).cloned()
    }

    /// `Σ unit_price_cached × quantity` over the current lines.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.state.borrow().subtotal()
    }

    /// `Σ quantity` over the current lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.state.borrow().item_count()
    }

    /// Whether the cart holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    /// Current write generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// Immutable copy of the current lines for checkout.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot::capture(&self.state.borrow().items)
    }

    /// Subscribe to changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.state.subscribe()
    }

    /// Add `quantity` units of a product, summing with an existing line.
    ///
    /// A new line caches the listing's displayed price and stock until the
    /// next reconciliation.
    pub(crate) fn stage_add(&self, product: &ProductListing, quantity: u32) -> bool {
        if quantity == 0 {
            return false;
        }
        self.write(|items| {
            if let Some(item) = items.iter_mut().find(|item| item.product_id == product.id) {
                item.quantity = item.quantity.saturating_add(quantity);
            } else {
                items.push(LineItem::from_listing(product, quantity));
            }
            true
        })
    }

    /// Set the quantity of an existing line. Zero removes it.
    pub(crate) fn stage_quantity(&self, product_id: ProductId, quantity: u32) -> bool {
        self.write(|items| {
            match items.iter_mut().find(|item| item.product_id == product_id) {
                Some(item) if item.quantity != quantity => {
                    item.quantity = quantity;
                    true
                }
                _ => false,
            }
        })
    }

    /// Remove a product's line. Returns whether a line was removed.
    pub fn remove(&self, product_id: ProductId) -> bool {
        self.write(|items| {
            let before = items.len();
            items.retain(|item| item.product_id != product_id);
            items.len() != before
        })
    }

    /// Remove every line and erase the persistent slot. Returns whether the
    /// cart had any lines.
    pub fn clear(&self) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if state.items.is_empty() {
                return false;
            }
            state.items.clear();
            state.generation += 1;
            true
        });

        if let Err(e) = self.store.erase() {
            warn!(error = %e, "Failed to erase stored cart");
        }
        changed
    }

    /// Replace the whole collection with `rebuild(current items)`.
    ///
    /// The rebuild runs under the channel lock, so it always sees the lines
    /// as they are now, including writes made after it was scheduled.
    pub(crate) fn swap_with(&self, rebuild: impl FnOnce(&[LineItem]) -> Vec<LineItem>) -> Swap {
        let mut swap = None;

        self.state.send_if_modified(|state| {
            let mut items = rebuild(&state.items);
            items.retain(|item| item.quantity > 0);
            if state.items == items {
                swap = Some(Swap::Unchanged(state.clone()));
                return false;
            }

            state.items = items;
            state.generation += 1;
            self.persist(&state.items);
            swap = Some(Swap::Replaced(state.clone()));
            true
        });

        swap.unwrap_or_else(|| Swap::Unchanged(self.state()))
    }

    /// Apply a local edit. The edit returns whether it changed anything;
    /// only then is the generation bumped and the collection persisted.
    fn write(&self, edit: impl FnOnce(&mut Vec<LineItem>) -> bool) -> bool {
        self.state.send_if_modified(|state| {
            if !edit(&mut state.items) {
                return false;
            }
            state.items.retain(|item| item.quantity > 0);
            state.generation += 1;
            self.persist(&state.items);
            true
        })
    }

    fn persist(&self, items: &[LineItem]) {
        if let Err(e) = self.store.save(items) {
            warn!(error = %e, "Failed to persist cart");
        }
    }
}
