//! Cart service: local mutations plus backend reconciliation.
//!
//! [`ShoppingCart`] wraps the [`Cart`] model and a [`MerchantBackend`].
//! Mutations that can be invalid (`add`, `set_quantity`) are staged locally,
//! persisted, and then confirmed with a reconciliation call. Removing and
//! clearing are local-only and never fail.
//!
//! Only the most recently started reconciliation may apply its response.
//! An older one that finishes later is ignored. Local writes made while the
//! call was in flight are kept: verdicts apply to the lines that are still
//! present as requested, and lines edited since stay unconfirmed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use paperback_core::{CartSnapshot, ProductId, ProductListing};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::backend::{MerchantBackend, ValidationRequest};
use crate::error::CartError;
use crate::model::{Cart, CartState, Swap};
use crate::reconcile::{ReconcileReport, merge_into};

/// Structured result of a cart mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Nothing changed (unknown product, same quantity, zero quantity).
    Unchanged,
    /// The change was applied and confirmed by the backend as-is.
    Changed,
    /// The change was applied but the backend corrected or removed lines.
    Corrected(ReconcileReport),
    /// The change was applied locally; a newer reconciliation owns the
    /// confirmation.
    Pending,
}

impl MutationOutcome {
    /// Whether the user should be told about corrections.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        matches!(self, Self::Corrected(report) if report.has_warnings())
    }
}

/// Result of a reconciliation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The backend's answer was merged into the cart.
    Applied(ReconcileReport),
    /// A newer reconciliation or cart write made this answer obsolete; the
    /// cart was not touched.
    Superseded,
}

enum Reconciled {
    Applied {
        report: ReconcileReport,
        state: CartState,
        /// Lines written during the call that the response did not cover.
        unconfirmed: usize,
    },
    Superseded,
}

/// The cart service. Cheap to clone; clones share the same cart.
pub struct ShoppingCart<B> {
    inner: Arc<ShoppingCartInner<B>>,
}

struct ShoppingCartInner<B> {
    cart: Cart,
    backend: B,
    latest_ticket: AtomicU64,
}

impl<B> Clone for ShoppingCart<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B> std::fmt::Debug for ShoppingCart<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShoppingCart")
            .field("cart", &self.inner.cart)
            .finish_non_exhaustive()
    }
}

impl<B: MerchantBackend> ShoppingCart<B> {
    /// Create the service for one session.
    #[must_use]
    pub fn new(cart: Cart, backend: B) -> Self {
        Self {
            inner: Arc::new(ShoppingCartInner {
                cart,
                backend,
                latest_ticket: AtomicU64::new(0),
            }),
        }
    }

    /// The underlying cart model, for reads.
    #[must_use]
    pub fn cart(&self) -> &Cart {
        &self.inner.cart
    }

    /// The backend this cart reconciles against.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Subscribe to cart changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.cart.subscribe()
    }

    /// Add `quantity` units of a product and confirm with the backend.
    ///
    /// The staged change is kept if the backend cannot be reached; the
    /// error is returned so the caller can tell the user.
    ///
    /// # Errors
    ///
    /// Returns the reconciliation error (see [`ShoppingCart::reconcile`]).
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add(
        &self,
        product: &ProductListing,
        quantity: u32,
    ) -> Result<MutationOutcome, CartError> {
        if !self.inner.cart.stage_add(product, quantity) {
            return Ok(MutationOutcome::Unchanged);
        }
        debug!(quantity, "Staged add");
        self.confirm().await
    }

    /// Set the quantity of a line and confirm with the backend.
    ///
    /// A quantity of zero or less removes the line without a backend call.
    ///
    /// # Errors
    ///
    /// Returns the reconciliation error (see [`ShoppingCart::reconcile`]).
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn set_quantity(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<MutationOutcome, CartError> {
        if quantity <= 0 {
            return Ok(self.remove(product_id));
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if !self.inner.cart.stage_quantity(product_id, quantity) {
            return Ok(MutationOutcome::Unchanged);
        }
        debug!(quantity, "Staged quantity");
        self.confirm().await
    }

    /// Remove a product's line. Removing an unknown product is a no-op.
    pub fn remove(&self, product_id: ProductId) -> MutationOutcome {
        if self.inner.cart.remove(product_id) {
            debug!(product_id = %product_id, "Removed line");
            MutationOutcome::Changed
        } else {
            MutationOutcome::Unchanged
        }
    }

    /// Empty the cart and erase the persistent slot.
    pub fn clear(&self) -> MutationOutcome {
        if self.inner.cart.clear() {
            debug!("Cart cleared");
            MutationOutcome::Changed
        } else {
            MutationOutcome::Unchanged
        }
    }

    /// Reconcile the cart against the backend.
    ///
    /// Sends every line in one batched call and swaps the merged result into
    /// the cart in one step. An empty cart needs no call.
    ///
    /// # Errors
    ///
    /// - [`CartError::Transport`] if the backend is unreachable or fails
    /// - [`CartError::Rejected`] if the backend refuses the request
    /// - [`CartError::Protocol`] if the response cannot be parsed
    ///
    /// The cart is left unchanged in every error case.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome, CartError> {
        Ok(match self.reconcile_inner().await? {
            Reconciled::Applied { report, .. } => ReconcileOutcome::Applied(report),
            Reconciled::Superseded => ReconcileOutcome::Superseded,
        })
    }

    /// Reconcile and, if the cart is ready to be paid for, return a frozen
    /// snapshot of it.
    ///
    /// # Errors
    ///
    /// - [`CartError::Empty`] if there is nothing to pay for
    /// - [`CartError::NeedsReview`] if reconciliation corrected or removed
    ///   lines; calling again after the user has seen them passes
    /// - [`CartError::Stale`] if the cart changed while being validated
    /// - any error from [`ShoppingCart::reconcile`]
    #[instrument(skip(self))]
    pub async fn prepare_checkout(&self) -> Result<CartSnapshot, CartError> {
        if self.inner.cart.is_empty() {
            return Err(CartError::Empty);
        }

        match self.reconcile_inner().await? {
            Reconciled::Superseded => Err(CartError::Stale),
            Reconciled::Applied { report, .. } if report.has_warnings() => {
                info!(changes = report.changes.len(), "Cart needs review before checkout");
                Err(CartError::NeedsReview(report))
            }
            Reconciled::Applied { unconfirmed, .. } if unconfirmed > 0 => Err(CartError::Stale),
            Reconciled::Applied { state, .. } if state.is_empty() => Err(CartError::Empty),
            Reconciled::Applied { state, .. } => Ok(CartSnapshot::capture(state.items())),
        }
    }

    async fn confirm(&self) -> Result<MutationOutcome, CartError> {
        match self.reconcile_inner().await {
            Ok(Reconciled::Applied { report, .. }) if report.has_warnings() => {
                Ok(MutationOutcome::Corrected(report))
            }
            Ok(Reconciled::Applied { .. }) => Ok(MutationOutcome::Changed),
            Ok(Reconciled::Superseded) => Ok(MutationOutcome::Pending),
            Err(e) => {
                warn!(error = %e, "Change kept locally but not confirmed");
                Err(e)
            }
        }
    }

    #[instrument(skip(self), fields(ticket = tracing::field::Empty))]
    async fn reconcile_inner(&self) -> Result<Reconciled, CartError> {
        let ticket = self.inner.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::Span::current().record("ticket", ticket);

        let state = self.inner.cart.state();
        if state.is_empty() {
            return Ok(Reconciled::Applied {
                report: ReconcileReport::empty(),
                state,
                unconfirmed: 0,
            });
        }

        let request = ValidationRequest::for_items(state.items());
        let validation = self
            .inner
            .backend
            .validate_cart(&request)
            .await
            .map_err(|e| {
                warn!(error = %e, "Cart validation failed");
                CartError::from(e)
            })?;

        if self.inner.latest_ticket.load(Ordering::SeqCst) != ticket {
            debug!("Validation response superseded by a newer request");
            return Ok(Reconciled::Superseded);
        }

        // Merge against the lines as they are now; local writes may have
        // landed while the call was in flight.
        let mut changes = Vec::new();
        let mut unconfirmed = 0;
        let swap = self.inner.cart.swap_with(|current| {
            let merged = merge_into(state.items(), current, &validation.lines);
            changes = merged.changes;
            unconfirmed = merged.unconfirmed;
            merged.items
        });
        let report = ReconcileReport {
            changes,
            total_authoritative: validation.total_authoritative,
            all_lines_valid: validation.all_lines_valid,
        };

        let (Swap::Unchanged(state) | Swap::Replaced(state)) = swap;
        if report.has_warnings() {
            info!(changes = report.changes.len(), "Cart reconciled with changes");
        } else {
            debug!("Cart reconciled");
        }
        if unconfirmed > 0 {
            debug!(unconfirmed, "Lines edited during validation left unconfirmed");
        }
        Ok(Reconciled::Applied {
            report,
            state,
            unconfirmed,
        })
    }
}
