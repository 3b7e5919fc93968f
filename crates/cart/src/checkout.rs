//! Checkout orchestration.
//!
//! [`Checkout::submit`] drives one attempt through the three-party
//! handshake: the gateway tokenizes the card, the merchant backend creates
//! the order and reports a payment status, and the gateway completes an
//! authentication challenge if the backend asks for one.
//!
//! The attempt works on a snapshot of the cart taken after a successful
//! reconciliation, so cart edits made mid-checkout do not affect it. The cart
//! is cleared only when the payment settles.

use paperback_core::{
    CartSnapshot, CheckoutStatus, Money, OrderId, PaymentMethodToken, PaymentStatus,
    ShippingFieldError, ShippingForm, ShippingInfo,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::backend::{BackendError, MerchantBackend, PurchaseRequest, RequestedLine};
use crate::error::CartError;
use crate::gateway::{BillingDetails, CardInput, GatewayError, PaymentGateway};
use crate::service::ShoppingCart;

const GENERIC_FAILURE: &str = "Payment could not be completed. Please try again.";

/// Input of a checkout attempt.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub shipping: ShippingForm,
    pub card: CardInput,
}

/// Why an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The gateway rejected the card or the customer failed
    /// authentication. The customer must correct their input.
    GatewayClient,
    /// The backend reported a non-success payment status.
    BackendDeclined,
    /// The backend or gateway could not be reached.
    Transport,
    /// A response could not be interpreted.
    Protocol,
}

/// Terminal result of a checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Payment captured; the cart was cleared.
    Settled {
        order_id: Option<OrderId>,
        attempt_id: Uuid,
        charged: Money,
    },
    /// The attempt failed; the cart was kept.
    Failed {
        kind: FailureKind,
        message: String,
        /// Set when the backend created an order before the failure.
        order_id: Option<OrderId>,
        attempt_id: Uuid,
    },
}

impl CheckoutOutcome {
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Settled { .. })
    }

    #[must_use]
    pub const fn attempt_id(&self) -> Uuid {
        match self {
            Self::Settled { attempt_id, .. } | Self::Failed { attempt_id, .. } => *attempt_id,
        }
    }
}

/// Errors that stop a checkout before an attempt starts.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Another attempt is running.
    #[error("a checkout is already in progress")]
    InProgress,

    /// The shipping form did not pass validation.
    #[error("invalid shipping details: {0}")]
    InvalidForm(#[from] ShippingFieldError),

    /// The cart is not ready to be paid for.
    #[error(transparent)]
    Cart(#[from] CartError),
}

/// State of one checkout attempt. Never persisted; dropped when the attempt
/// ends.
#[derive(Debug)]
struct CheckoutSession {
    attempt_id: Uuid,
    snapshot: CartSnapshot,
    shipping: ShippingInfo,
    order_id: Option<OrderId>,
}

impl CheckoutSession {
    fn new(snapshot: CartSnapshot, shipping: ShippingInfo) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            snapshot,
            shipping,
            order_id: None,
        }
    }

    fn purchase_request(&self, token: PaymentMethodToken) -> PurchaseRequest {
        PurchaseRequest {
            items: self
                .snapshot
                .items()
                .iter()
                .map(RequestedLine::from)
                .collect(),
            shipping_info: self.shipping.clone(),
            payment_method_token: token,
        }
    }
}

/// Checkout orchestrator for one session.
pub struct Checkout<B, G> {
    cart: ShoppingCart<B>,
    gateway: G,
    status: watch::Sender<CheckoutStatus>,
}

impl<B, G> std::fmt::Debug for Checkout<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl<B: MerchantBackend, G: PaymentGateway> Checkout<B, G> {
    #[must_use]
    pub fn new(cart: ShoppingCart<B>, gateway: G) -> Self {
        let (status, _) = watch::channel(CheckoutStatus::Idle);
        Self {
            cart,
            gateway,
            status,
        }
    }

    #[must_use]
    pub const fn cart(&self) -> &ShoppingCart<B> {
        &self.cart
    }

    #[must_use]
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> CheckoutStatus {
        *self.status.borrow()
    }

    /// Subscribe to status changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CheckoutStatus> {
        self.status.subscribe()
    }

    /// Return a finished attempt to `Idle`. Returns whether the status
    /// changed.
    pub fn reset(&self) -> bool {
        self.status.send_if_modified(|status| {
            if status.is_terminal() {
                *status = CheckoutStatus::Idle;
                true
            } else {
                false
            }
        })
    }

    /// Run one checkout attempt.
    ///
    /// Failures after the attempt started (declined card, backend decline,
    /// network failure, unexpected response) are reported as
    /// [`CheckoutOutcome::Failed`] with the cart kept intact.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::InvalidForm`] if the shipping form is invalid
    /// - [`CheckoutError::InProgress`] if another attempt is running
    /// - [`CheckoutError::Cart`] if the cart is empty, could not be
    ///   validated, or was corrected and needs review
    #[instrument(skip_all, fields(attempt_id = tracing::field::Empty))]
    pub async fn submit(&self, request: CheckoutRequest) -> Result<CheckoutOutcome, CheckoutError> {
        let shipping = request.shipping.validate()?;
        self.begin()?;

        let snapshot = match self.cart.prepare_checkout().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(error = %e, "Cart not ready for checkout");
                self.transition(CheckoutStatus::Idle);
                return Err(e.into());
            }
        };

        let mut session = CheckoutSession::new(snapshot, shipping);
        tracing::Span::current().record("attempt_id", tracing::field::display(session.attempt_id));
        info!(
            items = session.snapshot.item_count(),
            subtotal = %session.snapshot.subtotal(),
            "Checkout started"
        );

        self.transition(CheckoutStatus::TokenizingPayment);
        let billing = BillingDetails::from(&session.shipping);
        let token = match self.gateway.tokenize(&request.card, &billing).await {
            Ok(token) => token,
            Err(e) => return Ok(self.fail_gateway(&session, &e)),
        };

        self.transition(CheckoutStatus::ConfirmingWithBackend);
        let purchase = session.purchase_request(token);
        let record = match self
            .cart
            .backend()
            .confirm_purchase(&purchase, session.attempt_id)
            .await
        {
            Ok(record) => record,
            Err(e) => return Ok(self.fail_backend(&session, &e)),
        };
        session.order_id = record.order_id;
        let charged = record.total.unwrap_or_else(|| session.snapshot.subtotal());

        match record.payment_status() {
            Some(PaymentStatus::Succeeded) => Ok(self.settle(&session, charged)),
            Some(PaymentStatus::RequiresAction) => {
                let Some(secret) = record.continuation_secret else {
                    error!("Backend requested authentication without a continuation secret");
                    return Ok(self.fail(&session, FailureKind::Protocol, GENERIC_FAILURE));
                };

                self.transition(CheckoutStatus::RequiresAdditionalAuth);
                match self.gateway.complete_auth_challenge(&secret).await {
                    Ok(PaymentStatus::Succeeded) => Ok(self.settle(&session, charged)),
                    Ok(status) => {
                        let message =
                            format!("Payment authentication did not succeed (status: {status}).");
                        Ok(self.fail(&session, FailureKind::GatewayClient, &message))
                    }
                    Err(e) => Ok(self.fail_gateway(&session, &e)),
                }
            }
            Some(
                status @ (PaymentStatus::RequiresPaymentMethod
                | PaymentStatus::Failed
                | PaymentStatus::Pending),
            ) => {
                let message = record
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| declined_message(status).to_string());
                Ok(self.fail(&session, FailureKind::BackendDeclined, &message))
            }
            None => {
                error!(status = %record.status, "Unknown payment status from backend");
                Ok(self.fail(&session, FailureKind::Protocol, GENERIC_FAILURE))
            }
        }
    }

    /// Claim the orchestrator for a new attempt.
    fn begin(&self) -> Result<(), CheckoutError> {
        // A finished attempt passes through Idle; the swap happens in one step
        // so two submits cannot both start.
        let started = self.status.send_if_modified(|status| {
            if *status == CheckoutStatus::Idle || status.is_terminal() {
                *status = CheckoutStatus::FormValid;
                true
            } else {
                false
            }
        });

        if started {
            Ok(())
        } else {
            debug!(status = %self.status(), "Checkout already in progress");
            Err(CheckoutError::InProgress)
        }
    }

    fn transition(&self, next: CheckoutStatus) {
        self.status.send_modify(|status| {
            let allowed = status.can_transition_to(next);
            if !allowed {
                error!(from = %status, to = %next, "Illegal checkout transition");
            }
            debug_assert!(allowed, "illegal checkout transition {status} -> {next}");
            *status = next;
        });
    }

    fn settle(&self, session: &CheckoutSession, charged: Money) -> CheckoutOutcome {
        self.cart.clear();
        self.transition(CheckoutStatus::Settled);
        info!(order_id = ?session.order_id, charged = %charged, "Checkout settled");

        CheckoutOutcome::Settled {
            order_id: session.order_id,
            attempt_id: session.attempt_id,
            charged,
        }
    }

    fn fail(&self, session: &CheckoutSession, kind: FailureKind, message: &str) -> CheckoutOutcome {
        self.transition(CheckoutStatus::Failed);
        warn!(order_id = ?session.order_id, kind = ?kind, message = %message, "Checkout failed");

        CheckoutOutcome::Failed {
            kind,
            message: message.to_string(),
            order_id: session.order_id,
            attempt_id: session.attempt_id,
        }
    }

    fn fail_gateway(&self, session: &CheckoutSession, err: &GatewayError) -> CheckoutOutcome {
        let kind = if err.is_client_error() {
            FailureKind::GatewayClient
        } else if err.is_transport() {
            FailureKind::Transport
        } else {
            FailureKind::Protocol
        };
        self.fail(session, kind, &err.user_message())
    }

    fn fail_backend(&self, session: &CheckoutSession, err: &BackendError) -> CheckoutOutcome {
        match err {
            BackendError::Malformed(_) => self.fail(session, FailureKind::Protocol, GENERIC_FAILURE),
            err if err.is_transport() => self.fail(
                session,
                FailureKind::Transport,
                "We could not confirm your payment with the store. Check your orders before trying again.",
            ),
            err => self.fail(session, FailureKind::BackendDeclined, &err.user_message()),
        }
    }
}

const fn declined_message(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::RequiresPaymentMethod => {
            "Your payment method was declined. Please use a different one."
        }
        PaymentStatus::Pending => "Your payment is still being processed and was not completed.",
        _ => "Your payment failed. Please try again.",
    }
}
