//! In-memory fakes for the backend and the gateway.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use paperback_core::{
    ContinuationSecret, Money, OrderId, PaymentMethodToken, PaymentStatus, ProductId,
    ProductListing,
};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::backend::{
    BackendError, CartValidation, MerchantBackend, OrderRecord, PurchaseRequest, ValidatedLine,
    ValidationRequest,
};
use crate::gateway::{BillingDetails, CardInput, GatewayError, PaymentGateway};

pub fn listing(id: i64, cents: i64, stock: u32) -> ProductListing {
    ProductListing {
        id: ProductId::new(id),
        title: format!("Book {id}"),
        price: Money::from_cents(cents),
        stock,
        image_url: None,
    }
}

pub fn order(id: i64, status: &str, secret: Option<&str>) -> OrderRecord {
    OrderRecord {
        order_id: Some(OrderId::new(id)),
        status: status.to_string(),
        continuation_secret: secret.map(|s| ContinuationSecret::new(s.to_string())),
        message: None,
        total: None,
    }
}

#[derive(Debug, Clone, Copy)]
struct Product {
    price: Money,
    stock: u32,
    active: bool,
}

#[derive(Default)]
struct BackendState {
    catalogue: HashMap<ProductId, Product>,
    validation_failures: VecDeque<BackendError>,
    orders: VecDeque<Result<OrderRecord, BackendError>>,
    validation_calls: usize,
    purchases: Vec<(PurchaseRequest, Uuid)>,
}

/// Backend that validates against an in-memory catalogue.
///
/// Unknown products are left out of the response. Purchases succeed unless
/// a result was queued with [`FakeBackend::push_order`].
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
    hold: Mutex<Option<Arc<Notify>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(self, id: i64, cents: i64, stock: u32) -> Self {
        self.lock().catalogue.insert(
            ProductId::new(id),
            Product {
                price: Money::from_cents(cents),
                stock,
                active: true,
            },
        );
        self
    }

    pub fn set_stock(&self, id: i64, stock: u32) {
        if let Some(product) = self.lock().catalogue.get_mut(&ProductId::new(id)) {
            product.stock = stock;
        }
    }

    pub fn discontinue(&self, id: i64) {
        if let Some(product) = self.lock().catalogue.get_mut(&ProductId::new(id)) {
            product.active = false;
        }
    }

    pub fn fail_next_validation(&self, err: BackendError) {
        self.lock().validation_failures.push_back(err);
    }

    pub fn push_order(&self, result: Result<OrderRecord, BackendError>) {
        self.lock().orders.push_back(result);
    }

    /// Make the next validation call wait until the returned handle is
    /// notified.
    pub fn hold_next_validation(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&notify));
        notify
    }

    pub fn validation_calls(&self) -> usize {
        self.lock().validation_calls
    }

    pub fn purchases(&self) -> Vec<(PurchaseRequest, Uuid)> {
        self.lock().purchases.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn validate(&self, request: &ValidationRequest) -> Result<CartValidation, BackendError> {
        let mut state = self.lock();
        state.validation_calls += 1;
        if let Some(err) = state.validation_failures.pop_front() {
            return Err(err);
        }

        let lines: Vec<ValidatedLine> = request
            .items
            .iter()
            .filter_map(|requested| {
                let product = state.catalogue.get(&requested.product_id)?;
                Some(ValidatedLine {
                    product_id: requested.product_id,
                    title_echo: format!("Book {}", requested.product_id),
                    unit_price_authoritative: product.price,
                    quantity_requested: requested.quantity,
                    quantity_available: i64::from(product.stock),
                    is_valid: product.active && product.stock >= requested.quantity,
                    reason_message: (!product.active).then(|| "Discontinued".to_string()),
                })
            })
            .collect();

        let total_authoritative = lines
            .iter()
            .map(|line| {
                let available = u32::try_from(line.quantity_available).unwrap_or(0);
                line.unit_price_authoritative
                    .times(line.quantity_requested.min(available))
            })
            .sum();
        let all_lines_valid =
            lines.len() == request.items.len() && lines.iter().all(|line| line.is_valid);

        Ok(CartValidation {
            lines,
            total_authoritative,
            all_lines_valid,
        })
    }
}

impl MerchantBackend for FakeBackend {
    async fn validate_cart(
        &self,
        request: &ValidationRequest,
    ) -> Result<CartValidation, BackendError> {
        let hold = self
            .hold
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hold) = hold {
            hold.notified().await;
        }
        self.validate(request)
    }

    async fn confirm_purchase(
        &self,
        request: &PurchaseRequest,
        idempotency_key: Uuid,
    ) -> Result<OrderRecord, BackendError> {
        let mut state = self.lock();
        state.purchases.push((request.clone(), idempotency_key));
        let next_id = i64::try_from(state.purchases.len()).unwrap_or(i64::MAX) + 1000;
        state
            .orders
            .pop_front()
            .unwrap_or_else(|| Ok(order(next_id, "succeeded", None)))
    }
}

#[derive(Default)]
struct GatewayState {
    tokens: VecDeque<Result<PaymentMethodToken, GatewayError>>,
    challenges: VecDeque<Result<PaymentStatus, GatewayError>>,
    tokenize_calls: usize,
    challenge_calls: usize,
}

/// Gateway that returns queued results, or success by default.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<GatewayState>,
    hold: Mutex<Option<Arc<Notify>>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_token(&self, result: Result<PaymentMethodToken, GatewayError>) {
        self.lock().tokens.push_back(result);
    }

    pub fn push_challenge(&self, result: Result<PaymentStatus, GatewayError>) {
        self.lock().challenges.push_back(result);
    }

    /// Make the next tokenize call wait until the returned handle is
    /// notified.
    pub fn hold_next_tokenize(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&notify));
        notify
    }

    pub fn tokenize_calls(&self) -> usize {
        self.lock().tokenize_calls
    }

    pub fn challenge_calls(&self) -> usize {
        self.lock().challenge_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PaymentGateway for FakeGateway {
    async fn tokenize(
        &self,
        _card: &CardInput,
        _billing: &BillingDetails,
    ) -> Result<PaymentMethodToken, GatewayError> {
        let hold = self
            .hold
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hold) = hold {
            hold.notified().await;
        }
        let mut state = self.lock();
        state.tokenize_calls += 1;
        state
            .tokens
            .pop_front()
            .unwrap_or_else(|| Ok(PaymentMethodToken::new("pm_fake".to_string())))
    }

    async fn complete_auth_challenge(
        &self,
        _secret: &ContinuationSecret,
    ) -> Result<PaymentStatus, GatewayError> {
        let mut state = self.lock();
        state.challenge_calls += 1;
        state
            .challenges
            .pop_front()
            .unwrap_or(Ok(PaymentStatus::Succeeded))
    }
}
