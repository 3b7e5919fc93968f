//! Integration tests for Paperback.
//!
//! The clients run against `wiremock` servers standing in for the merchant
//! backend and the payment gateway; nothing external is needed.
//!
//! ```bash
//! cargo test -p paperback-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `backend_client` - Merchant backend HTTP contract
//! - `stripe_gateway` - Tokenization and authentication challenge polling
//! - `checkout_flow` - Cart and checkout end to end, with a file-backed cart
//!
//! This library holds the fixtures the test files share.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use paperback_cart::{
    BackendClient, BackendConfig, CardInput, Cart, FileStore, GatewayConfig, ShoppingCart,
};
use paperback_core::{Money, ProductId, ProductListing, ShippingForm};
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Bearer token the backend fixtures expect.
pub const API_TOKEN: &str = "tok_9fQ2xLr7Vb3nKp8Zw4Hs";

/// Publishable key the gateway fixtures expect.
pub const PUBLISHABLE_KEY: &str = "pk_test_51Hq8Zr2eZvKYlo2C";

/// Backend configuration pointing at a mock server.
///
/// # Panics
///
/// Panics if the mock server URI is not a URL.
#[must_use]
pub fn backend_config(server: &MockServer) -> BackendConfig {
    let mut config = BackendConfig::new(Url::parse(&server.uri()).expect("mock server URI"));
    config.api_token = Some(SecretString::from(API_TOKEN.to_string()));
    config
}

/// Gateway configuration pointing at a mock server, polling fast.
///
/// # Panics
///
/// Panics if the mock server URI is not a URL.
#[must_use]
pub fn gateway_config(server: &MockServer) -> GatewayConfig {
    let mut config = GatewayConfig::new(
        Url::parse(&server.uri()).expect("mock server URI"),
        Some(PUBLISHABLE_KEY.to_string()),
    );
    config.poll_interval = Duration::from_millis(10);
    config.max_polls = 5;
    config
}

/// A cart persisted under `dir`, confirmed against the mock backend.
///
/// # Panics
///
/// Panics if the backend client cannot be built.
#[must_use]
pub fn open_shop(server: &MockServer, dir: &Path) -> ShoppingCart<BackendClient> {
    let backend = BackendClient::new(&backend_config(server)).expect("backend client");
    ShoppingCart::new(Cart::open(FileStore::new(dir)), backend)
}

/// A catalogue listing.
#[must_use]
pub fn listing(id: i64, title: &str, cents: i64, stock: u32) -> ProductListing {
    ProductListing {
        id: ProductId::new(id),
        title: title.to_string(),
        price: Money::from_cents(cents),
        stock,
        image_url: None,
    }
}

/// A shipping form that passes validation.
#[must_use]
pub fn shipping_form() -> ShippingForm {
    ShippingForm {
        full_name: "Ada Lovelace".to_string(),
        address_line1: "12 Analytical Way".to_string(),
        city: "London".to_string(),
        postal_code: "NW1 6XE".to_string(),
        country: "gb".to_string(),
    }
}

/// Test card details.
#[must_use]
pub fn card() -> CardInput {
    CardInput {
        number: SecretString::from("4242424242424242".to_string()),
        exp_month: 12,
        exp_year: 2030,
        cvc: SecretString::from("123".to_string()),
    }
}

fn price(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[derive(Debug, Clone)]
struct Product {
    title: String,
    cents: i64,
    stock: u32,
}

/// Stateful stand-in for the validation endpoint.
///
/// Answers each request from an in-memory catalogue: lines for unknown
/// products are left out, and a line is valid when stock covers the
/// requested quantity. Clones share the catalogue, so stock can change
/// between calls.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    products: Arc<Mutex<HashMap<i64, Product>>>,
}

impl Catalogue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_product(self, id: i64, title: &str, cents: i64, stock: u32) -> Self {
        self.lock().insert(
            id,
            Product {
                title: title.to_string(),
                cents,
                stock,
            },
        );
        self
    }

    pub fn set_stock(&self, id: i64, stock: u32) {
        if let Some(product) = self.lock().get_mut(&id) {
            product.stock = stock;
        }
    }

    pub fn set_price(&self, id: i64, cents: i64) {
        if let Some(product) = self.lock().get_mut(&id) {
            product.cents = cents;
        }
    }

    /// Serve this catalogue on the server's validation endpoint.
    pub async fn mount(&self, server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/cart/validate"))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Product>> {
        self.products.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Respond for Catalogue {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = request.body_json::<Value>() else {
            return ResponseTemplate::new(400).set_body_json(json!({"message": "Bad request"}));
        };
        let requested = body
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let products = self.lock();
        let mut lines = Vec::new();
        let mut total = 0;
        for item in &requested {
            let id = item.get("productId").and_then(Value::as_i64).unwrap_or(0);
            let quantity = item
                .get("quantity")
                .and_then(Value::as_u64)
                .and_then(|q| u32::try_from(q).ok())
                .unwrap_or(0);
            let Some(product) = products.get(&id) else {
                continue;
            };
            total += product.cents * i64::from(quantity.min(product.stock));
            lines.push(json!({
                "productId": id,
                "titleEcho": product.title,
                "unitPriceAuthoritative": price(product.cents),
                "quantityRequested": quantity,
                "quantityAvailable": product.stock,
                "isValid": product.stock >= quantity,
            }));
        }

        let all_lines_valid = lines.len() == requested.len()
            && lines
                .iter()
                .all(|line| line.get("isValid") == Some(&Value::Bool(true)));

        ResponseTemplate::new(200).set_body_json(json!({
            "lines": lines,
            "totalAuthoritative": price(total),
            "allLinesValid": all_lines_valid,
        }))
    }
}
