//! Merchant backend HTTP contract.

use paperback_cart::backend::{
    BackendClient, BackendError, MerchantBackend, PurchaseRequest, RequestedLine,
    ValidationRequest,
};
use paperback_cart::{BackendConfig, CartError};
use paperback_core::{LineItem, Money, OrderId, PaymentMethodToken, PaymentStatus, ProductId};
use paperback_integration_tests::{API_TOKEN, backend_config, listing, shipping_form};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{bearer_token, body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> BackendClient {
    BackendClient::new(&backend_config(server)).expect("backend client")
}

fn request_for(id: i64, quantity: u32) -> ValidationRequest {
    let item = LineItem::from_listing(&listing(id, "Dune", 1999, 9), quantity);
    ValidationRequest::for_items(&[item])
}

fn purchase() -> PurchaseRequest {
    PurchaseRequest {
        items: vec![RequestedLine {
            product_id: ProductId::new(7),
            quantity: 2,
        }],
        shipping_info: shipping_form().validate().expect("valid form"),
        payment_method_token: PaymentMethodToken::new("pm_123".to_string()),
    }
}

// ============================================================================
// Cart Validation
// ============================================================================

#[tokio::test]
async fn test_validate_cart_sends_lines_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cart/validate"))
        .and(bearer_token(API_TOKEN))
        .and(body_json(json!({"items": [{"productId": 7, "quantity": 2}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lines": [{
                "productId": 7,
                "titleEcho": "Dune",
                "unitPriceAuthoritative": 21.5,
                "quantityRequested": 2,
                "quantityAvailable": 9,
                "isValid": true
            }],
            "totalAuthoritative": "43.00",
            "allLinesValid": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let validation = client(&server)
        .validate_cart(&request_for(7, 2))
        .await
        .expect("validation");

    assert!(validation.all_lines_valid);
    assert_eq!(validation.total_authoritative, Money::from_cents(4300));
    let line = validation.lines.first().expect("one line");
    assert_eq!(line.product_id, ProductId::new(7));
    assert_eq!(line.unit_price_authoritative, Money::from_cents(2150));
    assert!(line.reason_message.is_none());
}

#[tokio::test]
async fn test_validate_cart_without_token_sends_no_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/cart/check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lines": [],
            "totalAuthoritative": "0",
            "allLinesValid": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = BackendConfig::new(server.uri().parse().expect("mock server URI"));
    config.validate_path = "/api/cart/check".to_string();
    let client = BackendClient::new(&config).expect("backend client");
    client
        .validate_cart(&request_for(7, 1))
        .await
        .expect("validation");

    let requests = server.received_requests().await.expect("recording enabled");
    let request = requests.first().expect("one request");
    assert!(!request.headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_server_error_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cart/validate"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client(&server)
        .validate_cart(&request_for(7, 1))
        .await
        .expect_err("503 must fail");

    assert!(matches!(err, BackendError::Status { status: 503, .. }));
    assert!(err.is_transport());
    assert!(matches!(CartError::from(err), CartError::Transport(_)));
}

#[tokio::test]
async fn test_client_error_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cart/validate"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Too many items"})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .validate_cart(&request_for(7, 1))
        .await
        .expect_err("422 must fail");

    match &err {
        BackendError::Status { status, message } => {
            assert_eq!(*status, 422);
            assert_eq!(message, "Too many items");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_transport());

    let cart_err = CartError::from(err);
    assert!(matches!(cart_err, CartError::Rejected(_)));
    assert!(!cart_err.is_recoverable());
}

#[tokio::test]
async fn test_malformed_body_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cart/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .validate_cart(&request_for(7, 1))
        .await
        .expect_err("HTML must not parse");

    assert!(matches!(err, BackendError::Malformed(_)));
    assert!(matches!(CartError::from(err), CartError::Protocol(_)));
}

#[tokio::test]
async fn test_unreachable_backend_is_transport() {
    let config = BackendConfig::new("http://127.0.0.1:9".parse().expect("URL"));
    let client = BackendClient::new(&config).expect("backend client");

    let err = client
        .validate_cart(&request_for(7, 1))
        .await
        .expect_err("nothing listens on the discard port");

    assert!(matches!(err, BackendError::Http(_)));
    assert!(err.is_transport());
}

// ============================================================================
// Purchase Confirmation
// ============================================================================

#[tokio::test]
async fn test_confirm_purchase_sends_idempotency_key_and_token_only() {
    let server = MockServer::start().await;
    let key = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/orders/confirm"))
        .and(bearer_token(API_TOKEN))
        .and(header("Idempotency-Key", key.to_string().as_str()))
        .and(body_partial_json(json!({
            "items": [{"productId": 7, "quantity": 2}],
            "shippingInfo": {"fullName": "Ada Lovelace", "country": "GB"},
            "paymentMethodToken": "pm_123"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "orderId": 41,
            "paymentStatus": "requires_action",
            "clientSecret": "pi_41_secret_abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = client(&server)
        .confirm_purchase(&purchase(), key)
        .await
        .expect("order record");

    assert_eq!(record.order_id, Some(OrderId::new(41)));
    assert_eq!(record.payment_status(), Some(PaymentStatus::RequiresAction));
    assert_eq!(
        record.continuation_secret.expect("secret").expose(),
        "pi_41_secret_abc"
    );

    let requests = server.received_requests().await.expect("recording enabled");
    let body = String::from_utf8_lossy(&requests.first().expect("one request").body).into_owned();
    assert!(!body.contains("4242"), "card data must never reach the backend");
}

#[tokio::test]
async fn test_confirm_purchase_decline_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/confirm"))
        .respond_with(
            ResponseTemplate::new(402)
                .set_body_json(json!({"error": {"message": "Insufficient funds"}})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .confirm_purchase(&purchase(), Uuid::new_v4())
        .await
        .expect_err("402 must fail");

    assert!(matches!(
        err,
        BackendError::Status { status: 402, ref message } if message == "Insufficient funds"
    ));
}
