//! Merchant backend wire types.
//!
//! Field names are camelCase on the wire. Unknown response fields are
//! ignored.

use paperback_core::{
    ContinuationSecret, LineItem, Money, OrderId, PaymentMethodToken, PaymentStatus, ProductId,
    ShippingInfo,
};
use serde::{Deserialize, Serialize};

/// A product and quantity to validate or purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl From<&LineItem> for RequestedLine {
    fn from(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
        }
    }
}

/// Body of the cart validation call: every line of the cart in one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub items: Vec<RequestedLine>,
}

impl ValidationRequest {
    /// Build a request covering every given line.
    #[must_use]
    pub fn for_items(items: &[LineItem]) -> Self {
        Self {
            items: items.iter().map(RequestedLine::from).collect(),
        }
    }
}

/// The backend's verdict on one requested line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub title_echo: String,
    pub unit_price_authoritative: Money,
    pub quantity_requested: u32,
    /// Negative when the product is oversold.
    pub quantity_available: i64,
    pub is_valid: bool,
    #[serde(default)]
    pub reason_message: Option<String>,
}

/// Response of the cart validation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartValidation {
    pub lines: Vec<ValidatedLine>,
    pub total_authoritative: Money,
    pub all_lines_valid: bool,
}

/// Body of the purchase confirmation call.
///
/// Carries the payment method token only; raw card data never reaches the
/// merchant backend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub items: Vec<RequestedLine>,
    pub shipping_info: ShippingInfo,
    pub payment_method_token: PaymentMethodToken,
}

/// Order record returned by the purchase confirmation call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(alias = "paymentStatus")]
    pub status: String,
    #[serde(default, alias = "clientSecret")]
    pub continuation_secret: Option<ContinuationSecret>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub total: Option<Money>,
}

impl OrderRecord {
    /// Parsed payment status, or `None` if the backend sent one we do not
    /// know.
    #[must_use]
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        self.status.parse().ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_request_shape() {
        let item = LineItem {
            product_id: ProductId::new(7),
            display_name: "Dune".to_string(),
            unit_price_cached: Money::from_cents(1999),
            quantity: 5,
            stock_cached: 9,
            image_ref: String::new(),
        };
        let json = serde_json::to_value(ValidationRequest::for_items(&[item])).unwrap();
        assert_eq!(json, serde_json::json!({"items": [{"productId": 7, "quantity": 5}]}));
    }

    #[test]
    fn test_validation_response_parses() {
        let json = r#"{
            "lines": [{
                "productId": 7,
                "titleEcho": "Dune",
                "unitPriceAuthoritative": 21.5,
                "quantityRequested": 5,
                "quantityAvailable": 2,
                "isValid": false,
                "reasonMessage": "Only 2 left",
                "imageUrl": "ignored"
            }],
            "totalAuthoritative": "43.00",
            "allLinesValid": false
        }"#;
        let validation: CartValidation = serde_json::from_str(json).unwrap();
        let line = validation.lines.first().unwrap();
        assert_eq!(line.quantity_available, 2);
        assert_eq!(line.unit_price_authoritative, Money::from_cents(2150));
        assert_eq!(line.reason_message.as_deref(), Some("Only 2 left"));
        assert_eq!(validation.total_authoritative, Money::from_cents(4300));
    }

    #[test]
    fn test_oversold_line_does_not_fail_the_batch() {
        let json = r#"{
            "lines": [
                {"productId": 1, "unitPriceAuthoritative": "5.00", "quantityRequested": 2,
                 "quantityAvailable": -1, "isValid": false},
                {"productId": 2, "unitPriceAuthoritative": "7.50", "quantityRequested": 1,
                 "quantityAvailable": 3, "isValid": true}
            ],
            "totalAuthoritative": "7.50",
            "allLinesValid": false
        }"#;
        let validation: CartValidation = serde_json::from_str(json).unwrap();
        assert_eq!(validation.lines.len(), 2);
        assert_eq!(validation.lines.first().unwrap().quantity_available, -1);
    }

    #[test]
    fn test_order_record_status() {
        let record: OrderRecord = serde_json::from_str(
            r#"{"orderId": 55, "status": "requires_action", "continuationSecret": "pi_1_secret_2"}"#,
        )
        .unwrap();
        assert_eq!(record.order_id, Some(OrderId::new(55)));
        assert_eq!(record.payment_status(), Some(PaymentStatus::RequiresAction));
        assert_eq!(record.continuation_secret.unwrap().expose(), "pi_1_secret_2");

        let record: OrderRecord =
            serde_json::from_str(r#"{"paymentStatus": "on_hold"}"#).unwrap();
        assert_eq!(record.payment_status(), None);
        assert!(record.order_id.is_none());

        let record: OrderRecord = serde_json::from_str(
            r#"{"orderId": 56, "paymentStatus": "requires_action", "clientSecret": "pi_3_secret_4"}"#,
        )
        .unwrap();
        assert_eq!(record.continuation_secret.unwrap().expose(), "pi_3_secret_4");
    }
}
