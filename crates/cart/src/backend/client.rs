//! HTTP client for the merchant backend.

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::BackendConfig;

use super::MerchantBackend;
use super::error::BackendError;
use super::types::{CartValidation, OrderRecord, PurchaseRequest, ValidationRequest};

/// Header carrying the checkout attempt id on purchase confirmation.
const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Merchant backend client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    validate_url: Url,
    confirm_url: Url,
    api_token: Option<SecretString>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("validate_url", &self.inner.validate_url.as_str())
            .field("confirm_url", &self.inner.confirm_url.as_str())
            .field("api_token", &self.inner.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if an endpoint path does not form a valid URL or the
    /// HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let validate_url = config
            .validate_url()
            .map_err(|e| BackendError::Malformed(format!("invalid validation URL: {e}")))?;
        let confirm_url = config
            .confirm_url()
            .map_err(|e| BackendError::Malformed(format!("invalid confirmation URL: {e}")))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("paperback/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                validate_url,
                confirm_url,
                api_token: config.api_token.clone(),
            }),
        })
    }

    fn post(&self, url: &Url) -> reqwest::RequestBuilder {
        let request = self.inner.client.post(url.clone());
        match &self.inner.api_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// Read the body as text, then parse it.
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Self::error_from_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, body = %body.chars().take(200).collect::<String>(), "Unexpected backend response");
            BackendError::Malformed(e.to_string())
        })
    }

    fn error_from_status(status: StatusCode, body: &str) -> BackendError {
        let message = extract_error_message(body)
            .unwrap_or_else(|| body.trim().chars().take(200).collect());

        if status.is_server_error() {
            warn!(status = status.as_u16(), message = %message, "Backend server error");
        } else {
            debug!(status = status.as_u16(), message = %message, "Backend rejected request");
        }

        BackendError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

/// Pull a human-readable message out of a JSON error body.
///
/// Accepts `{"message": "..."}` and `{"error": {"message": "..."}}`, as well
/// as `{"error": "..."}`.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let message = value
        .get("message")
        .or_else(|| value.get("error").and_then(|e| e.get("message")))
        .or_else(|| value.get("error"))?
        .as_str()?;
    Some(message.to_string())
}

impl MerchantBackend for BackendClient {
    #[instrument(skip(self, request), fields(lines = request.items.len()))]
    async fn validate_cart(
        &self,
        request: &ValidationRequest,
    ) -> Result<CartValidation, BackendError> {
        let response = self
            .post(&self.inner.validate_url)
            .json(request)
            .send()
            .await?;

        let validation: CartValidation = Self::handle_response(response).await?;
        debug!(
            lines = validation.lines.len(),
            all_lines_valid = validation.all_lines_valid,
            "Cart validated"
        );
        Ok(validation)
    }

    #[instrument(skip(self, request), fields(lines = request.items.len(), attempt_id = %idempotency_key))]
    async fn confirm_purchase(
        &self,
        request: &PurchaseRequest,
        idempotency_key: Uuid,
    ) -> Result<OrderRecord, BackendError> {
        let response = self
            .post(&self.inner.confirm_url)
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key.to_string())
            .json(request)
            .send()
            .await?;

        let record: OrderRecord = Self::handle_response(response).await?;
        debug!(order_id = ?record.order_id, status = %record.status, "Purchase confirmed by backend");
        Ok(record)
    }
}
