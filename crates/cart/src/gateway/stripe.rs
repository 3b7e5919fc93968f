//! Stripe implementation of the payment gateway.
//!
//! Uses the publishable key only: tokenization creates a card payment
//! method, and authentication challenges are completed by showing the
//! customer the redirect URL from the payment intent's `next_action` and
//! polling the intent until it leaves `requires_action`.

use std::sync::Arc;

use paperback_core::{ContinuationSecret, PaymentMethodToken, PaymentStatus};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::GatewayConfig;

use super::error::GatewayError;
use super::{BillingDetails, CardInput, PaymentGateway};

/// Separator between the intent id and the secret part of a client secret.
const CLIENT_SECRET_SEPARATOR: &str = "_secret_";

/// Callback that shows the customer where to complete authentication.
pub type ChallengePrompt = Arc<dyn Fn(&str) + Send + Sync>;

/// Stripe gateway client.
#[derive(Clone)]
pub struct StripeGateway {
    inner: Arc<StripeGatewayInner>,
    prompt: ChallengePrompt,
}

struct StripeGatewayInner {
    client: reqwest::Client,
    config: GatewayConfig,
    publishable_key: String,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("publishable_key", &self.inner.publishable_key)
            .field("max_polls", &self.inner.config.max_polls)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct PaymentMethod {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    status: String,
    #[serde(default)]
    next_action: Option<NextAction>,
    #[serde(default)]
    last_payment_error: Option<StripeErrorBody>,
}

#[derive(Debug, Deserialize)]
struct NextAction {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    redirect_to_url: Option<RedirectToUrl>,
}

#[derive(Debug, Deserialize)]
struct RedirectToUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl StripeGateway {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if no publishable key is configured or the HTTP client
    /// cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let publishable_key = config.publishable_key.clone().ok_or_else(|| {
            GatewayError::NotConfigured("PAPERBACK_GATEWAY_PUBLISHABLE_KEY is not set".to_string())
        })?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("paperback/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeGatewayInner {
                client,
                config: config.clone(),
                publishable_key,
            }),
            prompt: Arc::new(|url: &str| {
                info!(url = %url, "Complete payment authentication at this URL");
            }),
        })
    }

    /// Replace the hook that shows the customer the authentication URL.
    #[must_use]
    pub fn with_challenge_prompt(mut self, prompt: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.prompt = Arc::new(prompt);
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.inner
            .config
            .base_url
            .join(path)
            .map_err(|e| GatewayError::Protocol(format!("invalid gateway URL: {e}")))
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_server_error() {
            warn!(status = status.as_u16(), "Payment gateway server error");
            return Err(GatewayError::Unavailable(status.as_u16()));
        }
        if !status.is_success() {
            return Err(Self::client_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "Unexpected payment gateway response");
            GatewayError::Protocol(e.to_string())
        })
    }

    fn client_error(status: StatusCode, body: &str) -> GatewayError {
        match serde_json::from_str::<StripeErrorResponse>(body) {
            Ok(StripeErrorResponse {
                error:
                    StripeErrorBody {
                        code,
                        message: Some(message),
                    },
            }) => {
                debug!(status = status.as_u16(), code = ?code, "Payment gateway rejected request");
                GatewayError::Client { code, message }
            }
            _ => GatewayError::Protocol(format!(
                "status {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )),
        }
    }

    async fn fetch_intent(&self, url: &Url) -> Result<PaymentIntent, GatewayError> {
        let response = self
            .inner
            .client
            .get(url.clone())
            .bearer_auth(&self.inner.publishable_key)
            .send()
            .await?;
        Self::handle_response(response).await
    }
}

/// Intent id embedded in a client secret (`pi_123_secret_abc` -> `pi_123`).
fn intent_id(secret: &ContinuationSecret) -> Result<&str, GatewayError> {
    let malformed = || GatewayError::Protocol("malformed continuation secret".to_string());
    let (id, _) = secret
        .expose()
        .split_once(CLIENT_SECRET_SEPARATOR)
        .ok_or_else(malformed)?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(malformed());
    }
    Ok(id)
}

impl PaymentGateway for StripeGateway {
    #[instrument(skip_all)]
    async fn tokenize(
        &self,
        card: &CardInput,
        billing: &BillingDetails,
    ) -> Result<PaymentMethodToken, GatewayError> {
        let exp_month = card.exp_month.to_string();
        let exp_year = card.exp_year.to_string();
        let form = [
            ("type", "card"),
            ("card[number]", card.number.expose_secret()),
            ("card[exp_month]", exp_month.as_str()),
            ("card[exp_year]", exp_year.as_str()),
            ("card[cvc]", card.cvc.expose_secret()),
            ("billing_details[name]", billing.name.as_str()),
            ("billing_details[address][line1]", billing.address_line1.as_str()),
            ("billing_details[address][city]", billing.city.as_str()),
            ("billing_details[address][postal_code]", billing.postal_code.as_str()),
            ("billing_details[address][country]", billing.country.as_str()),
        ];

        let response = self
            .inner
            .client
            .post(self.endpoint("v1/payment_methods")?)
            .bearer_auth(&self.inner.publishable_key)
            .form(&form)
            .send()
            .await?;

        let method: PaymentMethod = Self::handle_response(response).await?;
        debug!(payment_method = %method.id, "Card tokenized");
        Ok(PaymentMethodToken::new(method.id))
    }

    #[instrument(skip_all)]
    async fn complete_auth_challenge(
        &self,
        secret: &ContinuationSecret,
    ) -> Result<PaymentStatus, GatewayError> {
        let id = intent_id(secret)?;
        let mut url = self.endpoint(&format!("v1/payment_intents/{id}"))?;
        url.query_pairs_mut()
            .append_pair("client_secret", secret.expose());

        let mut prompted = false;
        for attempt in 0..self.inner.config.max_polls {
            if attempt > 0 {
                tokio::time::sleep(self.inner.config.poll_interval).await;
            }

            let intent = self.fetch_intent(&url).await?;
            debug!(intent = %id, status = %intent.status, attempt, "Polled payment intent");

            match intent.status.as_str() {
                "succeeded" | "requires_capture" => return Ok(PaymentStatus::Succeeded),
                "canceled" => return Ok(PaymentStatus::Failed),
                "requires_payment_method" => {
                    let (code, message) = intent
                        .last_payment_error
                        .map(|e| (e.code, e.message))
                        .unwrap_or_default();
                    return Err(GatewayError::Client {
                        code,
                        message: message.unwrap_or_else(|| {
                            "Payment authentication failed. Please try another payment method."
                                .to_string()
                        }),
                    });
                }
                "requires_action" => {
                    if prompted {
                        continue;
                    }
                    match intent.next_action {
                        Some(NextAction {
                            redirect_to_url: Some(redirect),
                            ..
                        }) => {
                            (self.prompt)(&redirect.url);
                            prompted = true;
                        }
                        Some(action) => {
                            return Err(GatewayError::UnsupportedChallenge(action.action_type));
                        }
                        None => {
                            return Err(GatewayError::Protocol(
                                "requires_action without next_action".to_string(),
                            ));
                        }
                    }
                }
                "processing" | "requires_confirmation" => {}
                other => {
                    return Err(GatewayError::Protocol(format!(
                        "unknown payment intent status: {other}"
                    )));
                }
            }
        }

        warn!(intent = %id, "Authentication challenge not completed in time");
        Err(GatewayError::ChallengeTimedOut)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_id_from_secret() {
        let secret = ContinuationSecret::new("pi_3Nabc_secret_xyz".to_string());
        assert_eq!(intent_id(&secret).unwrap(), "pi_3Nabc");

        let secret = ContinuationSecret::new("no-separator".to_string());
        assert!(matches!(intent_id(&secret), Err(GatewayError::Protocol(_))));

        let secret = ContinuationSecret::new("../x_secret_y".to_string());
        assert!(intent_id(&secret).is_err());
    }

    #[test]
    fn test_client_error_parsing() {
        let body = r#"{"error": {"code": "card_declined", "message": "Your card was declined.", "type": "card_error"}}"#;
        let err = StripeGateway::client_error(StatusCode::PAYMENT_REQUIRED, body);
        assert!(matches!(
            err,
            GatewayError::Client { ref code, ref message }
                if code.as_deref() == Some("card_declined") && message == "Your card was declined."
        ));

        let err = StripeGateway::client_error(StatusCode::BAD_REQUEST, "nope");
        assert!(matches!(err, GatewayError::Protocol(_)));
    }

    #[test]
    fn test_requires_publishable_key() {
        let config = GatewayConfig::new(Url::parse("https://api.stripe.com").unwrap(), None);
        assert!(matches!(
            StripeGateway::new(&config),
            Err(GatewayError::NotConfigured(_))
        ));
    }
}
