//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PAPERBACK_API_URL` - Merchant backend base URL
//!
//! ## Optional
//! - `PAPERBACK_VALIDATE_PATH` - Cart validation path (default: `cart/validate`)
//! - `PAPERBACK_CONFIRM_PATH` - Purchase confirmation path (default: `orders/confirm`)
//! - `PAPERBACK_API_TOKEN` - Bearer token from the session layer (high entropy)
//! - `PAPERBACK_DATA_DIR` - Directory of the stored cart (default: `.paperback`)
//! - `PAPERBACK_GATEWAY_URL` - Payment gateway base URL (default: `https://api.stripe.com`)
//! - `PAPERBACK_GATEWAY_PUBLISHABLE_KEY` - Gateway publishable key (`pk_...`), needed to pay
//! - `PAPERBACK_AUTH_POLL_INTERVAL_SECS` - Authentication challenge poll interval (default: 3)
//! - `PAPERBACK_AUTH_POLL_ATTEMPTS` - Authentication challenge poll attempts (default: 100)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Merchant backend configuration
    pub backend: BackendConfig,
    /// Payment gateway configuration
    pub gateway: GatewayConfig,
    /// Directory holding the persisted cart
    pub data_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Merchant backend configuration.
///
/// Implements `Debug` manually to redact the bearer token.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL; endpoint paths are resolved against it
    pub base_url: Url,
    /// Path of the cart validation endpoint
    pub validate_path: String,
    /// Path of the purchase confirmation endpoint
    pub confirm_path: String,
    /// Bearer token issued by the session layer
    pub api_token: Option<SecretString>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("validate_path", &self.validate_path)
            .field("confirm_path", &self.confirm_path)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Payment gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway API base URL
    pub base_url: Url,
    /// Publishable key (safe to ship in a client)
    pub publishable_key: Option<String>,
    /// Delay between authentication challenge polls
    pub poll_interval: Duration,
    /// Maximum number of authentication challenge polls
    pub max_polls: u32,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            backend: BackendConfig::from_env()?,
            gateway: GatewayConfig::from_env()?,
            data_dir: PathBuf::from(get_env_or_default("PAPERBACK_DATA_DIR", ".paperback")),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl BackendConfig {
    /// Configuration for a backend at `base_url` with default endpoint paths
    /// and no bearer token.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            validate_path: "cart/validate".to_string(),
            confirm_path: "orders/confirm".to_string(),
            api_token: None,
        }
    }

    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(get_url("PAPERBACK_API_URL", None)?);
        config.validate_path = get_env_or_default("PAPERBACK_VALIDATE_PATH", "cart/validate");
        config.confirm_path = get_env_or_default("PAPERBACK_CONFIRM_PATH", "orders/confirm");
        config.api_token = get_optional_env("PAPERBACK_API_TOKEN")
            .map(|token| {
                validate_secret_strength(&token, "PAPERBACK_API_TOKEN")?;
                Ok(SecretString::from(token))
            })
            .transpose()?;
        Ok(config)
    }

    /// Full URL of the cart validation endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the configured path does not form a valid URL.
    pub fn validate_url(&self) -> Result<Url, url::ParseError> {
        self.base_url.join(self.validate_path.trim_start_matches('/'))
    }

    /// Full URL of the purchase confirmation endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the configured path does not form a valid URL.
    pub fn confirm_url(&self) -> Result<Url, url::ParseError> {
        self.base_url.join(self.confirm_path.trim_start_matches('/'))
    }
}

impl GatewayConfig {
    /// Default gateway API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.stripe.com";

    /// Configuration for a gateway at `base_url` with default polling.
    #[must_use]
    pub fn new(base_url: Url, publishable_key: Option<String>) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            publishable_key,
            poll_interval: Duration::from_secs(3),
            max_polls: 100,
        }
    }

    fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_url("PAPERBACK_GATEWAY_URL", Some(Self::DEFAULT_BASE_URL))?;
        let publishable_key = get_optional_env("PAPERBACK_GATEWAY_PUBLISHABLE_KEY")
            .map(|key| {
                validate_publishable_key(&key, "PAPERBACK_GATEWAY_PUBLISHABLE_KEY")?;
                Ok(key)
            })
            .transpose()?;

        let mut config = Self::new(base_url, publishable_key);
        config.poll_interval =
            Duration::from_secs(get_parsed_or_default("PAPERBACK_AUTH_POLL_INTERVAL_SECS", 3)?);
        config.max_polls = get_parsed_or_default("PAPERBACK_AUTH_POLL_ATTEMPTS", 100)?;
        Ok(config)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |value| {
        value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Get a URL from the environment, required unless a default is given.
fn get_url(key: &str, default: Option<&str>) -> Result<Url, ConfigError> {
    let value = match default {
        Some(default) => get_env_or_default(key, default),
        None => get_required_env(key)?,
    };
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    reject_placeholder(secret, var_name)?;

    // Check entropy (real tokens have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}

/// Validate a gateway publishable key.
///
/// Secret (`sk_`) and restricted (`rk_`) keys must never ship in a client.
fn validate_publishable_key(key: &str, var_name: &str) -> Result<(), ConfigError> {
    if key.starts_with("sk_") || key.starts_with("rk_") {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            "server-side key; configure the publishable (pk_) key instead".to_string(),
        ));
    }
    if !key.starts_with("pk_") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "expected a publishable key starting with 'pk_'".to_string(),
        ));
    }
    reject_placeholder(key, var_name)
}

fn reject_placeholder(value: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = value.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}
