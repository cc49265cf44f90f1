//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `SHOPFRONT_BASE_URL` - Public URL of this API
//! - `SHOPFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `SHOPFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOPFRONT_PORT` - Listen port (default: 5000)
//! - `SHOPFRONT_FRONTEND_URL` - Storefront UI used for payment redirects
//!   (default: <http://localhost:3000>)
//! - `SHOPFRONT_CORS_ORIGIN` - Allowed browser origin (default: the frontend URL)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//!
//! ## PayPal (all or nothing)
//! - `PAYPAL_CLIENT_ID`, `PAYPAL_CLIENT_SECRET`
//! - `PAYPAL_MODE` - `sandbox` or `live` (default: sandbox)
//!
//! ## VNPay (all or nothing)
//! - `VNPAY_TMN_CODE`, `VNPAY_HASH_SECRET`, `VNPAY_URL`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const PAYPAL_SANDBOX_URL: &str = "https://api-m.sandbox.paypal.com";
const PAYPAL_LIVE_URL: &str = "https://api-m.paypal.com";

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

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the API
    pub base_url: String,
    /// Base URL of the storefront UI
    pub frontend_url: String,
    /// Origin allowed to make credentialed CORS requests
    pub cors_origin: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// PayPal REST credentials, when configured
    pub paypal: Option<PayPalConfig>,
    /// VNPay merchant settings, when configured
    pub vnpay: Option<VnpayConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// PayPal REST API credentials.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PayPalConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// API base URL (sandbox or live)
    pub api_url: String,
}

impl std::fmt::Debug for PayPalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// VNPay merchant settings.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct VnpayConfig {
    /// Terminal (merchant) code
    pub tmn_code: String,
    /// HMAC-SHA512 signing key
    pub hash_secret: SecretString,
    /// Hosted payment page URL
    pub payment_url: String,
}

impl std::fmt::Debug for VnpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VnpayConfig")
            .field("tmn_code", &self.tmn_code)
            .field("hash_secret", &"[REDACTED]")
            .field("payment_url", &self.payment_url)
            .finish()
    }
}

impl ApiConfig {
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

        let database_url = get_database_url("SHOPFRONT_DATABASE_URL")?;
        let host = get_env_or_default("SHOPFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPFRONT_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("SHOPFRONT_PORT", "5000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPFRONT_PORT".to_string(), e.to_string()))?;
        let base_url = get_url("SHOPFRONT_BASE_URL", None)?;
        let frontend_url = get_url("SHOPFRONT_FRONTEND_URL", Some("http://localhost:3000"))?;
        let cors_origin = get_optional_env("SHOPFRONT_CORS_ORIGIN")
            .unwrap_or_else(|| frontend_url.clone());
        let session_secret = get_validated_secret("SHOPFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "SHOPFRONT_SESSION_SECRET")?;

        let paypal = PayPalConfig::from_env()?;
        let vnpay = VnpayConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            frontend_url,
            cors_origin,
            session_secret,
            paypal,
            vnpay,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies should carry the `Secure` flag.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Absolute URL on the storefront UI, e.g. `frontend_link("/payment/success")`.
    #[must_use]
    pub fn frontend_link(&self, path: &str) -> String {
        format!("{}{path}", self.frontend_url)
    }
}

impl PayPalConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(client_id) = get_optional_env("PAYPAL_CLIENT_ID") else {
            return Ok(None);
        };
        let client_secret = get_validated_secret("PAYPAL_CLIENT_SECRET")?;
        let api_url = match get_env_or_default("PAYPAL_MODE", "sandbox").as_str() {
            "sandbox" => PAYPAL_SANDBOX_URL,
            "live" => PAYPAL_LIVE_URL,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "PAYPAL_MODE".to_string(),
                    format!("expected 'sandbox' or 'live', got '{other}'"),
                ));
            }
        };

        Ok(Some(Self {
            client_id,
            client_secret,
            api_url: api_url.to_string(),
        }))
    }
}

impl VnpayConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(tmn_code) = get_optional_env("VNPAY_TMN_CODE") else {
            return Ok(None);
        };
        let hash_secret = get_required_secret("VNPAY_HASH_SECRET")?;
        let payment_url = get_url("VNPAY_URL", None)?;

        Ok(Some(Self {
            tmn_code,
            hash_secret,
            payment_url,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
///
/// VNPay issues short uppercase keys that would fail the entropy check, so
/// merchant-issued secrets only go through this presence check.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an absolute http(s) URL, without a trailing slash.
fn get_url(key: &str, default: Option<&str>) -> Result<String, ConfigError> {
    let raw = match (std::env::var(key), default) {
        (Ok(value), _) => value,
        (Err(_), Some(default)) => default.to_string(),
        (Err(_), None) => return Err(ConfigError::MissingEnvVar(key.to_string())),
    };
    parse_base_url(&raw).map_err(|reason| ConfigError::InvalidEnvVar(key.to_string(), reason))
}

/// Normalize a base URL: must parse and use http or https.
fn parse_base_url(raw: &str) -> Result<String, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> ApiConfig {
        ApiConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            paypal: None,
            vnpay: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_validate_session_secret_valid_length() {
        let secret = SecretString::from("a".repeat(32));
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_ok());
    }

    #[test]
    fn test_parse_base_url() {
        assert_eq!(
            parse_base_url("https://shop.test/").unwrap(),
            "https://shop.test"
        );
        assert_eq!(
            parse_base_url(" http://localhost:3000 ").unwrap(),
            "http://localhost:3000"
        );
        assert!(parse_base_url("ftp://shop.test").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5000);
    }

    #[test]
    fn test_secure_cookies_follow_scheme() {
        let mut config = test_config();
        assert!(!config.secure_cookies());
        config.base_url = "https://api.shop.test".to_string();
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_frontend_link() {
        assert_eq!(
            test_config().frontend_link("/payment/success"),
            "http://localhost:3000/payment/success"
        );
    }

    #[test]
    fn test_gateway_config_debug_redacts_secrets() {
        let paypal = PayPalConfig {
            client_id: "client_id_value".to_string(),
            client_secret: SecretString::from("super_secret_paypal"),
            api_url: PAYPAL_SANDBOX_URL.to_string(),
        };
        let vnpay = VnpayConfig {
            tmn_code: "TMN01".to_string(),
            hash_secret: SecretString::from("super_secret_vnpay"),
            payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
        };

        let debug_output = format!("{paypal:?} {vnpay:?}");

        assert!(debug_output.contains("client_id_value"));
        assert!(debug_output.contains("TMN01"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_paypal"));
        assert!(!debug_output.contains("super_secret_vnpay"));
    }
}
