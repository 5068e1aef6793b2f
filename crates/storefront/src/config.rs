//! Client configuration, read from the process environment.
//!
//! ## Required
//! - `GATEWAY_URL` - Base URL of the Gateway REST API (http or https)
//! - `GATEWAY_API_KEY` - Project API key sent with every request
//!
//! ## Optional
//! - `GATEWAY_ACCESS_TOKEN` - Signed-in user's access token
//! - `GATEWAY_SESSION_ID` - Anonymous session ID (default: random UUID v4)
//! - `GATEWAY_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `CATALOG_CACHE_TTL_SECS` - Product cache time-to-live (default: 300)
//! - `CATALOG_CACHE_CAPACITY` - Maximum cached catalog entries (default: 1000)
//! - `LOG_FORMAT` - `pretty` or `json` (default: pretty)

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

/// Fragments that mark a value copied from a sample `.env` instead of issued.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "dummy",
    "xxx",
    "todo",
    "insert",
    "<",
];

/// Issued keys are random; fewer bits per character than this means typed by hand.
const MIN_KEY_ENTROPY: f64 = 3.3;

/// Why configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingEnvVar(String),
    #[error("{0} is invalid: {1}")]
    InvalidEnvVar(String, String),
    #[error("{0} is not a usable secret: {1}")]
    InsecureSecret(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Gateway connection settings
    pub gateway: GatewayConfig,
    /// Catalog cache settings
    pub catalog: CatalogConfig,
    /// Log output format
    pub log_format: LogFormat,
}

/// Gateway connection configuration. `Debug` never prints credentials.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL, always ending in `/` so relative paths join beneath it
    pub base_url: Url,
    /// Project API key
    pub api_key: SecretString,
    /// Signed-in user's access token
    pub access_token: Option<SecretString>,
    /// Anonymous session the Gateway keys carts and wishlists on
    pub session_id: String,
    /// Upper bound on a single Gateway call
    pub request_timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("session_id", &self.session_id)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Catalog cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogConfig {
    /// How long a cached product stays fresh
    pub ttl: Duration,
    /// Maximum number of cached entries
    pub capacity: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            capacity: 1000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-field lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

impl StorefrontConfig {
    /// Read the configuration, after merging a `.env` file if one exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a missing required variable, an unparsable
    /// value, or an API key that looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is the normal case in deployed builds
        let _ = dotenvy::dotenv();

        let gateway = GatewayConfig::from_env()?;
        let catalog = CatalogConfig::from_env()?;
        let log_format = get_optional_env("LOG_FORMAT")
            .map(|v| {
                v.parse::<LogFormat>()
                    .map_err(|e| ConfigError::InvalidEnvVar("LOG_FORMAT".to_string(), e))
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            gateway,
            catalog,
            log_format,
        })
    }
}

impl GatewayConfig {
    /// Build a configuration from explicit values.
    ///
    /// Used by composition roots that do not read the environment (tests,
    /// embedded storefronts). A fresh anonymous session ID is generated.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `base_url` is not an http(s) URL.
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("GATEWAY_URL", base_url)?,
            api_key,
            access_token: None,
            session_id: uuid::Uuid::new_v4().to_string(),
            request_timeout: Duration::from_secs(10),
        })
    }

    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url("GATEWAY_URL", &get_required_env("GATEWAY_URL")?)?;
        let api_key = read_api_key("GATEWAY_API_KEY")?;
        let access_token = get_optional_env("GATEWAY_ACCESS_TOKEN").map(SecretString::from);
        let session_id = get_optional_env("GATEWAY_SESSION_ID")
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let request_timeout = Duration::from_secs(get_positive_u64("GATEWAY_TIMEOUT_SECS", 10)?);

        Ok(Self {
            base_url,
            api_key,
            access_token,
            session_id,
            request_timeout,
        })
    }
}

impl CatalogConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            ttl: Duration::from_secs(get_positive_u64("CATALOG_CACHE_TTL_SECS", 300)?),
            capacity: get_positive_u64("CATALOG_CACHE_CAPACITY", 1000)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    get_optional_env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get a positive integer environment variable with a default value.
fn get_positive_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than 0".to_string(),
        )),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}

/// Parse a base URL, requiring http(s) and normalizing to a trailing slash.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// Shannon entropy of `value`, in bits per character.
fn bits_per_char(value: &str) -> f64 {
    let counts = value.chars().fold(BTreeMap::<char, u32>::new(), |mut counts, c| {
        *counts.entry(c).or_default() += 1;
        counts
    });
    let total = f64::from(counts.values().sum::<u32>());

    counts
        .values()
        .map(|&n| {
            let p = f64::from(n) / total;
            -p * p.log2()
        })
        .sum()
}

/// Refuse API keys that were obviously never issued by the Gateway.
fn check_api_key(key: &str, value: &str) -> Result<(), ConfigError> {
    let insecure = |reason: String| ConfigError::InsecureSecret(key.to_string(), reason);

    let lowered = value.to_lowercase();
    if let Some(marker) = PLACEHOLDER_MARKERS.iter().find(|m| lowered.contains(**m)) {
        return Err(insecure(format!("looks like a placeholder (contains '{marker}')")));
    }

    let entropy = bits_per_char(value);
    if entropy < MIN_KEY_ENTROPY {
        return Err(insecure(format!(
            "too predictable ({entropy:.2} bits/char, want at least {MIN_KEY_ENTROPY})"
        )));
    }
    Ok(())
}

fn read_api_key(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    check_api_key(key, &value)?;
    Ok(value.into())
}

/// Expose a secret for a request header.
pub(crate) fn expose(secret: &SecretString) -> &str {
    secret.expose_secret()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_per_char() {
        assert!(bits_per_char("").abs() < f64::EPSILON);
        assert!(bits_per_char("zzzz").abs() < f64::EPSILON);
        assert!((bits_per_char("abab") - 1.0).abs() < 1e-9);
        assert!((bits_per_char("abcd") - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_api_key_placeholders_refused() {
        for value in ["your-api-key-here", "CHANGEME-9f8e7d6c5b4a", "<anon key>"] {
            let result = check_api_key("GATEWAY_API_KEY", value);
            assert!(
                matches!(result, Err(ConfigError::InsecureSecret(_, _))),
                "accepted {value}"
            );
        }
    }

    #[test]
    fn test_api_key_low_entropy_refused() {
        let result = check_api_key("GATEWAY_API_KEY", "1111122222111112222211111");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_issued_api_key_accepted() {
        let key = "eyJhbGciOiJIUzI1NiJ9.c2Vzc2lvbi0xMjM0NQ.Q7vN2kL9xR4mT8wZ";
        assert!(check_api_key("GATEWAY_API_KEY", key).is_ok());
    }

    #[test]
    fn test_parse_base_url_appends_slash() {
        let url = parse_base_url("GATEWAY_URL", "https://api.bazaar.test/rest/v1").unwrap();
        assert_eq!(url.as_str(), "https://api.bazaar.test/rest/v1/");
        assert_eq!(url.join("cart").unwrap().path(), "/rest/v1/cart");
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        let result = parse_base_url("GATEWAY_URL", "ftp://files.bazaar.test");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));

        let result = parse_base_url("GATEWAY_URL", "not a url");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_gateway_config_new_generates_session() {
        let a = GatewayConfig::new("http://127.0.0.1:9000", SecretString::from("k")).unwrap();
        let b = GatewayConfig::new("http://127.0.0.1:9000", SecretString::from("k")).unwrap();
        assert_ne!(a.session_id, b.session_id);
        assert!(uuid::Uuid::parse_str(&a.session_id).is_ok());
        assert_eq!(a.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_gateway_config_debug_redacts_secrets() {
        let mut config =
            GatewayConfig::new("https://api.bazaar.test", SecretString::from("super_secret_key"))
                .unwrap();
        config.access_token = Some(SecretString::from("super_secret_token"));

        let printed = format!("{config:?}");

        assert!(printed.contains("api.bazaar.test"));
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("super_secret_key"));
        assert!(!printed.contains("super_secret_token"));
    }
}
