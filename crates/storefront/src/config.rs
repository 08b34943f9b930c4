//! Cart client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `CART_REMOTE_BASE_URL` - Remote cart service base URL (default: `http://localhost:8080/api`)
//! - `CART_AUTH_TOKEN` - Bearer credential for the remote cart service
//! - `CART_STORE_DIR` - Directory holding the persisted cart (default: `.cartwheel`)
//! - `CART_STORE_NAME` - Persisted cart key (default: `shopping-cart-storage`)
//! - `CART_DEFAULT_CURRENCY` - Currency shown for an empty cart (default: USD)
//! - `CART_TAX_RATE` - Tax rate as a fraction between 0 and 1 (default: 0)
//! - `CART_CURRENCY_DISPLAY` - `code-prefix`, `symbol-prefix` or `code-suffix` (default: `code-prefix`)
//! - `CART_REQUEST_TIMEOUT_SECS` - Remote request timeout (default: 10)
//! - `CART_MIRROR_TTL_SECS` - How long a fetched remote cart stays cached (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cartwheel_core::{CurrencyCode, CurrencyDisplay, PricingConfig};
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_REMOTE_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_STORE_DIR: &str = ".cartwheel";
/// Key the cart snapshot is persisted under.
pub const DEFAULT_STORE_NAME: &str = "shopping-cart-storage";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart client configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Remote cart service configuration
    pub remote: RemoteCartConfig,
    /// Local persistence configuration
    pub store: StoreConfig,
    /// Totals configuration
    pub pricing: PricingConfig,
    /// Credential supplied by the auth collaborator, if signed in
    pub auth_token: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Remote cart service configuration.
#[derive(Debug, Clone)]
pub struct RemoteCartConfig {
    /// Base URL; `/cart`, `/cart/add` and `/cart/delete` are resolved against it
    pub base_url: Url,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Lifetime of the cached remote cart view
    pub mirror_ttl: Duration,
}

/// Local persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory the snapshot file lives in
    pub dir: PathBuf,
    /// Fixed store name, used as the snapshot file stem
    pub name: String,
}

impl StoreConfig {
    /// Full path of the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.name))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_STORE_DIR),
            name: DEFAULT_STORE_NAME.to_string(),
        }
    }
}

impl RemoteCartConfig {
    /// Configuration pointing at `base_url` with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `base_url` does not parse.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("CART_REMOTE_BASE_URL", base_url)?,
            request_timeout: Duration::from_secs(10),
            mirror_ttl: Duration::from_secs(300),
        })
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let base_url = parse_base_url(
            "CART_REMOTE_BASE_URL",
            &get_or("CART_REMOTE_BASE_URL", DEFAULT_REMOTE_BASE_URL),
        )?;
        let request_timeout = Duration::from_secs(parse_var(
            "CART_REQUEST_TIMEOUT_SECS",
            &get_or("CART_REQUEST_TIMEOUT_SECS", "10"),
        )?);
        let mirror_ttl = Duration::from_secs(parse_var(
            "CART_MIRROR_TTL_SECS",
            &get_or("CART_MIRROR_TTL_SECS", "300"),
        )?);

        let store = StoreConfig {
            dir: PathBuf::from(get_or("CART_STORE_DIR", DEFAULT_STORE_DIR)),
            name: get_or("CART_STORE_NAME", DEFAULT_STORE_NAME),
        };
        if store.name.trim().is_empty() || store.name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidEnvVar(
                "CART_STORE_NAME".to_string(),
                "must be a non-empty file name".to_string(),
            ));
        }

        let default_currency: CurrencyCode = parse_var(
            "CART_DEFAULT_CURRENCY",
            &get_or("CART_DEFAULT_CURRENCY", "USD"),
        )?;
        let tax_rate = parse_tax_rate(&get_or("CART_TAX_RATE", "0"))?;
        let display: CurrencyDisplay = parse_var(
            "CART_CURRENCY_DISPLAY",
            &get_or("CART_CURRENCY_DISPLAY", "code-prefix"),
        )?;

        Ok(Self {
            remote: RemoteCartConfig {
                base_url,
                request_timeout,
                mirror_ttl,
            },
            store,
            pricing: PricingConfig {
                default_currency,
                tax_rate,
                display,
            },
            auth_token: lookup("CART_AUTH_TOKEN")
                .filter(|token| !token.trim().is_empty())
                .map(SecretString::from),
            sentry_dsn: lookup("SENTRY_DSN"),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a variable with `FromStr`, mapping failures to `InvalidEnvVar`.
fn parse_var<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse the remote base URL, ensuring a trailing slash so relative joins
/// keep the path prefix (`/api` + `cart` = `/api/cart`).
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Parse the tax rate; must lie within `[0, 1]`.
fn parse_tax_rate(value: &str) -> Result<Decimal, ConfigError> {
    let rate: Decimal = parse_var("CART_TAX_RATE", value)?;
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(ConfigError::InvalidEnvVar(
            "CART_TAX_RATE".to_string(),
            format!("must be between 0 and 1 (got {rate})"),
        ));
    }
    Ok(rate)
}
