//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type for everything a cart caller can see.
//! Local invariant violations (`Cart`) are rejected synchronously;
//! persistence and remote sync failures are non-fatal and are reported to
//! Sentry before being handed back to the caller.

use cartwheel_core::CartError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::remote::RemoteSyncError;
use crate::store::PersistenceError;

/// Application-level error type for the cart client.
#[derive(Debug, Error)]
pub enum AppError {
    /// A cart mutation was rejected (bad input or currency mismatch).
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Writing or reading the persisted cart failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The remote cart service call failed.
    #[error("Remote sync error: {0}")]
    RemoteSync(#[from] RemoteSyncError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AppError {
    /// Whether the in-memory cart is still valid after this error.
    ///
    /// Persistence and remote failures never roll back local state.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::RemoteSync(_))
    }

    /// Message suitable for showing to a shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Cart(CartError::CurrencyMismatch { expected, .. }) => {
                format!("This cart can only hold items priced in {expected}")
            }
            Self::Cart(err) => err.to_string(),
            Self::Persistence(_) => {
                "Your cart could not be saved on this device; it is kept for this session"
                    .to_string()
            }
            Self::RemoteSync(err) => err.user_message(),
            Self::Config(_) => "Cart is misconfigured".to_string(),
        }
    }

    /// Log the error and capture recoverable failures to Sentry.
    pub fn report(&self) {
        if self.is_recoverable() {
            let event_id = sentry::capture_error(self);
            tracing::warn!(
                error = %self,
                sentry_event_id = %event_id,
                "Cart operation degraded"
            );
        } else {
            tracing::debug!(error = %self, "Cart operation rejected");
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for cart actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// actions leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_key", "SKU-1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use cartwheel_core::CurrencyCode;

    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Cart(CartError::InvalidQuantity);
        assert_eq!(err.to_string(), "Cart error: quantity must be at least 1");

        let err = AppError::RemoteSync(RemoteSyncError::Timeout);
        assert_eq!(err.to_string(), "Remote sync error: request timed out");
    }

    #[test]
    fn test_recoverability() {
        assert!(!AppError::Cart(CartError::InvalidQuantity).is_recoverable());
        assert!(AppError::RemoteSync(RemoteSyncError::Unauthenticated).is_recoverable());
        assert!(
            AppError::Persistence(PersistenceError::Io("disk full".to_string())).is_recoverable()
        );
    }

    #[test]
    fn test_currency_mismatch_message() {
        let err = AppError::Cart(CartError::CurrencyMismatch {
            expected: CurrencyCode::USD,
            found: CurrencyCode::EUR,
        });
        assert_eq!(
            err.user_message(),
            "This cart can only hold items priced in USD"
        );
    }

    #[test]
    fn test_report_without_sentry_client_is_harmless() {
        AppError::RemoteSync(RemoteSyncError::Network("refused".to_string())).report();
        add_breadcrumb("cart", "test", Some(&[("product_key", "SKU-1")]));
    }
}
