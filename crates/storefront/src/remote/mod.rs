//! Remote cart service client and synchronizer.
//!
//! # Architecture
//!
//! - The local cart is authoritative for immediate feedback; every local
//!   mutation is mirrored to the server as an independent request carrying
//!   the product key and the quantity delta
//! - A failed mirror call never rolls back the local cart; the failure is
//!   handed back to the caller through [`PendingMutation`]
//! - The server's view is cached as a [`RemoteCartMirror`] via `moka`
//!   (TTL from configuration)
//! - Only an explicit refresh lets server state overwrite the local cart
//!
//! # Endpoints
//!
//! - `GET cart` - `{"items": [{"product_id", "quantity", "product": {"name", "price"}}]}`
//! - `POST cart/add` - `{"product_id", "quantity"}`
//! - `DELETE cart/delete` - `{"product_id", "quantity"}`; unknown items are
//!   treated as already deleted
//!
//! # Example
//!
//! ```rust,ignore
//! use cartwheel_storefront::remote::RemoteCartSync;
//!
//! let sync = RemoteCartSync::new(&config.remote)?;
//! let mutation = store.add(&item, 1)?;
//! let pending = sync.dispatch(mutation, Some(token.clone()));
//!
//! // The local cart is already updated; await only if the UI cares.
//! match pending.settled().await {
//!     SyncState::Confirmed => {}
//!     SyncState::Failed(e) => show_banner(e.user_message()),
//!     SyncState::Pending => unreachable!(),
//! }
//! ```

mod cache;
mod client;
mod mirror;
mod sync;
pub mod types;

pub use client::RemoteCartClient;
pub use mirror::{Divergence, RemoteCartMirror, RemoteMirrorLine};
pub use sync::{PendingMutation, RemoteCartSync, SyncState};

use thiserror::Error;

/// Errors from calls to the remote cart service.
///
/// All of these are recoverable from the local cart's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteSyncError {
    /// Connection failed or was interrupted.
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// No credential was available to attach to the call.
    #[error("not signed in")]
    Unauthenticated,

    /// The server rejected the credential.
    #[error("credential rejected (HTTP {status})")]
    AuthRejected { status: u16 },

    /// The server rejected the request itself (4xx other than auth).
    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The server failed (5xx).
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// The response body could not be understood.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The sync task ended without reporting a result.
    #[error("sync task ended before settling")]
    Abandoned,
}

impl RemoteSyncError {
    /// Whether repeating the same call may succeed without caller changes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout | Self::Server { .. } | Self::Abandoned
        )
    }

    /// Human-readable message for the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) | Self::Timeout => {
                "Could not reach the cart service. Your cart is saved on this device; try again."
                    .to_string()
            }
            Self::Unauthenticated => "Sign in to sync your cart".to_string(),
            Self::AuthRejected { .. } => {
                "Your session has expired. Sign in again to sync your cart".to_string()
            }
            Self::Rejected { message, .. } if !message.is_empty() => message.clone(),
            Self::Rejected { .. } => "The cart service rejected the change".to_string(),
            Self::Server { .. } => {
                "The cart service is having trouble; try again shortly".to_string()
            }
            Self::Decode(_) => "Unexpected response from the cart service".to_string(),
            Self::Abandoned => "Cart sync was interrupted".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = RemoteSyncError::Server {
            status: 503,
            message: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "server error (HTTP 503): maintenance");

        let err = RemoteSyncError::AuthRejected { status: 401 };
        assert_eq!(err.to_string(), "credential rejected (HTTP 401)");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RemoteSyncError::Timeout.is_retryable());
        assert!(RemoteSyncError::Network("reset".to_string()).is_retryable());
        assert!(!RemoteSyncError::Unauthenticated.is_retryable());
        assert!(
            !RemoteSyncError::Rejected {
                status: 400,
                message: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_rejected_message_prefers_server_text() {
        let err = RemoteSyncError::Rejected {
            status: 400,
            message: "quantity must be at least 1".to_string(),
        };
        assert_eq!(err.user_message(), "quantity must be at least 1");

        let err = RemoteSyncError::Rejected {
            status: 400,
            message: String::new(),
        };
        assert_eq!(err.user_message(), "The cart service rejected the change");
    }
}
