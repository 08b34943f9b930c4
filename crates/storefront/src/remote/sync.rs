//! Per-mutation remote sync.

use secrecy::SecretString;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use super::cache::MirrorCache;
use super::client::RemoteCartClient;
use super::types::RemoteCartPayload;
use super::{RemoteCartMirror, RemoteSyncError};
use crate::config::RemoteCartConfig;
use crate::error::AppError;
use crate::store::{LocalMutation, MutationKind};

/// Remote state of one local mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Pending,
    Confirmed,
    Failed(RemoteSyncError),
}

impl SyncState {
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Handle to a mutation's outbound call.
///
/// Dropping the handle discards the result; the call itself still runs.
#[derive(Debug)]
pub struct PendingMutation {
    id: Uuid,
    mutation: LocalMutation,
    state: watch::Receiver<SyncState>,
}

impl PendingMutation {
    fn settled_with(mutation: LocalMutation, state: SyncState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self {
            id: Uuid::new_v4(),
            mutation,
            state: rx,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The local change this call mirrors.
    #[must_use]
    pub const fn mutation(&self) -> &LocalMutation {
        &self.mutation
    }

    /// Current state without waiting.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Wait until the call is confirmed or has failed.
    pub async fn settled(&self) -> SyncState {
        let mut rx = self.state.clone();
        rx.wait_for(SyncState::is_settled)
            .await
            .map_or(SyncState::Failed(RemoteSyncError::Abandoned), |state| {
                state.clone()
            })
    }
}

/// Mirrors local mutations to the remote cart service.
///
/// Holds the HTTP client and the cached server view. Cheap to clone.
#[derive(Clone)]
pub struct RemoteCartSync {
    client: RemoteCartClient,
    cache: MirrorCache,
}

impl RemoteCartSync {
    /// # Errors
    ///
    /// Returns `RemoteSyncError::Network` if the HTTP client cannot be built.
    pub fn new(config: &RemoteCartConfig) -> Result<Self, RemoteSyncError> {
        Ok(Self {
            client: RemoteCartClient::new(config)?,
            cache: MirrorCache::new(config.mirror_ttl),
        })
    }

    /// Start the remote call for `mutation` and return immediately.
    ///
    /// Settles at once, without a network call, when there is nothing to
    /// send, when `token` is missing, or when no tokio runtime is running.
    #[must_use]
    pub fn dispatch(&self, mutation: LocalMutation, token: Option<SecretString>) -> PendingMutation {
        if mutation.delta == 0 {
            return PendingMutation::settled_with(mutation, SyncState::Confirmed);
        }

        let Some(token) = token else {
            debug!(product_key = %mutation.product_key, "Not signed in, skipping remote sync");
            return PendingMutation::settled_with(
                mutation,
                SyncState::Failed(RemoteSyncError::Unauthenticated),
            );
        };

        let Ok(handle) = Handle::try_current() else {
            tracing::warn!("No async runtime available for remote cart sync");
            return PendingMutation::settled_with(
                mutation,
                SyncState::Failed(RemoteSyncError::Abandoned),
            );
        };

        let (tx, rx) = watch::channel(SyncState::Pending);
        let pending = PendingMutation {
            id: Uuid::new_v4(),
            mutation: mutation.clone(),
            state: rx,
        };

        let span = info_span!(
            "cart_sync",
            mutation_id = %pending.id,
            kind = ?mutation.kind,
            product_key = %mutation.product_key,
            delta = mutation.delta,
        );
        let this = self.clone();
        handle.spawn(
            async move {
                let state = match this.send(&mutation, &token).await {
                    Ok(echoed) => {
                        this.settle_mirror(&token, echoed).await;
                        debug!("Remote cart confirmed mutation");
                        SyncState::Confirmed
                    }
                    Err(e) => {
                        this.cache.invalidate(&token).await;
                        AppError::from(e.clone()).report();
                        SyncState::Failed(e)
                    }
                };
                // The receiver may be gone; the result is then discarded.
                let _ = tx.send(state);
            }
            .instrument(span),
        );

        pending
    }

    async fn send(
        &self,
        mutation: &LocalMutation,
        token: &SecretString,
    ) -> Result<Option<RemoteCartPayload>, RemoteSyncError> {
        match mutation.kind {
            MutationKind::Add => {
                self.client
                    .add_item(token, &mutation.product_key, mutation.delta)
                    .await
            }
            MutationKind::Remove => {
                self.client
                    .delete_item(token, &mutation.product_key, mutation.delta)
                    .await
            }
        }
    }

    async fn settle_mirror(&self, token: &SecretString, echoed: Option<RemoteCartPayload>) {
        match echoed {
            Some(payload) => {
                self.cache
                    .store(token, RemoteCartMirror::from_payload(&payload))
                    .await;
            }
            None => self.cache.invalidate(token).await,
        }
    }

    /// Fetch the server cart and refresh the cached mirror.
    ///
    /// # Errors
    ///
    /// Returns `RemoteSyncError` if the call fails.
    pub async fn fetch_remote_cart(
        &self,
        token: &SecretString,
    ) -> Result<RemoteCartMirror, RemoteSyncError> {
        let payload = self.client.fetch_cart(token).await?;
        let mirror = RemoteCartMirror::from_payload(&payload);
        self.cache.store(token, mirror.clone()).await;
        Ok(mirror)
    }

    /// Cached server cart, fetching it if the cache is empty or stale.
    ///
    /// # Errors
    ///
    /// Returns `RemoteSyncError` if a fetch was needed and failed.
    pub async fn cached_remote_cart(
        &self,
        token: &SecretString,
    ) -> Result<RemoteCartMirror, RemoteSyncError> {
        if let Some(mirror) = self.cache.get(token).await {
            debug!("Cache hit for remote cart");
            return Ok(mirror);
        }
        self.fetch_remote_cart(token).await
    }

    /// Cached server cart for `token`, if any, without a network call.
    pub async fn cached_mirror(&self, token: &SecretString) -> Option<RemoteCartMirror> {
        self.cache.get(token).await
    }

    /// Forget every cached server view, e.g. when the shopper changes.
    pub fn invalidate_mirror(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use cartwheel_core::ProductKey;

    use super::*;

    fn sync() -> RemoteCartSync {
        // Port 9 (discard) is never served locally.
        let mut config = RemoteCartConfig::new("http://127.0.0.1:9/api").unwrap();
        config.request_timeout = Duration::from_secs(2);
        RemoteCartSync::new(&config).unwrap()
    }

    fn mutation(kind: MutationKind, delta: u32) -> LocalMutation {
        LocalMutation {
            kind,
            product_key: ProductKey::from(42),
            delta,
            quantity_after: delta,
            changed: true,
            persist_error: None,
        }
    }

    #[tokio::test]
    async fn test_missing_credential_fails_without_call() {
        let pending = sync().dispatch(mutation(MutationKind::Add, 1), None);
        assert_eq!(
            pending.state(),
            SyncState::Failed(RemoteSyncError::Unauthenticated)
        );
        assert_eq!(pending.mutation().delta, 1);
    }

    #[tokio::test]
    async fn test_zero_delta_confirms_immediately() {
        let pending = sync().dispatch(
            mutation(MutationKind::Remove, 0),
            Some(SecretString::from("token".to_string())),
        );
        assert_eq!(pending.settled().await, SyncState::Confirmed);
    }

    #[tokio::test]
    async fn test_unreachable_service_fails() {
        let pending = sync().dispatch(
            mutation(MutationKind::Add, 2),
            Some(SecretString::from("token".to_string())),
        );

        let state = pending.settled().await;
        assert!(
            matches!(
                state,
                SyncState::Failed(RemoteSyncError::Network(_) | RemoteSyncError::Timeout)
            ),
            "unexpected state: {state:?}"
        );
    }

    #[test]
    fn test_dispatch_without_runtime_is_abandoned() {
        let pending = sync().dispatch(
            mutation(MutationKind::Add, 1),
            Some(SecretString::from("token".to_string())),
        );
        assert_eq!(
            pending.state(),
            SyncState::Failed(RemoteSyncError::Abandoned)
        );
    }
}
