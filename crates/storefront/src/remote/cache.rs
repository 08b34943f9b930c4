//! Cache for the last-known server cart.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};

use super::RemoteCartMirror;

/// Cache key for remote cart views.
///
/// Each credential gets its own entry so one shopper's cart is never served
/// to another.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Cart { credential: u64 },
}

impl CacheKey {
    pub fn cart(token: &SecretString) -> Self {
        let mut hasher = DefaultHasher::new();
        token.expose_secret().hash(&mut hasher);
        Self::Cart {
            credential: hasher.finish(),
        }
    }
}

/// TTL-bounded holder of the server cart mirror.
#[derive(Clone)]
pub struct MirrorCache {
    inner: Cache<CacheKey, RemoteCartMirror>,
}

impl MirrorCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(16).time_to_live(ttl).build(),
        }
    }

    pub async fn get(&self, token: &SecretString) -> Option<RemoteCartMirror> {
        self.inner.get(&CacheKey::cart(token)).await
    }

    pub async fn store(&self, token: &SecretString, mirror: RemoteCartMirror) {
        self.inner.insert(CacheKey::cart(token), mirror).await;
    }

    pub async fn invalidate(&self, token: &SecretString) {
        self.inner.invalidate(&CacheKey::cart(token)).await;
    }

    /// Drop every cached view.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}
