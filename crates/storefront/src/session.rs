//! Cart session: the local store and the remote mirror wired together.
//!
//! A session is an explicitly owned value. Callers construct one per shopper
//! and pass it to whatever layer needs the cart.

use cartwheel_core::{
    CartLine, CartTotals, CatalogItem, GroupedCart, PricingConfig, ProductKey, compute_totals,
    group_by_product,
};
use secrecy::SecretString;
use tracing::{info, instrument};

use crate::config::CartConfig;
use crate::error::{Result, add_breadcrumb};
use crate::remote::{Divergence, PendingMutation, RemoteCartMirror, RemoteCartSync, RemoteSyncError};
use crate::store::{FileStore, LocalCartStore, PersistenceError};

/// Outcome of replacing the local cart with the server's view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    /// Differences between the local cart and the server before the refresh.
    pub replaced: Vec<Divergence>,
    /// Number of lines in the local cart afterwards.
    pub line_count: usize,
    /// Set when the refreshed cart could not be written to disk.
    pub persist_error: Option<PersistenceError>,
}

/// One shopper's cart.
pub struct CartSession {
    store: LocalCartStore,
    sync: RemoteCartSync,
    pricing: PricingConfig,
    credential: Option<SecretString>,
}

impl std::fmt::Debug for CartSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSession")
            .field("store", &self.store)
            .field("pricing", &self.pricing)
            .field("signed_in", &self.credential.is_some())
            .finish_non_exhaustive()
    }
}

impl CartSession {
    #[must_use]
    pub const fn new(store: LocalCartStore, sync: RemoteCartSync, pricing: PricingConfig) -> Self {
        Self {
            store,
            sync,
            pricing,
            credential: None,
        }
    }

    /// Session backed by the configured snapshot file and remote service.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RemoteSync` if the HTTP client cannot be built.
    pub fn from_config(config: &CartConfig) -> Result<Self> {
        let store = LocalCartStore::open(FileStore::from_config(&config.store));
        let sync = RemoteCartSync::new(&config.remote)?;
        let mut session = Self::new(store, sync, config.pricing);
        session.credential.clone_from(&config.auth_token);
        Ok(session)
    }

    /// Attach the shopper's bearer credential to future remote calls.
    ///
    /// Any cached server view is dropped.
    pub fn set_credential(&mut self, token: SecretString) {
        self.sync.invalidate_mirror();
        self.credential = Some(token);
    }

    pub fn clear_credential(&mut self) {
        self.sync.invalidate_mirror();
        self.credential = None;
    }

    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.credential.is_some()
    }

    /// Add units of a catalog item locally, then mirror the change.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cart` if the item is rejected; nothing changes and
    /// no remote call is made.
    #[instrument(skip(self, item), fields(product_key = %item.product_key))]
    pub fn add(&mut self, item: &CatalogItem, quantity: u32) -> Result<PendingMutation> {
        let qty = quantity.to_string();
        add_breadcrumb(
            "cart",
            "Added item",
            Some(&[
                ("product_key", item.product_key.as_str()),
                ("quantity", qty.as_str()),
            ]),
        );

        let mutation = self.store.add(item, quantity)?;
        Ok(self.sync.dispatch(mutation, self.credential.clone()))
    }

    /// Remove units of a product locally, then mirror the change.
    ///
    /// The remote delete is sent even when the product is absent locally.
    #[instrument(skip(self, product_key), fields(product_key = %product_key))]
    pub fn remove(&mut self, product_key: &ProductKey, quantity: u32) -> PendingMutation {
        let qty = quantity.to_string();
        add_breadcrumb(
            "cart",
            "Removed item",
            Some(&[
                ("product_key", product_key.as_str()),
                ("quantity", qty.as_str()),
            ]),
        );

        let mutation = self.store.remove(product_key, quantity);
        self.sync.dispatch(mutation, self.credential.clone())
    }

    #[must_use]
    pub fn count_of(&self, product_key: &ProductKey) -> u32 {
        self.store.count_of(product_key)
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<CartLine> {
        self.store.snapshot()
    }

    #[must_use]
    pub fn grouped(&self) -> GroupedCart {
        group_by_product(&self.store.snapshot())
    }

    #[must_use]
    pub fn totals(&self) -> CartTotals {
        compute_totals(&self.store.snapshot(), &self.pricing)
    }

    #[must_use]
    pub const fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    fn token(&self) -> std::result::Result<&SecretString, RemoteSyncError> {
        self.credential
            .as_ref()
            .ok_or(RemoteSyncError::Unauthenticated)
    }

    /// Fetch the server's cart for display. The local cart is untouched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RemoteSync` when signed out or the call fails.
    pub async fn fetch_remote_cart(&self) -> Result<RemoteCartMirror> {
        let token = self.token()?;
        Ok(self.sync.fetch_remote_cart(token).await?)
    }

    /// Server cart from cache, fetching only when it has expired.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RemoteSync` when signed out or a needed fetch fails.
    pub async fn cached_remote_cart(&self) -> Result<RemoteCartMirror> {
        let token = self.token()?;
        Ok(self.sync.cached_remote_cart(token).await?)
    }

    /// Differences against the cached server view, if one is cached for
    /// the current credential.
    pub async fn divergence(&self) -> Option<Vec<Divergence>> {
        let token = self.credential.as_ref()?;
        self.sync
            .cached_mirror(token)
            .await
            .map(|mirror| mirror.divergence(self.store.cart()))
    }

    /// Replace the local cart wholesale with the server's cart.
    ///
    /// Server lines are priced in the configured default currency.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RemoteSync` if the fetch fails and `AppError::Cart`
    /// if the server cart cannot be represented locally. The local cart is
    /// unchanged in both cases.
    #[instrument(skip(self))]
    pub async fn refresh_from_server(&mut self) -> Result<RefreshReport> {
        add_breadcrumb("cart", "Refreshed from server", None);

        let token = self.token()?.clone();
        let mirror = self.sync.fetch_remote_cart(&token).await?;

        let replaced = mirror.divergence(self.store.cart());
        let lines = mirror.to_cart_lines(self.pricing.default_currency, self.store.cart())?;
        let persist_error = self.store.replace_all(lines)?;

        let line_count = self.store.cart().len();
        info!(
            line_count,
            changed = replaced.len(),
            "Local cart replaced from server"
        );

        Ok(RefreshReport {
            replaced,
            line_count,
            persist_error,
        })
    }
}
