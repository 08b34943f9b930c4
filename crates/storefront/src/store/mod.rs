//! Local cart store.
//!
//! Owns the in-memory [`Cart`] and its persisted snapshot. Every mutating
//! call writes the full cart through a [`CartPersistence`] collaborator so the
//! cart survives a restart. A failed write is reported on the returned
//! [`LocalMutation`] but never rolls back the in-memory change: for the
//! current session the in-memory cart is the source of truth.

mod persistence;

pub use persistence::{
    CartPersistence, FileStore, MemoryStore, PersistedCart, PersistenceError, SNAPSHOT_VERSION,
};

use cartwheel_core::{Cart, CartError, CartLine, CatalogItem, ProductKey};
use tracing::{debug, instrument, warn};

/// Direction of a local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Add,
    Remove,
}

/// Record of a mutation applied to the local cart.
///
/// The remote synchronizer reads this to build its outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMutation {
    pub kind: MutationKind,
    pub product_key: ProductKey,
    /// Requested quantity change (always non-negative; direction is `kind`).
    pub delta: u32,
    /// Product quantity after the mutation, 0 if the line is gone.
    pub quantity_after: u32,
    /// Whether the cart actually changed.
    pub changed: bool,
    /// Set when the snapshot write failed; the in-memory change stands.
    pub persist_error: Option<PersistenceError>,
}

impl LocalMutation {
    /// Whether the snapshot write (if any) succeeded.
    #[must_use]
    pub const fn persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

/// In-memory cart plus its durable snapshot.
pub struct LocalCartStore {
    cart: Cart,
    persistence: Box<dyn CartPersistence>,
}

impl std::fmt::Debug for LocalCartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCartStore")
            .field("cart", &self.cart)
            .finish_non_exhaustive()
    }
}

impl LocalCartStore {
    /// Open the store, reading the persisted snapshot.
    ///
    /// An unreadable or invalid snapshot is logged and the store starts empty;
    /// a damaged snapshot must not keep the shopper from using the cart.
    #[must_use]
    pub fn open(persistence: impl CartPersistence + 'static) -> Self {
        let cart = match persistence.load() {
            Ok(Some(snapshot)) => match snapshot.into_cart() {
                Ok(cart) => {
                    debug!(lines = cart.len(), "Restored persisted cart");
                    cart
                }
                Err(e) => {
                    warn!(error = %e, "Persisted cart is invalid, starting empty");
                    Cart::new()
                }
            },
            Ok(None) => Cart::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted cart, starting empty");
                Cart::new()
            }
        };

        Self {
            cart,
            persistence: Box::new(persistence),
        }
    }

    /// Store backed by a fresh [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::open(MemoryStore::default())
    }

    /// Add `quantity` units of a catalog item.
    ///
    /// # Errors
    ///
    /// Returns `CartError` (currency mismatch, zero quantity, negative
    /// price, overflow) without touching the cart or the snapshot.
    #[instrument(skip(self, item), fields(product_key = %item.product_key))]
    pub fn add(&mut self, item: &CatalogItem, quantity: u32) -> Result<LocalMutation, CartError> {
        let quantity_after = self.cart.add_line(item.to_line(quantity)?)?;
        let persist_error = self.persist();

        Ok(LocalMutation {
            kind: MutationKind::Add,
            product_key: item.product_key.clone(),
            delta: quantity,
            quantity_after,
            changed: true,
            persist_error,
        })
    }

    /// Remove `quantity` units of a product.
    ///
    /// Removing an absent product changes nothing and skips the write.
    #[instrument(skip(self, product_key), fields(product_key = %product_key))]
    pub fn remove(&mut self, product_key: &ProductKey, quantity: u32) -> LocalMutation {
        let before = self.cart.count_of(product_key);
        let quantity_after = self.cart.remove(product_key, quantity);
        let changed = before != quantity_after;
        let persist_error = if changed { self.persist() } else { None };

        LocalMutation {
            kind: MutationKind::Remove,
            product_key: product_key.clone(),
            delta: quantity,
            quantity_after,
            changed,
            persist_error,
        }
    }

    /// Replace the whole cart, e.g. with the server's view.
    ///
    /// Returns the persistence error, if the write failed.
    ///
    /// # Errors
    ///
    /// Fails without changing anything if `lines` are invalid or mix
    /// currencies.
    pub fn replace_all(
        &mut self,
        lines: Vec<CartLine>,
    ) -> Result<Option<PersistenceError>, CartError> {
        self.cart = Cart::from_lines(lines)?;
        Ok(self.persist())
    }

    /// Current quantity of a product, 0 if absent.
    #[must_use]
    pub fn count_of(&self, product_key: &ProductKey) -> u32 {
        self.cart.count_of(product_key)
    }

    /// Copy of all lines in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CartLine> {
        self.cart.lines()
    }

    /// Read-only view of the cart.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    fn persist(&mut self) -> Option<PersistenceError> {
        let snapshot = PersistedCart::from_cart(&self.cart);
        match self.persistence.save(&snapshot) {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "Failed to persist cart; keeping in-memory state");
                Some(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwheel_core::{CurrencyCode, LineMetadata};
    use rust_decimal::Decimal;

    use super::*;

    fn item(k: &str, cents: i64, currency: CurrencyCode) -> CatalogItem {
        CatalogItem::new(ProductKey::parse(k).unwrap(), Decimal::new(cents, 2), currency)
            .with_metadata(LineMetadata::titled(k))
    }

    fn key(k: &str) -> ProductKey {
        ProductKey::parse(k).unwrap()
    }

    #[test]
    fn test_every_mutation_persists() {
        let backing = MemoryStore::default();
        let mut store = LocalCartStore::open(backing.clone());

        store.add(&item("apple", 250, CurrencyCode::USD), 1).unwrap();
        store.add(&item("apple", 250, CurrencyCode::USD), 1).unwrap();
        store.remove(&key("apple"), 1);

        assert_eq!(backing.writes(), 3);
        let saved = backing.saved().unwrap().into_cart().unwrap();
        assert_eq!(saved.count_of(&key("apple")), 1);
    }

    #[test]
    fn test_absent_remove_is_noop_without_write() {
        let backing = MemoryStore::default();
        let mut store = LocalCartStore::open(backing.clone());
        store.add(&item("apple", 250, CurrencyCode::USD), 1).unwrap();
        let before = store.snapshot();

        let mutation = store.remove(&key("pear"), 1);
        assert!(!mutation.changed);
        assert_eq!(mutation.quantity_after, 0);
        assert_eq!(store.snapshot(), before);
        assert_eq!(backing.writes(), 1);
    }

    #[test]
    fn test_persistence_failure_keeps_mutation() {
        let backing = MemoryStore::default();
        let mut store = LocalCartStore::open(backing.clone());
        backing.fail_writes(true);

        let mutation = store.add(&item("apple", 250, CurrencyCode::USD), 2).unwrap();
        assert!(!mutation.persisted());
        assert!(matches!(
            mutation.persist_error,
            Some(PersistenceError::Io(_))
        ));
        assert_eq!(store.count_of(&key("apple")), 2);
    }

    #[test]
    fn test_currency_mismatch_is_rejected_before_write() {
        let backing = MemoryStore::default();
        let mut store = LocalCartStore::open(backing.clone());
        store.add(&item("apple", 250, CurrencyCode::USD), 1).unwrap();

        let err = store
            .add(&item("apple", 250, CurrencyCode::INR), 1)
            .unwrap_err();
        assert!(matches!(err, CartError::CurrencyMismatch { .. }));
        assert_eq!(store.count_of(&key("apple")), 1);
        assert_eq!(backing.writes(), 1);
    }

    #[test]
    fn test_reopen_restores_cart() {
        let backing = MemoryStore::default();
        {
            let mut store = LocalCartStore::open(backing.clone());
            store.add(&item("apple", 250, CurrencyCode::USD), 3).unwrap();
            store.add(&item("bread", 100, CurrencyCode::USD), 1).unwrap();
        }

        let reopened = LocalCartStore::open(backing);
        assert_eq!(reopened.count_of(&key("apple")), 3);
        assert_eq!(reopened.count_of(&key("bread")), 1);
    }

    #[test]
    fn test_invalid_snapshot_starts_empty() {
        let mut snapshot = PersistedCart::from_cart(&Cart::new());
        snapshot.lines = vec![
            item("a", 100, CurrencyCode::USD).to_line(1).unwrap(),
            item("b", 100, CurrencyCode::EUR).to_line(1).unwrap(),
        ];

        let store = LocalCartStore::open(MemoryStore::with_snapshot(snapshot));
        assert!(store.cart().is_empty());
    }

    #[test]
    fn test_replace_all() {
        let mut store = LocalCartStore::in_memory();
        store.add(&item("apple", 250, CurrencyCode::USD), 1).unwrap();

        let replacement = vec![item("melon", 400, CurrencyCode::USD).to_line(2).unwrap()];
        let persist_error = store.replace_all(replacement).unwrap();

        assert!(persist_error.is_none());
        assert_eq!(store.count_of(&key("apple")), 0);
        assert_eq!(store.count_of(&key("melon")), 2);
    }
}
