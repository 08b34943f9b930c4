//! Durable storage for the local cart snapshot.
//!
//! One key holds the whole serialized cart. [`FileStore`] maps that key to a
//! JSON file and replaces it atomically (temporary sibling + rename) so a
//! crash mid-write never leaves a truncated snapshot behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use cartwheel_core::{Cart, CartError, CartLine, CurrencyCode, LineMetadata, ProductKey};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::StoreConfig;

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors from reading or writing the persisted cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// Filesystem operation failed (permissions, disk full, ...).
    #[error("storage I/O failed: {0}")]
    Io(String),

    /// The snapshot could not be serialized.
    #[error("snapshot encoding failed: {0}")]
    Encode(String),

    /// The stored snapshot could not be understood.
    #[error("stored snapshot is corrupt: {0}")]
    Corrupt(String),
}

/// Serialized form of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCart {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub lines: Vec<CartLine>,
}

impl PersistedCart {
    /// Snapshot of `cart` stamped with the current time.
    #[must_use]
    pub fn from_cart(cart: &Cart) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            lines: cart.lines(),
        }
    }

    /// Rebuild a cart, merging duplicate lines and validating currencies.
    ///
    /// # Errors
    ///
    /// Returns the `CartError` of the first invalid line.
    pub fn into_cart(self) -> Result<Cart, CartError> {
        Cart::from_lines(self.lines)
    }

    /// Serialize to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Encode` if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, PersistenceError> {
        serde_json::to_vec_pretty(self).map_err(|e| PersistenceError::Encode(e.to_string()))
    }

    /// Parse stored bytes.
    ///
    /// Accepts the current layout and the legacy client layout in which each
    /// unit in the cart was a separate entry under `state.cart`.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Corrupt` if neither layout matches.
    pub fn decode(bytes: &[u8]) -> Result<Self, PersistenceError> {
        let format: SnapshotFormat =
            serde_json::from_slice(bytes).map_err(|e| PersistenceError::Corrupt(e.to_string()))?;

        match format {
            SnapshotFormat::Current(snapshot) => {
                if snapshot.version > SNAPSHOT_VERSION {
                    return Err(PersistenceError::Corrupt(format!(
                        "snapshot version {} is newer than supported version {SNAPSHOT_VERSION}",
                        snapshot.version
                    )));
                }
                Ok(snapshot)
            }
            SnapshotFormat::Legacy(legacy) => legacy.into_current(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFormat {
    Current(PersistedCart),
    Legacy(LegacySnapshot),
}

/// `{"state": {"cart": [...]}, "version": 0}`
#[derive(Deserialize)]
struct LegacySnapshot {
    state: LegacyState,
}

#[derive(Deserialize)]
struct LegacyState {
    #[serde(default)]
    cart: Vec<LegacyEntry>,
}

#[derive(Deserialize)]
struct LegacyEntry {
    content: LegacyContent,
}

#[derive(Deserialize)]
struct LegacyContent {
    price: Decimal,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    image: Option<String>,
    meta: LegacyMeta,
}

#[derive(Deserialize)]
struct LegacyMeta {
    sku: String,
}

impl LegacySnapshot {
    fn into_current(self) -> Result<PersistedCart, PersistenceError> {
        let lines = self
            .state
            .cart
            .into_iter()
            .map(|entry| {
                let content = entry.content;
                let product_key = ProductKey::parse(&content.meta.sku)
                    .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
                let currency = content
                    .currency
                    .as_deref()
                    .map_or(Ok(CurrencyCode::default()), |code| {
                        code.parse::<CurrencyCode>()
                    })
                    .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;

                Ok(CartLine {
                    product_key,
                    unit_price: content.price,
                    currency,
                    quantity: 1,
                    metadata: LineMetadata {
                        title: content.title,
                        image_url: content.image,
                    },
                })
            })
            .collect::<Result<Vec<_>, PersistenceError>>()?;

        Ok(PersistedCart {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            lines: cartwheel_core::group_by_product(&lines).lines(),
        })
    }
}

/// Key-value durable store holding one serialized cart.
pub trait CartPersistence: Send {
    /// Read the stored snapshot, `None` if nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the data is corrupt.
    fn load(&self) -> Result<Option<PersistedCart>, PersistenceError>;

    /// Replace the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn save(&mut self, snapshot: &PersistedCart) -> Result<(), PersistenceError>;
}

/// Cart snapshot stored as a JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store backed by the file at `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store at `<dir>/<name>.json` from configuration.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.snapshot_path())
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomically(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)
    }
}

impl CartPersistence for FileStore {
    fn load(&self) -> Result<Option<PersistedCart>, PersistenceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::Io(e.to_string())),
        };

        PersistedCart::decode(&bytes).map(Some)
    }

    fn save(&mut self, snapshot: &PersistedCart) -> Result<(), PersistenceError> {
        let bytes = snapshot.encode()?;
        self.write_atomically(&bytes)
            .map_err(|e| PersistenceError::Io(format!("{}: {e}", self.path.display())))
    }
}

/// In-memory store for tests and ephemeral sessions.
///
/// Clones share the same slot, so a test can keep a handle to inspect what
/// the cart store wrote or to make writes fail.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemorySlot>>,
}

#[derive(Debug, Default)]
struct MemorySlot {
    snapshot: Option<PersistedCart>,
    fail_writes: bool,
    writes: usize,
}

impl MemoryStore {
    /// Store pre-populated with a snapshot.
    #[must_use]
    pub fn with_snapshot(snapshot: PersistedCart) -> Self {
        let store = Self::default();
        store.slot().snapshot = Some(snapshot);
        store
    }

    /// Make subsequent writes fail, emulating a full quota.
    pub fn fail_writes(&self, fail: bool) {
        self.slot().fail_writes = fail;
    }

    /// Most recently saved snapshot.
    #[must_use]
    pub fn saved(&self) -> Option<PersistedCart> {
        self.slot().snapshot.clone()
    }

    /// Number of successful writes.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.slot().writes
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, MemorySlot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CartPersistence for MemoryStore {
    fn load(&self) -> Result<Option<PersistedCart>, PersistenceError> {
        Ok(self.slot().snapshot.clone())
    }

    fn save(&mut self, snapshot: &PersistedCart) -> Result<(), PersistenceError> {
        let mut slot = self.slot();
        if slot.fail_writes {
            return Err(PersistenceError::Io("storage quota exceeded".to_string()));
        }
        slot.snapshot = Some(snapshot.clone());
        slot.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use super::*;

    fn sample_cart(n: usize) -> Cart {
        let mut cart = Cart::new();
        for i in 0..n {
            let quantity = u32::try_from(i % 3 + 1).unwrap();
            cart.add(
                ProductKey::parse(&format!("SKU-{i}")).unwrap(),
                Decimal::new(199 + i64::try_from(i).unwrap(), 2),
                CurrencyCode::USD,
                LineMetadata::titled(format!("Item {i}")),
                quantity,
            )
            .unwrap();
        }
        cart
    }

    fn quantities(cart: &Cart) -> BTreeMap<String, u32> {
        cart.iter()
            .map(|line| (line.product_key.to_string(), line.quantity))
            .collect()
    }

    #[test]
    fn test_file_round_trip_preserves_quantities() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileStore::new(temp_dir.path().join("nested/cart.json"));
        let cart = sample_cart(7);

        store.save(&PersistedCart::from_cart(&cart)).unwrap();
        let restored = store.load().unwrap().unwrap().into_cart().unwrap();

        assert_eq!(quantities(&restored), quantities(&cart));
        assert!(!temp_dir.path().join("nested/cart.json.tmp").exists());
    }

    #[test]
    fn test_missing_file_loads_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cart.json");
        fs::write(&path, b"{ not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.load(), Err(PersistenceError::Corrupt(_))));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let mut snapshot = PersistedCart::from_cart(&sample_cart(1));
        snapshot.version = SNAPSHOT_VERSION + 1;
        let bytes = serde_json::to_vec(&snapshot).unwrap();

        assert!(matches!(
            PersistedCart::decode(&bytes),
            Err(PersistenceError::Corrupt(_))
        ));
    }

    #[test]
    fn test_legacy_unit_entries_are_merged() {
        let legacy = br#"{
            "state": {
                "cart": [
                    {"content": {"price": 2.5, "currency": "USD", "title": "Milk", "meta": {"sku": "milk"}}},
                    {"content": {"price": 1.0, "meta": {"sku": "bread"}}},
                    {"content": {"price": 2.5, "currency": "USD", "meta": {"sku": "milk"}}}
                ]
            },
            "version": 0
        }"#;

        let cart = PersistedCart::decode(legacy).unwrap().into_cart().unwrap();
        let milk = ProductKey::parse("milk").unwrap();
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.count_of(&milk), 2);
        assert_eq!(cart.get(&milk).unwrap().metadata.title.as_deref(), Some("Milk"));
        assert_eq!(cart.count_of(&ProductKey::parse("bread").unwrap()), 1);
    }

    #[test]
    fn test_memory_store_failure_injection() {
        let mut store = MemoryStore::default();
        let handle = store.clone();
        let snapshot = PersistedCart::from_cart(&sample_cart(2));

        store.save(&snapshot).unwrap();
        assert_eq!(handle.writes(), 1);

        handle.fail_writes(true);
        assert!(matches!(store.save(&snapshot), Err(PersistenceError::Io(_))));
        assert_eq!(handle.writes(), 1);
        assert_eq!(handle.saved(), Some(snapshot));
    }
}
