//! Cartwheel Storefront library.
//!
//! Everything a storefront front end needs to keep a shopper's cart
//! consistent:
//! - [`store`] - The local cart and its durable snapshot
//! - [`remote`] - The remote cart service client and per-mutation sync
//! - [`session`] - [`CartSession`], which wires the two together
//!
//! Ambient modules: [`config`] (environment), [`error`] (unified errors with
//! Sentry reporting) and [`telemetry`] (tracing and Sentry setup).

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod remote;
pub mod session;
pub mod store;
pub mod telemetry;

pub use config::CartConfig;
pub use error::{AppError, Result};
pub use remote::{PendingMutation, RemoteCartMirror, RemoteCartSync, RemoteSyncError, SyncState};
pub use session::{CartSession, RefreshReport};
pub use store::{FileStore, LocalCartStore, LocalMutation, MemoryStore, PersistenceError};
