//! Cartwheel Core - cart domain library.
//!
//! This crate provides the cart consistency engine shared by every Cartwheel
//! component:
//! - `storefront` - Local cart store, persistence and remote cart mirroring
//! - `cli` - Command-line cart client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! persistence, no HTTP clients. Everything here is synchronous and
//! deterministic, so it can be tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for product keys, currencies and prices
//! - [`cart`] - Cart lines and the keyed, order-preserving [`Cart`]
//! - [`aggregate`] - SKU grouping over raw line lists
//! - [`totals`] - Subtotal, tax and total calculation with formatting

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod aggregate;
pub mod cart;
pub mod totals;
pub mod types;

pub use aggregate::{GroupedCart, ProductGroup, group_by_product};
pub use cart::{Cart, CartError, CartLine, CatalogItem, LineMetadata, MAX_CART_SUBTOTAL};
pub use totals::{CartTotals, FormattedTotals, PricingConfig, compute_totals};
pub use types::*;
