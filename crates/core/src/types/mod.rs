//! Core types for Cartwheel.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod money;
pub mod product_key;

pub use money::{CurrencyCode, CurrencyDisplay, MoneyParseError, Price};
pub use product_key::{ProductKey, ProductKeyError};
