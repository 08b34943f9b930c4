//! Cart lines and the keyed cart collection.
//!
//! A [`Cart`] holds at most one [`CartLine`] per [`ProductKey`]. Adding a
//! product that is already present increments its quantity; removing past
//! zero deletes the line. Lines keep their first-insertion order for display,
//! which has no bearing on totals.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CurrencyCode, Price, ProductKey};

/// Largest cart subtotal accepted, leaving headroom for tax and total.
pub const MAX_CART_SUBTOTAL: Decimal =
    Decimal::from_parts(0xA764_0000, 0x0DE0_B6B3, 0, false, 0);

/// Errors raised when a cart mutation or construction is rejected.
///
/// A rejected operation never modifies the cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The line's currency differs from the currency already in the cart.
    #[error("currency mismatch: cart holds {expected}, line is priced in {found}")]
    CurrencyMismatch {
        /// Currency established by the existing lines.
        expected: CurrencyCode,
        /// Currency of the rejected line.
        found: CurrencyCode,
    },

    /// Quantity must be at least 1.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// Unit price must not be negative.
    #[error("negative unit price {price} for {product_key}")]
    NegativePrice {
        /// Product the price was supplied for.
        product_key: ProductKey,
        /// The rejected price.
        price: Decimal,
    },

    /// Adding would overflow the line's quantity counter.
    #[error("quantity overflow for {0}")]
    QuantityOverflow(ProductKey),

    /// The line or cart total would exceed [`MAX_CART_SUBTOTAL`].
    #[error("cart amount too large after adding {0}")]
    AmountOverflow(ProductKey),
}

/// Opaque display data carried alongside a line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMetadata {
    /// Product title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Product image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl LineMetadata {
    /// Metadata with only a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            image_url: None,
        }
    }
}

/// Product data supplied by the catalog for an add-to-cart action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub product_key: ProductKey,
    pub unit_price: Decimal,
    pub currency: CurrencyCode,
    pub metadata: LineMetadata,
}

impl CatalogItem {
    /// Catalog item with no display metadata.
    #[must_use]
    pub const fn new(product_key: ProductKey, unit_price: Decimal, currency: CurrencyCode) -> Self {
        Self {
            product_key,
            unit_price,
            currency,
            metadata: LineMetadata {
                title: None,
                image_url: None,
            },
        }
    }

    /// Attach display metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: LineMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Line for `quantity` units of this item.
    ///
    /// # Errors
    ///
    /// See [`CartLine::new`].
    pub fn to_line(&self, quantity: u32) -> Result<CartLine, CartError> {
        CartLine::new(
            self.product_key.clone(),
            self.unit_price,
            self.currency,
            quantity,
            self.metadata.clone(),
        )
    }
}

/// One distinguishable product held in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Catalog identifier; unique within a cart.
    pub product_key: ProductKey,
    /// Price of a single unit.
    pub unit_price: Decimal,
    /// Currency the unit price is expressed in.
    pub currency: CurrencyCode,
    /// Number of units, always at least 1 inside a [`Cart`].
    pub quantity: u32,
    /// Display data, not used by any invariant.
    #[serde(default)]
    pub metadata: LineMetadata,
}

impl CartLine {
    /// Create a validated line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for a zero quantity and
    /// [`CartError::NegativePrice`] for a negative unit price.
    pub fn new(
        product_key: ProductKey,
        unit_price: Decimal,
        currency: CurrencyCode,
        quantity: u32,
        metadata: LineMetadata,
    ) -> Result<Self, CartError> {
        let line = Self {
            product_key,
            unit_price,
            currency,
            quantity,
            metadata,
        };
        line.validate()?;
        Ok(line)
    }

    fn validate(&self) -> Result<(), CartError> {
        if self.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if self.unit_price < Decimal::ZERO {
            return Err(CartError::NegativePrice {
                product_key: self.product_key.clone(),
                price: self.unit_price,
            });
        }
        Ok(())
    }

    /// Unit price with its currency.
    #[must_use]
    pub const fn price(&self) -> Price {
        Price::new(self.unit_price, self.currency)
    }

    /// Unrounded `unit_price * quantity`, saturating at `Decimal::MAX`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// Ordered collection of cart lines keyed by product.
///
/// Uniqueness of product keys is structural: lines live in a map, and a
/// separate key list records first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: HashMap<ProductKey, CartLine>,
    order: Vec<ProductKey>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from raw lines, merging duplicates into the first-seen
    /// line.
    ///
    /// # Errors
    ///
    /// Fails if any line is invalid or the lines mix currencies.
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Result<Self, CartError> {
        let mut cart = Self::new();
        for line in lines {
            cart.add_line(line)?;
        }
        Ok(cart)
    }

    /// Currency shared by every line, `None` while the cart is empty.
    #[must_use]
    pub fn currency(&self) -> Option<CurrencyCode> {
        self.order
            .first()
            .and_then(|key| self.lines.get(key))
            .map(|line| line.currency)
    }

    /// Add `quantity` units of a product.
    ///
    /// Returns the product's quantity after the add.
    ///
    /// # Errors
    ///
    /// See [`Cart::add_line`].
    pub fn add(
        &mut self,
        product_key: ProductKey,
        unit_price: Decimal,
        currency: CurrencyCode,
        metadata: LineMetadata,
        quantity: u32,
    ) -> Result<u32, CartError> {
        let line = CartLine::new(product_key, unit_price, currency, quantity, metadata)?;
        self.add_line(line)
    }

    /// Merge a line into the cart.
    ///
    /// An existing line for the same product keeps its price and metadata and
    /// has its quantity incremented. Returns the quantity after the merge.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidQuantity`] / [`CartError::NegativePrice`] for a
    ///   malformed line
    /// - [`CartError::CurrencyMismatch`] when the cart is non-empty and priced
    ///   in another currency
    /// - [`CartError::QuantityOverflow`] when the combined quantity exceeds
    ///   `u32::MAX`
    /// - [`CartError::AmountOverflow`] when the cart subtotal would exceed
    ///   [`MAX_CART_SUBTOTAL`]
    pub fn add_line(&mut self, line: CartLine) -> Result<u32, CartError> {
        line.validate()?;

        if let Some(expected) = self.currency()
            && expected != line.currency
        {
            return Err(CartError::CurrencyMismatch {
                expected,
                found: line.currency,
            });
        }

        let (unit_price, quantity) = match self.lines.get(&line.product_key) {
            Some(existing) => (
                existing.unit_price,
                existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or_else(|| CartError::QuantityOverflow(line.product_key.clone()))?,
            ),
            None => (line.unit_price, line.quantity),
        };
        self.check_subtotal(&line.product_key, unit_price, quantity)?;

        if let Some(existing) = self.lines.get_mut(&line.product_key) {
            existing.quantity = quantity;
            return Ok(quantity);
        }

        self.order.push(line.product_key.clone());
        self.lines.insert(line.product_key.clone(), line);
        Ok(quantity)
    }

    /// Reject a line whose total, added to every other line, would leave the
    /// accepted range.
    fn check_subtotal(
        &self,
        product_key: &ProductKey,
        unit_price: Decimal,
        quantity: u32,
    ) -> Result<(), CartError> {
        let overflow = || CartError::AmountOverflow(product_key.clone());

        let line_total = unit_price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(overflow)?;
        let subtotal = self
            .iter()
            .filter(|other| &other.product_key != product_key)
            .try_fold(line_total, |acc, other| acc.checked_add(other.line_total()))
            .ok_or_else(overflow)?;

        if subtotal > MAX_CART_SUBTOTAL {
            return Err(overflow());
        }
        Ok(())
    }

    /// Remove `quantity` units of a product.
    ///
    /// The line is deleted once its quantity would reach zero. Removing an
    /// absent product is a no-op. Returns the quantity left afterwards.
    pub fn remove(&mut self, product_key: &ProductKey, quantity: u32) -> u32 {
        let Some(line) = self.lines.get_mut(product_key) else {
            return 0;
        };

        if quantity < line.quantity {
            line.quantity -= quantity;
            return line.quantity;
        }

        self.lines.remove(product_key);
        self.order.retain(|key| key != product_key);
        0
    }

    /// Current quantity of a product, 0 if absent.
    #[must_use]
    pub fn count_of(&self, product_key: &ProductKey) -> u32 {
        self.lines.get(product_key).map_or(0, |line| line.quantity)
    }

    /// Look up a line.
    #[must_use]
    pub fn get(&self, product_key: &ProductKey) -> Option<&CartLine> {
        self.lines.get(product_key)
    }

    /// Iterate lines in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &CartLine> {
        self.order.iter().filter_map(|key| self.lines.get(key))
    }

    /// Copy of every line in insertion order.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        self.iter().cloned().collect()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.lines.values().map(|line| u64::from(line.quantity)).sum()
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.order.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn key(s: &str) -> ProductKey {
        ProductKey::parse(s).unwrap()
    }

    fn add_one(cart: &mut Cart, k: &str, cents: i64) -> Result<u32, CartError> {
        cart.add(
            key(k),
            Decimal::new(cents, 2),
            CurrencyCode::USD,
            LineMetadata::default(),
            1,
        )
    }

    #[test]
    fn test_add_same_product_merges() {
        let mut cart = Cart::new();
        add_one(&mut cart, "apple", 250).unwrap();
        add_one(&mut cart, "apple", 250).unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.count_of(&key("apple")), 2);
        let lines = cart.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.first().unwrap().quantity, 2);
    }

    #[test]
    fn test_add_keeps_first_price_and_metadata() {
        let mut cart = Cart::new();
        cart.add(
            key("apple"),
            Decimal::new(250, 2),
            CurrencyCode::USD,
            LineMetadata::titled("Apple"),
            1,
        )
        .unwrap();
        cart.add(
            key("apple"),
            Decimal::new(300, 2),
            CurrencyCode::USD,
            LineMetadata::titled("Green Apple"),
            2,
        )
        .unwrap();

        let line = cart.get(&key("apple")).unwrap();
        assert_eq!(line.unit_price, Decimal::new(250, 2));
        assert_eq!(line.metadata.title.as_deref(), Some("Apple"));
        assert_eq!(line.quantity, 3);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut cart = Cart::new();
        add_one(&mut cart, "apple", 250).unwrap();
        let before = cart.clone();

        assert_eq!(cart.remove(&key("pear"), 1), 0);
        assert_eq!(cart, before);
    }

    #[test]
    fn test_remove_past_zero_deletes_line() {
        let mut cart = Cart::new();
        cart.add(
            key("apple"),
            Decimal::ONE,
            CurrencyCode::USD,
            LineMetadata::default(),
            3,
        )
        .unwrap();

        assert_eq!(cart.remove(&key("apple"), 2), 1);
        assert_eq!(cart.remove(&key("apple"), 5), 0);
        assert!(cart.is_empty());
        assert!(cart.get(&key("apple")).is_none());
        assert_eq!(cart.currency(), None);
    }

    #[test]
    fn test_currency_mismatch_leaves_cart_unchanged() {
        let mut cart = Cart::new();
        add_one(&mut cart, "apple", 250).unwrap();
        let before = cart.clone();

        let err = cart
            .add(
                key("apple"),
                Decimal::ONE,
                CurrencyCode::EUR,
                LineMetadata::default(),
                1,
            )
            .unwrap_err();

        assert_eq!(
            err,
            CartError::CurrencyMismatch {
                expected: CurrencyCode::USD,
                found: CurrencyCode::EUR,
            }
        );
        assert_eq!(cart, before);
    }

    #[test]
    fn test_currency_resets_once_empty() {
        let mut cart = Cart::new();
        add_one(&mut cart, "apple", 250).unwrap();
        cart.remove(&key("apple"), 1);

        let result = cart.add(
            key("croissant"),
            Decimal::ONE,
            CurrencyCode::EUR,
            LineMetadata::default(),
            1,
        );
        assert!(result.is_ok());
        assert_eq!(cart.currency(), Some(CurrencyCode::EUR));
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut cart = Cart::new();
        let zero = cart.add(
            key("apple"),
            Decimal::ONE,
            CurrencyCode::USD,
            LineMetadata::default(),
            0,
        );
        assert_eq!(zero, Err(CartError::InvalidQuantity));

        let negative = cart.add(
            key("apple"),
            Decimal::new(-1, 0),
            CurrencyCode::USD,
            LineMetadata::default(),
            1,
        );
        assert!(matches!(negative, Err(CartError::NegativePrice { .. })));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_free_items_are_allowed() {
        let mut cart = Cart::new();
        assert!(add_one(&mut cart, "sample", 0).is_ok());
    }

    #[test]
    fn test_quantity_overflow() {
        let mut cart = Cart::new();
        cart.add(
            key("apple"),
            Decimal::ONE,
            CurrencyCode::USD,
            LineMetadata::default(),
            u32::MAX,
        )
        .unwrap();

        assert_eq!(
            add_one(&mut cart, "apple", 100),
            Err(CartError::QuantityOverflow(key("apple")))
        );
        assert_eq!(cart.count_of(&key("apple")), u32::MAX);
    }

    #[test]
    fn test_amount_overflow_is_rejected() {
        let mut cart = Cart::new();
        let huge = Decimal::from_i128_with_scale(10_i128.pow(25), 0);

        let err = cart
            .add(key("big"), huge, CurrencyCode::USD, LineMetadata::default(), 10_000)
            .unwrap_err();
        assert_eq!(err, CartError::AmountOverflow(key("big")));
        assert!(cart.is_empty());

        let near_cap = MAX_CART_SUBTOTAL - Decimal::ONE;
        cart.add(key("a"), near_cap, CurrencyCode::USD, LineMetadata::default(), 1)
            .unwrap();
        let before = cart.clone();

        assert_eq!(
            add_one(&mut cart, "b", 200),
            Err(CartError::AmountOverflow(key("b")))
        );
        assert_eq!(
            cart.add(key("a"), near_cap, CurrencyCode::USD, LineMetadata::default(), 1),
            Err(CartError::AmountOverflow(key("a")))
        );
        assert_eq!(cart, before);
        assert!(add_one(&mut cart, "b", 100).is_ok());
    }

    #[test]
    fn test_from_lines_rejects_overflowing_amounts() {
        let line = |k: &str| CartLine {
            product_key: key(k),
            unit_price: MAX_CART_SUBTOTAL,
            currency: CurrencyCode::USD,
            quantity: 1,
            metadata: LineMetadata::default(),
        };

        let result = Cart::from_lines(vec![line("a"), line("b")]);
        assert_eq!(result, Err(CartError::AmountOverflow(key("b"))));
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let mut cart = Cart::new();
        add_one(&mut cart, "c", 100).unwrap();
        add_one(&mut cart, "a", 100).unwrap();
        add_one(&mut cart, "b", 100).unwrap();
        add_one(&mut cart, "a", 100).unwrap();
        cart.remove(&key("c"), 1);

        let keys: Vec<_> = cart.iter().map(|l| l.product_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(cart.total_quantity(), 3);
    }

    #[test]
    fn test_from_lines_merges_and_guards_currency() {
        let line = |k: &str, currency| CartLine {
            product_key: key(k),
            unit_price: Decimal::ONE,
            currency,
            quantity: 1,
            metadata: LineMetadata::default(),
        };

        let cart = Cart::from_lines(vec![
            line("a", CurrencyCode::USD),
            line("b", CurrencyCode::USD),
            line("a", CurrencyCode::USD),
        ])
        .unwrap();
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.count_of(&key("a")), 2);

        let mixed = Cart::from_lines(vec![line("a", CurrencyCode::USD), line("b", CurrencyCode::GBP)]);
        assert!(matches!(mixed, Err(CartError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_quantity_never_negative_over_sequences() {
        let mut cart = Cart::new();
        let ops: [(bool, u32); 8] = [
            (true, 2),
            (false, 1),
            (false, 4),
            (true, 1),
            (false, 1),
            (false, 1),
            (true, 3),
            (false, 2),
        ];
        let mut expected: i64 = 0;
        for (is_add, qty) in ops {
            if is_add {
                cart.add(
                    key("k"),
                    Decimal::ONE,
                    CurrencyCode::USD,
                    LineMetadata::default(),
                    qty,
                )
                .unwrap();
                expected += i64::from(qty);
            } else {
                cart.remove(&key("k"), qty);
                expected = (expected - i64::from(qty)).max(0);
            }
            assert_eq!(i64::from(cart.count_of(&key("k"))), expected);
            assert!(cart.lines().iter().all(|l| l.quantity >= 1));
        }
    }
}
