//! SKU grouping over raw cart line lists.
//!
//! [`Cart`](crate::Cart) already guarantees one line per product, so grouping
//! a cart snapshot yields single-entry groups. Raw inputs from other sources
//! (a legacy one-entry-per-unit list, or a remote merge that has not been
//! reconciled yet) may repeat a product; those duplicates are summed into the
//! first-seen line's position. Grouping never fails.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::cart::CartLine;
use crate::types::ProductKey;

/// One product's merged line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductGroup {
    /// The first-seen line with the quantities of later duplicates added in.
    pub line: CartLine,
    /// Number of raw entries merged into this group.
    pub merged_entries: usize,
}

impl ProductGroup {
    /// Product this group belongs to.
    #[must_use]
    pub const fn product_key(&self) -> &ProductKey {
        &self.line.product_key
    }

    /// Combined quantity.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.line.quantity
    }
}

/// Lines grouped by product, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedCart {
    groups: Vec<ProductGroup>,
    index: HashMap<ProductKey, usize>,
}

impl GroupedCart {
    /// Group for a product.
    #[must_use]
    pub fn get(&self, product_key: &ProductKey) -> Option<&ProductGroup> {
        self.index
            .get(product_key)
            .and_then(|&position| self.groups.get(position))
    }

    /// Combined quantity for a product, 0 if absent.
    #[must_use]
    pub fn count_of(&self, product_key: &ProductKey) -> u32 {
        self.get(product_key).map_or(0, ProductGroup::quantity)
    }

    /// Iterate groups in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &ProductGroup> {
        self.groups.iter()
    }

    /// Merged lines in first-seen order.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        self.groups.iter().map(|group| group.line.clone()).collect()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of quantities across every group.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.groups
            .iter()
            .map(|group| u64::from(group.quantity()))
            .sum()
    }

    /// Unrounded sum of `unit_price * quantity` across every group.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.groups
            .iter()
            .map(|group| group.line.line_total())
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }
}

impl<'a> IntoIterator for &'a GroupedCart {
    type Item = &'a ProductGroup;
    type IntoIter = std::slice::Iter<'a, ProductGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Group lines by product key.
///
/// Duplicate keys are merged into the first-seen line: quantities are summed
/// (saturating at `u32::MAX`) and the first line's price, currency and
/// metadata are kept.
#[must_use]
pub fn group_by_product(lines: &[CartLine]) -> GroupedCart {
    let mut grouped = GroupedCart::default();

    for line in lines {
        if let Some(group) = grouped
            .index
            .get(&line.product_key)
            .and_then(|&position| grouped.groups.get_mut(position))
        {
            group.line.quantity = group.line.quantity.saturating_add(line.quantity);
            group.merged_entries += 1;
            continue;
        }

        grouped
            .index
            .insert(line.product_key.clone(), grouped.groups.len());
        grouped.groups.push(ProductGroup {
            line: line.clone(),
            merged_entries: 1,
        });
    }

    grouped
}
