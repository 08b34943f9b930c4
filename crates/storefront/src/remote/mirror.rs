//! Last-known server view of the cart.

use std::collections::HashMap;

use cartwheel_core::{Cart, CartError, CartLine, CurrencyCode, ProductKey};
use rust_decimal::Decimal;
use tracing::warn;

use super::types::RemoteCartPayload;

/// One product line as the server reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMirrorLine {
    pub product_key: ProductKey,
    pub quantity: u32,
    pub name: Option<String>,
    pub unit_price: Option<Decimal>,
}

/// The server's cart, keyed by product in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteCartMirror {
    lines: Vec<RemoteMirrorLine>,
}

/// A product whose local and server quantities disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub product_key: ProductKey,
    pub local: u32,
    pub remote: u32,
}

impl RemoteCartMirror {
    /// Build the mirror from a service payload.
    ///
    /// Lines with an unusable product ID or a non-positive quantity are
    /// skipped. Repeated product IDs are summed into the first occurrence.
    #[must_use]
    pub fn from_payload(payload: &RemoteCartPayload) -> Self {
        let mut lines: Vec<RemoteMirrorLine> = Vec::with_capacity(payload.items.len());
        let mut index: HashMap<ProductKey, usize> = HashMap::new();

        for item in &payload.items {
            let product_key = match item.product_id.to_key() {
                Ok(key) => key,
                Err(e) => {
                    warn!(error = %e, "Skipping remote cart line with invalid product id");
                    continue;
                }
            };
            let quantity = match u32::try_from(item.quantity) {
                Ok(q) if q > 0 => q,
                _ => {
                    warn!(
                        product_key = %product_key,
                        quantity = item.quantity,
                        "Skipping remote cart line with non-positive quantity"
                    );
                    continue;
                }
            };

            if let Some(existing) = index.get(&product_key).and_then(|&i| lines.get_mut(i)) {
                existing.quantity = existing.quantity.saturating_add(quantity);
                continue;
            }

            index.insert(product_key.clone(), lines.len());
            lines.push(RemoteMirrorLine {
                product_key,
                quantity,
                name: item
                    .product
                    .as_ref()
                    .map(|p| p.name.clone())
                    .filter(|n| !n.is_empty()),
                unit_price: item.product.as_ref().map(|p| p.price),
            });
        }

        Self { lines }
    }

    #[must_use]
    pub fn lines(&self) -> &[RemoteMirrorLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Server quantity of a product, 0 if absent.
    #[must_use]
    pub fn quantity_of(&self, product_key: &ProductKey) -> u32 {
        self.lines
            .iter()
            .find(|line| &line.product_key == product_key)
            .map_or(0, |line| line.quantity)
    }

    /// Convert to local cart lines priced in `currency`.
    ///
    /// A line without a server price takes its price and metadata from the
    /// matching `local` line; if there is none it is dropped.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if a server price is negative.
    pub fn to_cart_lines(
        &self,
        currency: CurrencyCode,
        local: &Cart,
    ) -> Result<Vec<CartLine>, CartError> {
        let mut out = Vec::with_capacity(self.lines.len());

        for line in &self.lines {
            let known = local.get(&line.product_key);
            let unit_price = match (line.unit_price, known) {
                (Some(price), _) => price,
                (None, Some(existing)) => existing.unit_price,
                (None, None) => {
                    warn!(
                        product_key = %line.product_key,
                        "Dropping remote line with no known price"
                    );
                    continue;
                }
            };

            let mut metadata = known.map(|l| l.metadata.clone()).unwrap_or_default();
            if let Some(name) = &line.name {
                metadata.title = Some(name.clone());
            }

            out.push(CartLine::new(
                line.product_key.clone(),
                unit_price,
                currency,
                line.quantity,
                metadata,
            )?);
        }

        Ok(out)
    }

    /// Products whose quantity differs between `local` and this mirror.
    ///
    /// Local order first, then products only the server knows about.
    #[must_use]
    pub fn divergence(&self, local: &Cart) -> Vec<Divergence> {
        let mut out: Vec<Divergence> = local
            .iter()
            .filter_map(|line| {
                let remote = self.quantity_of(&line.product_key);
                (remote != line.quantity).then(|| Divergence {
                    product_key: line.product_key.clone(),
                    local: line.quantity,
                    remote,
                })
            })
            .collect();

        out.extend(
            self.lines
                .iter()
                .filter(|line| local.count_of(&line.product_key) == 0)
                .map(|line| Divergence {
                    product_key: line.product_key.clone(),
                    local: 0,
                    remote: line.quantity,
                }),
        );

        out
    }
}
