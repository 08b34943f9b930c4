//! Cart subtotal, tax and total calculation.

use rust_decimal::Decimal;

use crate::cart::CartLine;
use crate::types::money::round_half_up;
use crate::types::{CurrencyCode, CurrencyDisplay, Price};

/// Pricing parameters injected into [`compute_totals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PricingConfig {
    /// Currency reported for an empty cart.
    pub default_currency: CurrencyCode,
    /// Tax rate as a fraction (e.g. `0.18` for 18%).
    pub tax_rate: Decimal,
    /// How formatted amounts place the currency marker.
    pub display: CurrencyDisplay,
}

/// Formatted amounts, always with exactly two fractional digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedTotals {
    pub subtotal: String,
    pub tax: String,
    pub total: String,
}

/// Price summary for a list of lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartTotals {
    pub currency: CurrencyCode,
    /// Sum of line totals, rounded half-up to 2 dp.
    pub subtotal: Decimal,
    /// `subtotal * tax_rate`, rounded half-up to 2 dp.
    pub tax: Decimal,
    /// `subtotal + tax`.
    pub total: Decimal,
    /// Sum of quantities.
    pub item_count: u64,
    pub formatted: FormattedTotals,
}

/// Compute the price summary for `lines`.
///
/// The currency is taken from the first line, falling back to
/// `config.default_currency` for an empty list. Input validation (negative
/// prices, zero quantities, amount limits) is the cart's job; this function
/// only reads, and saturates rather than panicking on lines built elsewhere.
#[must_use]
pub fn compute_totals(lines: &[CartLine], config: &PricingConfig) -> CartTotals {
    let currency = lines
        .first()
        .map_or(config.default_currency, |line| line.currency);

    let subtotal = round_half_up(
        lines
            .iter()
            .map(CartLine::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add),
    );
    let tax = round_half_up(subtotal.saturating_mul(config.tax_rate));
    let total = subtotal.saturating_add(tax);
    let item_count = lines.iter().map(|line| u64::from(line.quantity)).sum();

    let render = |amount: Decimal| Price::new(amount, currency).display(config.display);

    CartTotals {
        currency,
        subtotal,
        tax,
        total,
        item_count,
        formatted: FormattedTotals {
            subtotal: render(subtotal),
            tax: render(tax),
            total: render(total),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::LineMetadata;
    use crate::types::ProductKey;

    fn line(k: &str, cents: i64, quantity: u32, currency: CurrencyCode) -> CartLine {
        CartLine {
            product_key: ProductKey::parse(k).unwrap(),
            unit_price: Decimal::new(cents, 2),
            currency,
            quantity,
            metadata: LineMetadata::default(),
        }
    }

    #[test]
    fn test_totals_with_tax() {
        let lines = [
            line("a", 250, 3, CurrencyCode::USD),
            line("b", 100, 1, CurrencyCode::USD),
        ];
        let config = PricingConfig {
            tax_rate: Decimal::new(18, 2),
            ..PricingConfig::default()
        };

        let totals = compute_totals(&lines, &config);
        assert_eq!(totals.subtotal, Decimal::new(850, 2));
        assert_eq!(totals.tax, Decimal::new(153, 2));
        assert_eq!(totals.total, Decimal::new(1003, 2));
        assert_eq!(totals.item_count, 4);
        assert_eq!(totals.formatted.subtotal, "USD 8.50");
        assert_eq!(totals.formatted.tax, "USD 1.53");
        assert_eq!(totals.formatted.total, "USD 10.03");
    }

    #[test]
    fn test_empty_cart_uses_default_currency() {
        let config = PricingConfig {
            default_currency: CurrencyCode::INR,
            display: CurrencyDisplay::SymbolPrefix,
            ..PricingConfig::default()
        };

        let totals = compute_totals(&[], &config);
        assert_eq!(totals.currency, CurrencyCode::INR);
        assert_eq!(totals.formatted.subtotal, "₹0.00");
        assert_eq!(totals.formatted.total, "₹0.00");
        assert_eq!(totals.item_count, 0);
    }

    #[test]
    fn test_currency_comes_from_first_line() {
        let lines = [line("a", 1000, 1, CurrencyCode::GBP)];
        let totals = compute_totals(&lines, &PricingConfig::default());
        assert_eq!(totals.currency, CurrencyCode::GBP);
        assert_eq!(totals.formatted.total, "GBP 10.00");
    }

    #[test]
    fn test_subtotal_rounds_half_up() {
        let mut fractional = line("a", 0, 1, CurrencyCode::USD);
        fractional.unit_price = Decimal::new(1005, 3);

        let totals = compute_totals(&[fractional], &PricingConfig::default());
        assert_eq!(totals.subtotal, Decimal::new(101, 2));
        assert_eq!(totals.formatted.subtotal, "USD 1.01");
    }

    #[test]
    fn test_tax_defaults_to_zero() {
        let lines = [line("a", 999, 2, CurrencyCode::USD)];
        let totals = compute_totals(&lines, &PricingConfig::default());
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, totals.subtotal);
        assert_eq!(totals.formatted.tax, "USD 0.00");
    }

    #[test]
    fn test_largest_accepted_cart_totals_without_overflow() {
        let mut cart = crate::cart::Cart::new();
        cart.add(
            ProductKey::parse("big").unwrap(),
            crate::cart::MAX_CART_SUBTOTAL,
            CurrencyCode::USD,
            LineMetadata::default(),
            1,
        )
        .unwrap();
        let config = PricingConfig {
            tax_rate: Decimal::ONE,
            ..PricingConfig::default()
        };

        let totals = compute_totals(&cart.lines(), &config);
        assert_eq!(totals.subtotal, crate::cart::MAX_CART_SUBTOTAL);
        assert_eq!(totals.total, crate::cart::MAX_CART_SUBTOTAL * Decimal::TWO);
    }

    #[test]
    fn test_oversized_raw_lines_do_not_panic() {
        let mut big = line("a", 0, u32::MAX, CurrencyCode::USD);
        big.unit_price = Decimal::MAX;

        let totals = compute_totals(&[big.clone(), big], &PricingConfig::default());
        assert_eq!(totals.subtotal, Decimal::MAX);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let lines = vec![line("a", 250, 3, CurrencyCode::USD)];
        let before = lines.clone();
        let _ = compute_totals(&lines, &PricingConfig::default());
        assert_eq!(lines, before);
    }
}
