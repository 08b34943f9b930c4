//! Type-safe price representation using decimal arithmetic.
//!
//! Amounts are held as [`Decimal`] in the currency's standard unit (dollars,
//! not cents). Rounding to display precision always happens half-up
//! (midpoint away from zero), matching how shoppers expect totals to round.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of fractional digits shown for every amount.
pub const DISPLAY_SCALE: u32 = 2;

/// Errors from parsing currency codes or display conventions.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyParseError {
    /// Unknown ISO 4217 code.
    #[error("unsupported currency code: {0}")]
    UnknownCurrency(String),
    /// Unknown display convention name.
    #[error("unknown currency display convention: {0}")]
    UnknownDisplay(String),
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    INR,
}

impl CurrencyCode {
    /// Three-letter ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
            Self::INR => "INR",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
            Self::INR => "₹",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            "INR" => Ok(Self::INR),
            _ => Err(MoneyParseError::UnknownCurrency(s.to_string())),
        }
    }
}

/// Where the currency marker goes when an amount is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrencyDisplay {
    /// `USD 8.50`
    #[default]
    CodePrefix,
    /// `$8.50`
    SymbolPrefix,
    /// `8.50 USD`
    CodeSuffix,
}

impl std::str::FromStr for CurrencyDisplay {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "code-prefix" => Ok(Self::CodePrefix),
            "symbol-prefix" => Ok(Self::SymbolPrefix),
            "code-suffix" => Ok(Self::CodeSuffix),
            _ => Err(MoneyParseError::UnknownDisplay(s.to_string())),
        }
    }
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Format for display with exactly two fractional digits.
    #[must_use]
    pub fn display(&self, convention: CurrencyDisplay) -> String {
        let amount = format_amount(self.amount);
        match convention {
            CurrencyDisplay::CodePrefix => format!("{} {amount}", self.currency_code.code()),
            CurrencyDisplay::SymbolPrefix => format!("{}{amount}", self.currency_code.symbol()),
            CurrencyDisplay::CodeSuffix => format!("{amount} {}", self.currency_code.code()),
        }
    }
}

/// Round half-up to two decimal places.
#[must_use]
pub fn round_half_up(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Render an amount with exactly two fractional digits.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = round_half_up(amount);
    rounded.rescale(DISPLAY_SCALE);
    rounded.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_currency_from_str_is_case_insensitive() {
        assert_eq!(CurrencyCode::from_str("usd").unwrap(), CurrencyCode::USD);
        assert_eq!(CurrencyCode::from_str(" Inr ").unwrap(), CurrencyCode::INR);
        assert!(matches!(
            CurrencyCode::from_str("XYZ"),
            Err(MoneyParseError::UnknownCurrency(_))
        ));
    }

    #[test]
    fn test_format_amount_pads_and_rounds() {
        assert_eq!(format_amount(Decimal::new(85, 1)), "8.50");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
        assert_eq!(format_amount(Decimal::new(1005, 3)), "1.01");
        assert_eq!(format_amount(Decimal::new(1004, 3)), "1.00");
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(Decimal::new(125, 3)), Decimal::new(13, 2));
        assert_eq!(round_half_up(Decimal::new(-125, 3)), Decimal::new(-13, 2));
    }

    #[test]
    fn test_price_display_conventions() {
        let price = Price::new(Decimal::new(850, 2), CurrencyCode::USD);
        assert_eq!(price.display(CurrencyDisplay::CodePrefix), "USD 8.50");
        assert_eq!(price.display(CurrencyDisplay::SymbolPrefix), "$8.50");
        assert_eq!(price.display(CurrencyDisplay::CodeSuffix), "8.50 USD");

        let rupees = Price::new(Decimal::new(120, 0), CurrencyCode::INR);
        assert_eq!(rupees.display(CurrencyDisplay::SymbolPrefix), "₹120.00");
    }

    #[test]
    fn test_display_convention_parse() {
        assert_eq!(
            CurrencyDisplay::from_str("symbol-prefix").unwrap(),
            CurrencyDisplay::SymbolPrefix
        );
        assert!(CurrencyDisplay::from_str("left").is_err());
    }
}
