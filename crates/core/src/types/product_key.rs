//! Product key type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ProductKey`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductKeyError {
    /// The input is empty or only whitespace.
    #[error("product key cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("product key must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A stable catalog identifier (SKU or equivalent) for a product.
///
/// Two cart lines with equal keys represent the same product. Keys are
/// compared exactly after surrounding whitespace is trimmed on parse.
///
/// ## Constraints
///
/// - Length: 1-128 characters after trimming
///
/// ## Examples
///
/// ```
/// use cartwheel_core::ProductKey;
///
/// assert!(ProductKey::parse("SKU-1042").is_ok());
/// assert_eq!(ProductKey::parse("  17 ").unwrap().as_str(), "17");
///
/// assert!(ProductKey::parse("").is_err());
/// assert!(ProductKey::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ProductKey(String);

impl ProductKey {
    /// Maximum length of a product key.
    pub const MAX_LENGTH: usize = 128;

    /// Parse a `ProductKey` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or longer than
    /// [`ProductKey::MAX_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, ProductKeyError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ProductKeyError::Empty);
        }

        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(ProductKeyError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the key as an unsigned integer when it is purely numeric.
    ///
    /// Server-side carts identify products by integer ID; this lets the wire
    /// layer send a JSON number instead of a string for those keys.
    #[must_use]
    pub fn as_numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ProductKey {
    type Err = ProductKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProductKey {
    type Error = ProductKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProductKey> for String {
    fn from(key: ProductKey) -> Self {
        key.0
    }
}

impl From<u64> for ProductKey {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for ProductKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_keys() {
        assert!(ProductKey::parse("SKU-1").is_ok());
        assert!(ProductKey::parse("42").is_ok());
        assert!(ProductKey::parse("gid://shop/Product/99").is_ok());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let key = ProductKey::parse("  banana-6pk\n").unwrap();
        assert_eq!(key.as_str(), "banana-6pk");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(ProductKey::parse(""), Err(ProductKeyError::Empty));
        assert_eq!(ProductKey::parse(" \t "), Err(ProductKeyError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "k".repeat(ProductKey::MAX_LENGTH + 1);
        assert!(matches!(
            ProductKey::parse(&long),
            Err(ProductKeyError::TooLong { .. })
        ));

        let max = "k".repeat(ProductKey::MAX_LENGTH);
        assert!(ProductKey::parse(&max).is_ok());
    }

    #[test]
    fn test_numeric_keys() {
        assert_eq!(ProductKey::from(17).as_numeric(), Some(17));
        assert_eq!(ProductKey::parse("SKU-17").unwrap().as_numeric(), None);
    }

    #[test]
    fn test_serde_rejects_empty_key() {
        let parsed: Result<ProductKey, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());

        let parsed: ProductKey = serde_json::from_str("\"apple\"").unwrap();
        assert_eq!(parsed.as_str(), "apple");
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"apple\"");
    }
}
