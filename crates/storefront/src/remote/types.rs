//! Wire types for the remote cart service.

use cartwheel_core::{ProductKey, ProductKeyError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product identifier as it appears on the wire.
///
/// The server keys products by integer ID; string SKUs are passed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireProductId {
    Number(u64),
    Text(String),
}

impl WireProductId {
    /// Convert to a validated product key.
    ///
    /// # Errors
    ///
    /// Returns `ProductKeyError` for empty or overlong string IDs.
    pub fn to_key(&self) -> Result<ProductKey, ProductKeyError> {
        match self {
            Self::Number(id) => Ok(ProductKey::from(*id)),
            Self::Text(s) => ProductKey::parse(s),
        }
    }
}

impl From<&ProductKey> for WireProductId {
    fn from(key: &ProductKey) -> Self {
        // Only canonical integers go out as numbers so "007" round-trips.
        key.as_numeric()
            .filter(|id| id.to_string() == key.as_str())
            .map_or_else(|| Self::Text(key.to_string()), Self::Number)
    }
}

/// Body of `GET cart` (and of mutation responses that echo the cart).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCartPayload {
    #[serde(default)]
    pub items: Vec<RemoteCartItem>,
}

/// One server-side cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCartItem {
    pub product_id: WireProductId,
    pub quantity: i64,
    #[serde(default, alias = "Product")]
    pub product: Option<RemoteProduct>,
}

/// Product details embedded in a server cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProduct {
    #[serde(default)]
    pub name: String,
    pub price: Decimal,
}

/// Body of `POST cart/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItemRequest {
    pub product_id: WireProductId,
    pub quantity: u32,
}

/// Body of `DELETE cart/delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteItemRequest {
    pub product_id: WireProductId,
    pub quantity: u32,
}

/// Error body returned by the service, `{"error": "..."}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Extract the most specific message from a raw response body.
    #[must_use]
    pub fn message_from(body: &str) -> String {
        serde_json::from_str::<Self>(body)
            .ok()
            .and_then(|parsed| parsed.error.or(parsed.message))
            .unwrap_or_else(|| body.chars().take(200).collect())
    }
}

/// Parse a mutation response body as a cart when it carries an `items` list.
///
/// Plain acknowledgements such as `{"message": "Item added to cart"}` yield
/// `None`.
#[must_use]
pub fn parse_echoed_cart(body: &str) -> Option<RemoteCartPayload> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if !value.get("items").is_some_and(serde_json::Value::is_array) {
        return None;
    }
    serde_json::from_value(value).ok()
}
