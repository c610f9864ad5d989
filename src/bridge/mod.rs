//! # Host Bridge
//!
//! Maps the host's method-name + JSON argument calls onto [`BillingClient`].
//!
//! | Method | Arguments | Response |
//! |--------|-----------|----------|
//! | `initialize` | `{ products: [{ id, type? }] }` | `{ success, productCount }` |
//! | `purchase` | `{ productId, type? }` | receipt fields, `{ cancelled: true }` or `{ pending: true }` |
//! | `restorePurchases` | none | `{ success, purchases: [...] }` |
//! | `getProductInfo` | `{ productId }` | `{ id, title, description, price?, priceValue?, currencyCode? }` |

pub mod dto;

pub use dto::*;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::billing_actor::BillingError;
use crate::clients::BillingClient;
use crate::model::{ProductKind, ProductRequest};

#[derive(Clone)]
pub struct IapBridge {
    client: BillingClient,
}

impl IapBridge {
    pub fn new(client: BillingClient) -> Self {
        Self { client }
    }

    /// Dispatches one host call.
    #[instrument(skip(self, args))]
    pub async fn invoke(&self, method: &str, args: Value) -> Result<Value, BillingError> {
        debug!(%args, "Bridge call");
        match method {
            "initialize" => {
                let products = parse_products(&args)?;
                let product_count = self.client.initialize(products).await?;
                to_json(&InitializeResponse {
                    success: true,
                    product_count,
                })
            }
            "purchase" => {
                let product_id = required_str(&args, "productId")?;
                let outcome = self.client.purchase(product_id, parse_kind(&args)).await?;
                to_json(&PurchaseResponse::from(outcome))
            }
            "restorePurchases" => {
                let purchases = self.client.restore_purchases().await?;
                to_json(&RestoreResponse {
                    success: true,
                    purchases,
                })
            }
            "getProductInfo" => {
                let product_id = required_str(&args, "productId")?;
                to_json(&self.client.product_info(product_id).await?)
            }
            other => Err(BillingError::UnknownMethod(other.to_string())),
        }
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, BillingError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| BillingError::MissingParameter(key.to_string()))
}

fn parse_products(args: &Value) -> Result<Vec<ProductRequest>, BillingError> {
    let products = match args.get("products") {
        None | Some(Value::Null) => {
            return Err(BillingError::MissingParameter("products".to_string()))
        }
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            return Err(BillingError::MalformedProductList(
                "products must be an array".to_string(),
            ))
        }
    };

    products
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value::<ProductRequest>(entry.clone())
                .map_err(|e| BillingError::MalformedProductList(format!("entry {index}: {e}")))
        })
        .collect()
}

/// An absent or unrecognized `type` leaves the choice to the catalog.
fn parse_kind(args: &Value) -> Option<ProductKind> {
    args.get("type")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, BillingError> {
    serde_json::to_value(value).map_err(|e| BillingError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_products() {
        assert_eq!(
            parse_products(&json!({})),
            Err(BillingError::MissingParameter("products".to_string()))
        );
        assert_eq!(
            parse_products(&json!({ "products": null })),
            Err(BillingError::MissingParameter("products".to_string()))
        );
    }

    #[test]
    fn test_malformed_products() {
        assert!(matches!(
            parse_products(&json!({ "products": "coins_100" })),
            Err(BillingError::MalformedProductList(_))
        ));
        assert!(matches!(
            parse_products(&json!({ "products": [{ "type": "consumable" }] })),
            Err(BillingError::MalformedProductList(_))
        ));
        assert!(matches!(
            parse_products(&json!({ "products": [{ "id": "a", "type": "lifetime" }] })),
            Err(BillingError::MalformedProductList(_))
        ));
    }

    #[test]
    fn test_products_default_to_consumable() {
        let products = parse_products(&json!({
            "products": [
                { "id": "coins_100" },
                { "id": "premium", "type": "subscription" }
            ]
        }))
        .unwrap();
        assert_eq!(products[0].kind, ProductKind::Consumable);
        assert_eq!(products[1].kind, ProductKind::Subscription);
    }

    #[test]
    fn test_purchase_kind() {
        assert_eq!(parse_kind(&json!({ "type": "non_consumable" })), Some(ProductKind::NonConsumable));
        assert_eq!(parse_kind(&json!({ "type": "gift" })), None);
        assert_eq!(parse_kind(&json!({})), None);
    }
}
