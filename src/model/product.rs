//! Product metadata as the controller sees it.
//!
//! # Catalog
//! Products are built from the provider's [`ProductDetails`] plus the [`ProductKind`] the caller
//! asked for at `initialize` time. The provider only distinguishes subscriptions from one-time
//! products, so the consumable/non-consumable split is carried over from the request.
//!
//! See [`ProductCatalog`](crate::billing_actor::ProductCatalog) for how products are loaded.
use serde::{Deserialize, Serialize};

use std::fmt::Display;

/// Micro-units per currency unit, as used by the provider for every price amount.
pub const MICROS_PER_UNIT: f64 = 1_000_000.0;

/// Converts a provider price expressed in micro-units into a decimal amount.
///
/// `1_990_000` becomes `1.99`.
pub fn micros_to_decimal(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_UNIT
}

/// How the caller intends to use a product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// Can be bought repeatedly; consumed after every purchase.
    #[default]
    Consumable,
    NonConsumable,
    Subscription,
}

impl ProductKind {
    /// The provider partition this kind is queried in.
    pub fn product_type(self) -> ProductType {
        match self {
            ProductKind::Subscription => ProductType::Subs,
            ProductKind::Consumable | ProductKind::NonConsumable => ProductType::InApp,
        }
    }
}

impl Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ProductKind::Consumable => "consumable",
            ProductKind::NonConsumable => "non_consumable",
            ProductKind::Subscription => "subscription",
        };
        f.write_str(label)
    }
}

/// Provider-side product partition. One catalog or ownership query is issued per partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Subs,
    InApp,
}

impl ProductType {
    /// Kind reported for purchases restored from this partition.
    pub fn restored_kind(self) -> ProductKind {
        match self {
            ProductType::Subs => ProductKind::Subscription,
            ProductType::InApp => ProductKind::NonConsumable,
        }
    }
}

impl Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductType::Subs => f.write_str("subs"),
            ProductType::InApp => f.write_str("inapp"),
        }
    }
}

/// One entry of the `initialize` product list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRequest {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ProductKind,
}

impl ProductRequest {
    pub fn new(id: impl Into<String>, kind: ProductKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// A single pricing phase of a subscription offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPhase {
    pub formatted_price: String,
    pub price_amount_micros: i64,
    pub price_currency_code: String,
}

/// Price of a one-time product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimeOffer {
    pub formatted_price: String,
    pub price_amount_micros: i64,
    pub price_currency_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOffer {
    pub offer_token: String,
    pub pricing_phases: Vec<PricingPhase>,
}

/// Raw product metadata returned by the provider's catalog query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub product_id: String,
    pub product_type: ProductType,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub one_time_offer: Option<OneTimeOffer>,
    #[serde(default)]
    pub subscription_offers: Vec<SubscriptionOffer>,
}

/// A resolved price: the provider's display string plus the raw amount.
#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub formatted: String,
    pub amount_micros: i64,
    pub currency_code: String,
}

impl Price {
    pub fn value(&self) -> f64 {
        micros_to_decimal(self.amount_micros)
    }
}

impl ProductDetails {
    /// Price shown to the user.
    ///
    /// Subscriptions use the first pricing phase of their first offer; one-time products use
    /// their one-time offer. `None` when the provider returned no offer.
    pub fn price(&self) -> Option<Price> {
        match self.product_type {
            ProductType::Subs => self
                .subscription_offers
                .first()
                .and_then(|offer| offer.pricing_phases.first())
                .map(|phase| Price {
                    formatted: phase.formatted_price.clone(),
                    amount_micros: phase.price_amount_micros,
                    currency_code: phase.price_currency_code.clone(),
                }),
            ProductType::InApp => self.one_time_offer.as_ref().map(|offer| Price {
                formatted: offer.formatted_price.clone(),
                amount_micros: offer.price_amount_micros,
                currency_code: offer.price_currency_code.clone(),
            }),
        }
    }

    /// Offer token attached to the purchase flow. Only subscriptions carry one.
    pub fn offer_token(&self) -> Option<&str> {
        match self.product_type {
            ProductType::Subs => self
                .subscription_offers
                .first()
                .map(|offer| offer.offer_token.as_str()),
            ProductType::InApp => None,
        }
    }
}

/// A catalog entry. Immutable once fetched; replaced wholesale on re-initialize.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    pub kind: ProductKind,
    pub title: String,
    pub description: String,
    pub price: Option<Price>,
    pub offer_token: Option<String>,
}

impl Product {
    /// Builds a catalog entry from provider metadata and the kind the caller requested.
    pub fn from_details(details: &ProductDetails, kind: ProductKind) -> Self {
        Self {
            id: details.product_id.clone(),
            kind,
            title: details.title.clone(),
            description: details.description.clone(),
            price: details.price(),
            offer_token: details.offer_token().map(str::to_owned),
        }
    }
}

/// Caller-facing product description returned by `getProductInfo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
}

impl From<&Product> for ProductInfo {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            title: product.title.clone(),
            description: product.description.clone(),
            price: product.price.as_ref().map(|p| p.formatted.clone()),
            price_value: product.price.as_ref().map(Price::value),
            currency_code: product.price.as_ref().map(|p| p.currency_code.clone()),
        }
    }
}
