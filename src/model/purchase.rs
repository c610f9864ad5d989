//! Purchase records reported by the provider and the caller-facing views derived from them.

use serde::{Deserialize, Serialize};

use super::ProductKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseState {
    /// Payment not settled yet (deferred payment methods).
    Pending,
    Purchased,
    Cancelled,
}

/// A purchase as reported by the provider.
///
/// Records are transient: they are derived from provider events and never cached beyond the
/// call that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub product_ids: Vec<String>,
    pub purchase_token: String,
    pub order_id: String,
    pub state: PurchaseState,
    pub acknowledged: bool,
    /// Raw receipt payload, forwarded untouched for server-side validation.
    pub original_json: String,
    pub signature: String,
    /// Milliseconds since the Unix epoch.
    pub purchase_time: i64,
}

impl PurchaseRecord {
    pub fn primary_product_id(&self) -> Option<&str> {
        self.product_ids.first().map(String::as_str)
    }

    pub fn is_purchased(&self) -> bool {
        self.state == PurchaseState::Purchased
    }

    /// Only settled, not-yet-acknowledged purchases need an acknowledgment.
    pub fn needs_acknowledgement(&self) -> bool {
        self.is_purchased() && !self.acknowledged
    }
}

/// Receipt fields handed back to the caller after a successful purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub receipt: String,
    pub signature: String,
    pub transaction_id: String,
    pub product_id: String,
    pub purchase_token: String,
    pub purchase_date: String,
}

impl Receipt {
    /// Builds the receipt, falling back to the requested id if the record names no product.
    pub fn from_record(record: &PurchaseRecord, requested_product_id: &str) -> Self {
        Self {
            receipt: record.original_json.clone(),
            signature: record.signature.clone(),
            transaction_id: record.order_id.clone(),
            product_id: record
                .primary_product_id()
                .unwrap_or(requested_product_id)
                .to_string(),
            purchase_token: record.purchase_token.clone(),
            purchase_date: record.purchase_time.to_string(),
        }
    }
}

/// How a purchase request was answered.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    Completed(Receipt),
    /// The user backed out of the purchase UI.
    Cancelled,
    /// The provider accepted the order but payment is still pending.
    Pending { product_id: String },
}

/// One entry of the `restorePurchases` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredPurchase {
    pub product_id: String,
    #[serde(rename = "type")]
    pub kind: ProductKind,
    pub receipt: String,
    pub signature: String,
    pub transaction_id: String,
    pub purchase_date: String,
}

impl RestoredPurchase {
    /// Normalizes a record; `None` when the record names no product.
    pub fn from_record(record: &PurchaseRecord, kind: ProductKind) -> Option<Self> {
        let product_id = record.primary_product_id()?;
        Some(Self {
            product_id: product_id.to_string(),
            kind,
            receipt: record.original_json.clone(),
            signature: record.signature.clone(),
            transaction_id: record.order_id.clone(),
            purchase_date: record.purchase_time.to_string(),
        })
    }
}
