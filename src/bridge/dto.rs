//! Response shapes returned to the host.

use serde::Serialize;

use crate::model::{PurchaseOutcome, Receipt, RestoredPurchase};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    pub success: bool,
    pub product_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PurchaseResponse {
    Completed {
        success: bool,
        #[serde(flatten)]
        receipt: Receipt,
    },
    Cancelled {
        cancelled: bool,
    },
    Pending {
        pending: bool,
        #[serde(rename = "productId")]
        product_id: String,
    },
}

impl From<PurchaseOutcome> for PurchaseResponse {
    fn from(outcome: PurchaseOutcome) -> Self {
        match outcome {
            PurchaseOutcome::Completed(receipt) => PurchaseResponse::Completed {
                success: true,
                receipt,
            },
            PurchaseOutcome::Cancelled => PurchaseResponse::Cancelled { cancelled: true },
            PurchaseOutcome::Pending { product_id } => PurchaseResponse::Pending {
                pending: true,
                product_id,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestoreResponse {
    pub success: bool,
    pub purchases: Vec<RestoredPurchase>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completed_purchase_is_flat() {
        let response = PurchaseResponse::from(PurchaseOutcome::Completed(Receipt {
            receipt: "{}".to_string(),
            signature: "sig".to_string(),
            transaction_id: "GPA.1".to_string(),
            product_id: "coins_100".to_string(),
            purchase_token: "tok".to_string(),
            purchase_date: "1700000000000".to_string(),
        }));

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "success": true,
                "receipt": "{}",
                "signature": "sig",
                "transactionId": "GPA.1",
                "productId": "coins_100",
                "purchaseToken": "tok",
                "purchaseDate": "1700000000000",
            })
        );
    }

    #[test]
    fn test_cancelled_and_pending_shapes() {
        let cancelled = serde_json::to_value(PurchaseResponse::from(PurchaseOutcome::Cancelled)).unwrap();
        assert_eq!(cancelled, json!({ "cancelled": true }));

        let pending = serde_json::to_value(PurchaseResponse::from(PurchaseOutcome::Pending {
            product_id: "coins_100".to_string(),
        }))
        .unwrap();
        assert_eq!(pending, json!({ "pending": true, "productId": "coins_100" }));
    }

    #[test]
    fn test_initialize_response_keys() {
        let value = serde_json::to_value(InitializeResponse {
            success: true,
            product_count: 3,
        })
        .unwrap();
        assert_eq!(value, json!({ "success": true, "productCount": 3 }));
    }
}
