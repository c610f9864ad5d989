//! Restoring previously owned purchases.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::model::{ProductType, PurchaseRecord, RestoredPurchase};
use crate::provider::{BillingProvider, ProviderError};

/// Queries both partitions concurrently and merges the settled purchases.
///
/// Pending records are dropped, records without a product id are skipped, and a failing
/// partition contributes nothing. No de-duplication.
pub async fn restore(provider: &Arc<dyn BillingProvider>) -> Vec<RestoredPurchase> {
    let (subscriptions, one_time) = tokio::join!(
        provider.query_owned_purchases(ProductType::Subs),
        provider.query_owned_purchases(ProductType::InApp),
    );

    let mut restored = Vec::new();
    for (product_type, result) in [(ProductType::Subs, subscriptions), (ProductType::InApp, one_time)] {
        restored.extend(normalize(product_type, result));
    }

    info!(count = restored.len(), "Purchases restored");
    restored
}

fn normalize(
    product_type: ProductType,
    result: Result<Vec<PurchaseRecord>, ProviderError>,
) -> Vec<RestoredPurchase> {
    let records = match result {
        Ok(records) => records,
        Err(e) => {
            warn!(%product_type, code = %e.code, error = %e.message, "Owned purchases query failed");
            return Vec::new();
        }
    };

    debug!(%product_type, owned = records.len(), "Owned purchases");
    let kind = product_type.restored_kind();
    records
        .iter()
        .filter(|record| record.is_purchased())
        .filter_map(|record| RestoredPurchase::from_record(record, kind))
        .collect()
}
