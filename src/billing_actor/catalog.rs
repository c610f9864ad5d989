//! Product catalog and its concurrent loader.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::model::{Product, ProductDetails, ProductKind, ProductRequest, ProductType};
use crate::provider::{BillingProvider, ProviderError};

/// Product metadata keyed by product id.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: HashMap<String, Product>,
}

impl ProductCatalog {
    pub fn get(&self, product_id: &str) -> Option<&Product> {
        self.products.get(product_id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Fetches metadata for `requests`, one provider query per non-empty partition.
    ///
    /// Queries run concurrently and every completion is merged as it arrives (last write wins).
    /// A failing query contributes nothing; the load itself never fails.
    pub async fn load(provider: Arc<dyn BillingProvider>, requests: &[ProductRequest]) -> Self {
        let mut kinds: HashMap<String, ProductKind> = HashMap::new();
        let mut buckets: HashMap<ProductType, Vec<String>> = HashMap::new();
        for request in requests {
            kinds.insert(request.id.clone(), request.kind);
            buckets
                .entry(request.kind.product_type())
                .or_default()
                .push(request.id.clone());
        }

        let mut queries: JoinSet<(ProductType, Result<Vec<ProductDetails>, ProviderError>)> =
            JoinSet::new();
        for (product_type, ids) in buckets {
            let provider = provider.clone();
            debug!(%product_type, ?ids, "Querying product details");
            queries.spawn(async move {
                let result = provider.query_product_details(product_type, ids).await;
                (product_type, result)
            });
        }

        let mut outstanding = queries.len();
        let mut catalog = ProductCatalog::default();
        while let Some(joined) = queries.join_next().await {
            outstanding -= 1;
            match joined {
                Ok((product_type, Ok(details))) => {
                    info!(%product_type, found = details.len(), outstanding, "Product query ok");
                    for entry in details {
                        let kind = kinds
                            .get(&entry.product_id)
                            .copied()
                            .unwrap_or_else(|| entry.product_type.restored_kind());
                        catalog
                            .products
                            .insert(entry.product_id.clone(), Product::from_details(&entry, kind));
                    }
                }
                Ok((product_type, Err(e))) => {
                    warn!(%product_type, code = %e.code, error = %e.message, outstanding, "Product query failed");
                }
                Err(e) => {
                    warn!(error = %e, outstanding, "Product query task failed");
                }
            }
        }

        info!(product_count = catalog.len(), "Catalog loaded");
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{one_time_product, subscription_product, MockProvider};
    use crate::provider::ResponseCode;
    use std::time::Duration;

    fn requests(entries: &[(&str, ProductKind)]) -> Vec<ProductRequest> {
        entries
            .iter()
            .map(|(id, kind)| ProductRequest::new(*id, *kind))
            .collect()
    }

    fn store() -> MockProvider {
        MockProvider::new()
            .with_product(one_time_product("coins_100", "100 coins", 1_990_000))
            .with_product(one_time_product("coins_500", "500 coins", 7_990_000))
            .with_product(subscription_product("premium", "Premium", 4_990_000, "offer_1"))
    }

    #[tokio::test]
    async fn test_two_partitions_are_merged() {
        let mock = Arc::new(store());
        let catalog = ProductCatalog::load(
            mock.clone(),
            &requests(&[
                ("coins_100", ProductKind::Consumable),
                ("coins_500", ProductKind::Consumable),
                ("premium", ProductKind::Subscription),
            ]),
        )
        .await;

        assert_eq!(catalog.len(), 3);
        assert_eq!(mock.catalog_queries(), 2);
        assert_eq!(catalog.get("premium").unwrap().offer_token.as_deref(), Some("offer_1"));
        assert_eq!(catalog.get("coins_100").unwrap().kind, ProductKind::Consumable);
    }

    #[tokio::test]
    async fn test_one_query_per_non_empty_partition() {
        let mock = Arc::new(store());
        let catalog = ProductCatalog::load(
            mock.clone(),
            &requests(&[("coins_100", ProductKind::NonConsumable)]),
        )
        .await;
        assert_eq!(catalog.len(), 1);
        assert_eq!(mock.catalog_queries(), 1);

        let mock = Arc::new(store());
        let catalog = ProductCatalog::load(mock.clone(), &[]).await;
        assert!(catalog.is_empty());
        assert_eq!(mock.catalog_queries(), 0);
    }

    #[tokio::test]
    async fn test_failed_partition_contributes_nothing() {
        let mock = Arc::new(store().fail_product_query(
            ProductType::Subs,
            ProviderError::new(ResponseCode::ServiceUnavailable, "Service unavailable"),
        ));
        let catalog = ProductCatalog::load(
            mock.clone(),
            &requests(&[
                ("coins_100", ProductKind::Consumable),
                ("premium", ProductKind::Subscription),
            ]),
        )
        .await;

        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("premium").is_none());
        assert_eq!(mock.catalog_queries(), 2);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_dropped() {
        let mock = Arc::new(store());
        let catalog = ProductCatalog::load(
            mock,
            &requests(&[("missing", ProductKind::Consumable), ("coins_100", ProductKind::Consumable)]),
        )
        .await;
        assert_eq!(catalog.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partitions_are_queried_concurrently() {
        let mock = Arc::new(store().with_query_delay(Duration::from_secs(5)));
        let started = tokio::time::Instant::now();

        let catalog = ProductCatalog::load(
            mock,
            &requests(&[
                ("coins_100", ProductKind::Consumable),
                ("premium", ProductKind::Subscription),
            ]),
        )
        .await;

        assert_eq!(catalog.len(), 2);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
