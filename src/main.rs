//! Demo: the full purchase lifecycle against the in-memory provider.

use std::sync::Arc;

use iap_controller::config::BillingConfig;
use iap_controller::lifecycle::tracing::setup_tracing;
use iap_controller::lifecycle::BillingSystem;
use iap_controller::provider::mock::{
    one_time_product, subscription_product, LaunchBehavior, MockProvider,
};
use serde_json::json;
use tracing::{info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = BillingConfig::load(None).map_err(|e| e.to_string())?;
    info!("Starting application with mock billing provider");

    let provider = Arc::new(
        MockProvider::new()
            .with_product(one_time_product("coins_100", "100 Coins", 1_990_000))
            .with_product(one_time_product("remove_ads", "Remove Ads", 2_990_000))
            .with_product(subscription_product(
                "premium_monthly",
                "Premium",
                4_990_000,
                "premium_monthly_base",
            ))
            .with_launch_behavior(LaunchBehavior::Purchase),
    );
    let system = BillingSystem::start(provider, config);
    let bridge = system.bridge();

    let initialized = bridge
        .invoke(
            "initialize",
            json!({
                "products": [
                    { "id": "coins_100", "type": "consumable" },
                    { "id": "remove_ads", "type": "non_consumable" },
                    { "id": "premium_monthly", "type": "subscription" }
                ]
            }),
        )
        .await
        .map_err(|e| e.to_string())?;
    info!(%initialized, "Initialized");

    let info = bridge
        .invoke("getProductInfo", json!({ "productId": "premium_monthly" }))
        .await
        .map_err(|e| e.to_string())?;
    info!(%info, "Product info");

    let span = tracing::info_span!("purchases");
    async {
        for (product_id, kind) in [("coins_100", "consumable"), ("remove_ads", "non_consumable")] {
            let receipt = bridge
                .invoke("purchase", json!({ "productId": product_id, "type": kind }))
                .await
                .map_err(|e| e.to_string())?;
            info!(%receipt, "Purchase answered");
        }
        Ok::<(), String>(())
    }
    .instrument(span)
    .await?;

    let restored = bridge
        .invoke("restorePurchases", json!({}))
        .await
        .map_err(|e| e.to_string())?;
    info!(%restored, "Restored purchases");

    drop(bridge);
    system.shutdown().await
}
