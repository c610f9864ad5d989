//! # Mock Provider & Testing Guide
//!
//! [`MockProvider`] implements [`BillingProvider`] entirely in memory. It behaves like a tiny
//! store: it serves a product catalog, tracks owned purchases, flips the acknowledged flag and
//! forgets consumed purchases. Every call is recorded so tests can assert on what the
//! controller asked for, and when.
//!
//! ## When to use what
//!
//! | Need | How |
//! |------|-----|
//! | Drive the purchase answer by hand | keep [`LaunchBehavior::Manual`], then [`MockProvider::emit_purchase`] |
//! | End-to-end flow without a test driver | [`MockProvider::with_launch_behavior`] with `Purchase` or `Cancel` |
//! | Inject failures | `fail_*` builders |
//! | Observe fire-and-forget side effects | [`MockProvider::wait_for_calls`] |
//! | Keep an acknowledgment in flight | [`MockProvider::hold_acknowledgements`] |
//!
//! ## Example
//!
//! ```rust
//! use iap_controller::provider::mock::{one_time_product, MockProvider};
//! use iap_controller::provider::{update_channel, BillingProvider};
//! use iap_controller::model::ProductType;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = MockProvider::new().with_product(one_time_product("coins_100", "Coins", 1_990_000));
//!     let (sink, _events) = update_channel();
//!     mock.connect(sink).await.unwrap();
//!
//!     let details = mock
//!         .query_product_details(ProductType::InApp, vec!["coins_100".to_string()])
//!         .await
//!         .unwrap();
//!     assert_eq!(details.len(), 1);
//!     assert_eq!(mock.catalog_queries(), 1);
//! }
//! ```

use super::{BillingProvider, BillingResult, LaunchParams, ProviderError, ResponseCode, UpdateSink};
use crate::model::{
    OneTimeOffer, PricingPhase, ProductDetails, ProductType, PurchaseRecord, PurchaseState,
    SubscriptionOffer,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// A recorded provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Connect,
    QueryProductDetails {
        product_type: ProductType,
        ids: Vec<String>,
    },
    LaunchPurchaseFlow(LaunchParams),
    AcknowledgePurchase(String),
    ConsumePurchase(String),
    QueryOwnedPurchases(ProductType),
}

/// What the mock does after a successful launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LaunchBehavior {
    /// Nothing; the test emits the update itself.
    #[default]
    Manual,
    /// Emits a settled purchase for the launched product.
    Purchase,
    /// Emits a purchase whose payment is still pending.
    PurchasePending,
    /// Emits a user cancellation.
    Cancel,
}

#[derive(Default)]
struct MockState {
    catalog: Vec<ProductDetails>,
    owned: Vec<(ProductType, PurchaseRecord)>,
    connect_error: Option<ProviderError>,
    query_errors: HashMap<ProductType, ProviderError>,
    owned_errors: HashMap<ProductType, ProviderError>,
    launch_error: Option<ProviderError>,
    ack_error: Option<ProviderError>,
    consume_error: Option<ProviderError>,
    launch_behavior: LaunchBehavior,
    query_delay: Duration,
    next_order: u32,
}

/// In-memory [`BillingProvider`] with call recording.
pub struct MockProvider {
    state: Mutex<MockState>,
    sink: Mutex<Option<UpdateSink>>,
    calls: watch::Sender<Vec<ProviderCall>>,
    ack_hold: watch::Sender<bool>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        let (calls, _) = watch::channel(Vec::new());
        let (ack_hold, _) = watch::channel(false);
        Self {
            state: Mutex::new(MockState {
                next_order: 1,
                ..MockState::default()
            }),
            sink: Mutex::new(None),
            calls,
            ack_hold,
        }
    }

    // --- Builders ---

    pub fn with_product(self, details: ProductDetails) -> Self {
        self.state.lock().unwrap().catalog.push(details);
        self
    }

    pub fn with_owned_purchase(self, product_type: ProductType, record: PurchaseRecord) -> Self {
        self.state.lock().unwrap().owned.push((product_type, record));
        self
    }

    pub fn with_launch_behavior(self, behavior: LaunchBehavior) -> Self {
        self.state.lock().unwrap().launch_behavior = behavior;
        self
    }

    /// Every catalog and ownership query sleeps this long before answering.
    pub fn with_query_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().query_delay = delay;
        self
    }

    pub fn fail_connect(self, error: ProviderError) -> Self {
        self.state.lock().unwrap().connect_error = Some(error);
        self
    }

    pub fn fail_product_query(self, product_type: ProductType, error: ProviderError) -> Self {
        self.state.lock().unwrap().query_errors.insert(product_type, error);
        self
    }

    pub fn fail_owned_query(self, product_type: ProductType, error: ProviderError) -> Self {
        self.state.lock().unwrap().owned_errors.insert(product_type, error);
        self
    }

    pub fn fail_launch(self, error: ProviderError) -> Self {
        self.state.lock().unwrap().launch_error = Some(error);
        self
    }

    pub fn fail_acknowledge(self, error: ProviderError) -> Self {
        self.state.lock().unwrap().ack_error = Some(error);
        self
    }

    pub fn fail_consume(self, error: ProviderError) -> Self {
        self.state.lock().unwrap().consume_error = Some(error);
        self
    }

    // --- Runtime controls ---

    /// Acknowledgments wait until [`release_acknowledgements`](Self::release_acknowledgements).
    pub fn hold_acknowledgements(&self) {
        self.ack_hold.send_replace(true);
    }

    pub fn release_acknowledgements(&self) {
        self.ack_hold.send_replace(false);
    }

    /// Runs `push` against the sink registered at connect. `false` if not connected.
    fn with_sink(&self, push: impl FnOnce(&UpdateSink) -> bool) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => push(sink),
            None => false,
        }
    }

    pub fn emit_purchase(&self, record: PurchaseRecord) -> bool {
        self.with_sink(|sink| sink.purchases_updated(BillingResult::ok(), vec![record]))
    }

    pub fn emit_cancelled(&self) -> bool {
        self.with_sink(|sink| {
            sink.purchases_updated(
                BillingResult::new(ResponseCode::UserCanceled, "User canceled"),
                vec![],
            )
        })
    }

    pub fn emit_failure(&self, code: ResponseCode, message: &str) -> bool {
        self.with_sink(|sink| sink.purchases_updated(BillingResult::new(code, message), vec![]))
    }

    pub fn emit_disconnected(&self) -> bool {
        self.with_sink(|sink| sink.disconnected())
    }

    // --- Inspection ---

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&ProviderCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|&call| predicate(call)).count()
    }

    pub fn catalog_queries(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::QueryProductDetails { .. }))
    }

    pub fn launches(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::LaunchPurchaseFlow(_)))
    }

    pub fn acknowledged_tokens(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                ProviderCall::AcknowledgePurchase(token) => Some(token.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn consumed_tokens(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                ProviderCall::ConsumePurchase(token) => Some(token.clone()),
                _ => None,
            })
            .collect()
    }

    /// Resolves once the recorded calls satisfy `predicate`.
    pub async fn wait_for_calls(&self, predicate: impl Fn(&[ProviderCall]) -> bool) {
        let mut receiver = self.calls.subscribe();
        let _ = receiver.wait_for(|calls| predicate(calls.as_slice())).await;
    }

    async fn query_delay(&self) {
        let delay = self.state.lock().unwrap().query_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn record(&self, call: ProviderCall) {
        self.calls.send_modify(|calls| calls.push(call));
    }

    fn simulate_purchase(&self, params: &LaunchParams, state: PurchaseState) -> PurchaseRecord {
        let mut guard = self.state.lock().unwrap();
        let order = guard.next_order;
        guard.next_order += 1;

        let product_type = guard
            .catalog
            .iter()
            .find(|details| details.product_id == params.product_id)
            .map(|details| details.product_type)
            .unwrap_or(ProductType::InApp);
        let mut record = purchase_record(&params.product_id, &format!("token_{order}"), state);
        record.order_id = format!("GPA.{order:04}");
        guard.owned.push((product_type, record.clone()));
        record
    }
}

#[async_trait]
impl BillingProvider for MockProvider {
    async fn connect(&self, sink: UpdateSink) -> Result<(), ProviderError> {
        self.record(ProviderCall::Connect);
        if let Some(error) = self.state.lock().unwrap().connect_error.clone() {
            return Err(error);
        }
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    async fn query_product_details(
        &self,
        product_type: ProductType,
        ids: Vec<String>,
    ) -> Result<Vec<ProductDetails>, ProviderError> {
        self.record(ProviderCall::QueryProductDetails {
            product_type,
            ids: ids.clone(),
        });

        self.query_delay().await;

        let state = self.state.lock().unwrap();
        if let Some(error) = state.query_errors.get(&product_type) {
            return Err(error.clone());
        }
        Ok(state
            .catalog
            .iter()
            .filter(|details| details.product_type == product_type)
            .filter(|details| ids.contains(&details.product_id))
            .cloned()
            .collect())
    }

    async fn launch_purchase_flow(&self, params: LaunchParams) -> Result<(), ProviderError> {
        self.record(ProviderCall::LaunchPurchaseFlow(params.clone()));

        let (error, behavior) = {
            let state = self.state.lock().unwrap();
            (state.launch_error.clone(), state.launch_behavior)
        };
        if let Some(error) = error {
            return Err(error);
        }

        match behavior {
            LaunchBehavior::Manual => {}
            LaunchBehavior::Purchase => {
                let record = self.simulate_purchase(&params, PurchaseState::Purchased);
                self.emit_purchase(record);
            }
            LaunchBehavior::PurchasePending => {
                let record = self.simulate_purchase(&params, PurchaseState::Pending);
                self.emit_purchase(record);
            }
            LaunchBehavior::Cancel => {
                self.emit_cancelled();
            }
        }
        Ok(())
    }

    async fn acknowledge_purchase(&self, purchase_token: &str) -> Result<(), ProviderError> {
        self.record(ProviderCall::AcknowledgePurchase(purchase_token.to_string()));

        let mut hold = self.ack_hold.subscribe();
        let _ = hold.wait_for(|held| !*held).await;

        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.ack_error.clone() {
            return Err(error);
        }
        for (_, record) in state.owned.iter_mut() {
            if record.purchase_token == purchase_token {
                record.acknowledged = true;
            }
        }
        Ok(())
    }

    async fn consume_purchase(&self, purchase_token: &str) -> Result<(), ProviderError> {
        self.record(ProviderCall::ConsumePurchase(purchase_token.to_string()));

        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.consume_error.clone() {
            return Err(error);
        }
        state
            .owned
            .retain(|(_, record)| record.purchase_token != purchase_token);
        Ok(())
    }

    async fn query_owned_purchases(
        &self,
        product_type: ProductType,
    ) -> Result<Vec<PurchaseRecord>, ProviderError> {
        self.record(ProviderCall::QueryOwnedPurchases(product_type));
        self.query_delay().await;

        let state = self.state.lock().unwrap();
        if let Some(error) = state.owned_errors.get(&product_type) {
            return Err(error.clone());
        }
        Ok(state
            .owned
            .iter()
            .filter(|(owned_type, _)| *owned_type == product_type)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

/// One-time product priced in USD.
pub fn one_time_product(id: &str, title: &str, price_micros: i64) -> ProductDetails {
    ProductDetails {
        product_id: id.to_string(),
        product_type: ProductType::InApp,
        title: title.to_string(),
        description: format!("{title} (one-time)"),
        one_time_offer: Some(OneTimeOffer {
            formatted_price: format_usd(price_micros),
            price_amount_micros: price_micros,
            price_currency_code: "USD".to_string(),
        }),
        subscription_offers: vec![],
    }
}

/// Subscription with a single offer and a single pricing phase.
pub fn subscription_product(
    id: &str,
    title: &str,
    price_micros: i64,
    offer_token: &str,
) -> ProductDetails {
    ProductDetails {
        product_id: id.to_string(),
        product_type: ProductType::Subs,
        title: title.to_string(),
        description: format!("{title} (subscription)"),
        one_time_offer: None,
        subscription_offers: vec![SubscriptionOffer {
            offer_token: offer_token.to_string(),
            pricing_phases: vec![PricingPhase {
                formatted_price: format_usd(price_micros),
                price_amount_micros: price_micros,
                price_currency_code: "USD".to_string(),
            }],
        }],
    }
}

/// Unacknowledged purchase record for `product_id`.
pub fn purchase_record(product_id: &str, token: &str, state: PurchaseState) -> PurchaseRecord {
    PurchaseRecord {
        product_ids: vec![product_id.to_string()],
        purchase_token: token.to_string(),
        order_id: format!("GPA.{token}"),
        state,
        acknowledged: false,
        original_json: format!(r#"{{"productId":"{product_id}","purchaseToken":"{token}"}}"#),
        signature: format!("sig_{token}"),
        purchase_time: 1_700_000_000_000,
    }
}

fn format_usd(micros: i64) -> String {
    format!("${:.2}", crate::model::micros_to_decimal(micros))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{update_channel, ProviderEvent};

    #[tokio::test]
    async fn test_mock_filters_catalog_by_type_and_id() {
        let mock = MockProvider::new()
            .with_product(one_time_product("coins_100", "Coins", 1_990_000))
            .with_product(subscription_product("premium", "Premium", 4_990_000, "offer_1"));

        let details = mock
            .query_product_details(
                ProductType::InApp,
                vec!["coins_100".to_string(), "premium".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].product_id, "coins_100");
        assert_eq!(mock.catalog_queries(), 1);
    }

    #[tokio::test]
    async fn test_auto_purchase_tracks_ownership() {
        let mock = MockProvider::new()
            .with_product(subscription_product("premium", "Premium", 4_990_000, "offer_1"))
            .with_launch_behavior(LaunchBehavior::Purchase);
        let (sink, mut events) = update_channel();
        mock.connect(sink).await.unwrap();

        mock.launch_purchase_flow(LaunchParams {
            product_id: "premium".to_string(),
            offer_token: Some("offer_1".to_string()),
        })
        .await
        .unwrap();

        match events.recv().await {
            Some(ProviderEvent::PurchasesUpdated { result, purchases }) => {
                assert!(result.is_ok());
                assert_eq!(purchases[0].purchase_token, "token_1");
            }
            other => panic!("Unexpected event: {:?}", other),
        }

        mock.acknowledge_purchase("token_1").await.unwrap();
        let owned = mock.query_owned_purchases(ProductType::Subs).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert!(owned[0].acknowledged);

        mock.consume_purchase("token_1").await.unwrap();
        assert!(mock.query_owned_purchases(ProductType::Subs).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_emit_without_connection_is_rejected() {
        let mock = MockProvider::new();
        assert!(!mock.emit_cancelled());
    }

    #[tokio::test]
    async fn test_emitters_push_through_the_sink() {
        let mock = MockProvider::new();
        let (sink, mut events) = update_channel();
        mock.connect(sink).await.unwrap();

        assert!(mock.emit_failure(ResponseCode::ItemUnavailable, "Item unavailable"));
        assert!(mock.emit_disconnected());
        assert_eq!(
            events.recv().await,
            Some(ProviderEvent::PurchasesUpdated {
                result: BillingResult::new(ResponseCode::ItemUnavailable, "Item unavailable"),
                purchases: vec![],
            })
        );
        assert_eq!(events.recv().await, Some(ProviderEvent::ServiceDisconnected));

        drop(events);
        assert!(!mock.emit_disconnected());
    }
}
