//! # Billing Actor
//!
//! The server half of the controller. One task owns the session, the catalog and the purchase
//! slot, and multiplexes three inputs:
//!
//! - caller requests from [`BillingClient`]s,
//! - provider events pushed through the [`UpdateSink`](crate::provider::UpdateSink),
//! - the deadline of the pending purchase.
//!
//! Provider calls that may take long (connect, catalog queries, restore, launch) never run on
//! the actor task itself. They are spawned on a [`JoinSet`] and their replies are applied when
//! they complete, so the deadline and provider events keep being serviced in the meantime.
//!
//! Settlement tasks (acknowledge, consume) run on a second [`JoinSet`] and are drained before
//! the actor exits, for at most the configured shutdown timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::catalog::ProductCatalog;
use super::correlator::{PendingPurchase, PurchaseCorrelator, UpdateClass};
use super::restore::restore;
use super::session::{BillingSession, SessionState};
use super::side_effects::{DeferredReply, SettlementReport, SideEffectProcessor};
use super::BillingError;
use crate::clients::BillingClient;
use crate::config::{BillingConfig, SettlementPolicy, MAX_TIMEOUT_SECS};
use crate::framework::Response;
use crate::model::{
    ProductInfo, ProductKind, ProductRequest, PurchaseOutcome, PurchaseRecord, Receipt,
    RestoredPurchase,
};
use crate::provider::{
    update_channel, BillingProvider, BillingResult, LaunchParams, ProviderError, ProviderEvent,
};

/// Messages understood by the [`BillingActor`].
#[derive(Debug)]
pub enum BillingRequest {
    Initialize {
        products: Vec<ProductRequest>,
        respond_to: Response<usize, BillingError>,
    },
    Purchase {
        product_id: String,
        /// Requested kind; `None` falls back to the kind recorded in the catalog.
        kind: Option<ProductKind>,
        respond_to: Response<PurchaseOutcome, BillingError>,
    },
    Restore {
        respond_to: Response<Vec<RestoredPurchase>, BillingError>,
    },
    ProductInfo {
        product_id: String,
        respond_to: Response<ProductInfo, BillingError>,
    },
    Status {
        respond_to: Response<ControllerStatus, BillingError>,
    },
}

/// Snapshot of the controller state.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerStatus {
    pub session: SessionState,
    pub awaiting_purchase: bool,
    pub product_count: usize,
}

/// Completion of a provider call spawned by the actor.
enum ProviderReply {
    Connected {
        result: Result<(), ProviderError>,
        products: Vec<ProductRequest>,
        respond_to: Response<usize, BillingError>,
    },
    CatalogLoaded {
        catalog: ProductCatalog,
        respond_to: Response<usize, BillingError>,
    },
    Restored {
        purchases: Vec<RestoredPurchase>,
        respond_to: Response<Vec<RestoredPurchase>, BillingError>,
    },
    Launched {
        attempt: u64,
        result: Result<(), ProviderError>,
    },
}

pub struct BillingActor {
    receiver: mpsc::Receiver<BillingRequest>,
    events: mpsc::UnboundedReceiver<ProviderEvent>,
    session: BillingSession,
    catalog: ProductCatalog,
    correlator: PurchaseCorrelator,
    side_effects: SideEffectProcessor,
    provider_calls: JoinSet<ProviderReply>,
    settlements: JoinSet<SettlementReport>,
    config: BillingConfig,
}

impl BillingActor {
    pub fn new(provider: Arc<dyn BillingProvider>, config: BillingConfig) -> (Self, BillingClient) {
        let (sender, receiver) = mpsc::channel(config.request_buffer.max(1));
        let (sink, events) = update_channel();
        let actor = Self {
            receiver,
            events,
            session: BillingSession::new(provider.clone(), sink),
            catalog: ProductCatalog::default(),
            correlator: PurchaseCorrelator::default(),
            side_effects: SideEffectProcessor::new(provider),
            provider_calls: JoinSet::new(),
            settlements: JoinSet::new(),
            config,
        };
        (actor, BillingClient::new(sender))
    }

    /// Runs the event loop until every client is dropped.
    pub async fn run(mut self) {
        info!(entity_type = "Billing", "Actor started");

        loop {
            let deadline = self.correlator.deadline();
            // Provider events first: a request never overtakes an update that is already queued.
            tokio::select! {
                biased;
                Some(event) = self.events.recv() => self.handle_event(event),
                _ = wait_until(deadline), if deadline.is_some() => self.expire_pending(),
                Some(joined) = self.provider_calls.join_next(), if !self.provider_calls.is_empty() => {
                    self.on_provider_reply(joined);
                }
                Some(joined) = self.settlements.join_next(), if !self.settlements.is_empty() => {
                    log_settlement(joined);
                }
                request = self.receiver.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
            }
        }

        // Callers hold a client while they wait, so no in-flight call has a listener left.
        self.provider_calls.shutdown().await;
        self.drain_settlements().await;
        if let Some(pending) = self.correlator.take() {
            warn!(attempt = pending.attempt, product_id = %pending.product_id, "Dropping pending purchase on shutdown");
            pending.resolve(Err(BillingError::ActorCommunicationError(
                "Billing actor shut down".to_string(),
            )));
        }
        info!(entity_type = "Billing", product_count = self.catalog.len(), "Shutdown");
    }

    fn handle_request(&mut self, request: BillingRequest) {
        match request {
            BillingRequest::Initialize { products, respond_to } => {
                debug!(?products, "Initialize");
                match self.session.begin_connect() {
                    Some((provider, sink)) => {
                        self.provider_calls.spawn(async move {
                            let result = provider.connect(sink).await;
                            ProviderReply::Connected {
                                result,
                                products,
                                respond_to,
                            }
                        });
                    }
                    None => self.load_catalog(products, respond_to),
                }
            }
            BillingRequest::Purchase {
                product_id,
                kind,
                respond_to,
            } => {
                debug!(%product_id, ?kind, "Purchase");
                self.start_purchase(product_id, kind, respond_to);
            }
            BillingRequest::Restore { respond_to } => {
                debug!("Restore");
                match self.session.provider() {
                    Ok(provider) => {
                        let provider = provider.clone();
                        self.provider_calls.spawn(async move {
                            let purchases = restore(&provider).await;
                            ProviderReply::Restored {
                                purchases,
                                respond_to,
                            }
                        });
                    }
                    Err(e) => {
                        let _ = respond_to.send(Err(e));
                    }
                }
            }
            BillingRequest::ProductInfo {
                product_id,
                respond_to,
            } => {
                let result = self.product_info(&product_id);
                debug!(%product_id, found = result.is_ok(), "ProductInfo");
                let _ = respond_to.send(result);
            }
            BillingRequest::Status { respond_to } => {
                let _ = respond_to.send(Ok(ControllerStatus {
                    session: self.session.state(),
                    awaiting_purchase: self.correlator.is_awaiting(),
                    product_count: self.catalog.len(),
                }));
            }
        }
    }

    /// Spawns the catalog load. The current catalog stays in place until the new one is ready.
    fn load_catalog(
        &mut self,
        products: Vec<ProductRequest>,
        respond_to: Response<usize, BillingError>,
    ) {
        let provider = match self.session.provider() {
            Ok(provider) => provider.clone(),
            Err(e) => {
                let _ = respond_to.send(Err(e));
                return;
            }
        };
        self.provider_calls.spawn(async move {
            let catalog = ProductCatalog::load(provider, &products).await;
            ProviderReply::CatalogLoaded {
                catalog,
                respond_to,
            }
        });
    }

    fn on_provider_reply(&mut self, joined: Result<ProviderReply, JoinError>) {
        let reply = match joined {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Provider call task failed");
                return;
            }
        };

        match reply {
            ProviderReply::Connected {
                result,
                products,
                respond_to,
            } => match self.session.finish_connect(result) {
                Ok(()) => self.load_catalog(products, respond_to),
                Err(e) => {
                    let _ = respond_to.send(Err(e));
                }
            },
            ProviderReply::CatalogLoaded {
                catalog,
                respond_to,
            } => {
                self.catalog = catalog;
                info!(product_count = self.catalog.len(), "Initialized");
                let _ = respond_to.send(Ok(self.catalog.len()));
            }
            ProviderReply::Restored {
                purchases,
                respond_to,
            } => {
                let _ = respond_to.send(Ok(purchases));
            }
            ProviderReply::Launched { attempt, result } => match result {
                Ok(()) => debug!(attempt, "Purchase flow launched"),
                Err(e) => {
                    warn!(attempt, code = %e.code, error = %e.message, "Launch failed");
                    // Already answered if the attempt timed out in the meantime.
                    if let Some(pending) = self.correlator.take_attempt(attempt) {
                        pending.resolve(Err(BillingError::LaunchFailed(e.message)));
                    }
                }
            },
        }
    }

    fn product_info(&self, product_id: &str) -> Result<ProductInfo, BillingError> {
        self.session.provider()?;
        self.catalog
            .get(product_id)
            .map(ProductInfo::from)
            .ok_or_else(|| BillingError::ProductNotFound(product_id.to_string()))
    }

    fn start_purchase(
        &mut self,
        product_id: String,
        kind: Option<ProductKind>,
        respond_to: Response<PurchaseOutcome, BillingError>,
    ) {
        let provider = match self.session.provider() {
            Ok(provider) => provider.clone(),
            Err(e) => {
                let _ = respond_to.send(Err(e));
                return;
            }
        };
        let Some(product) = self.catalog.get(&product_id) else {
            warn!(%product_id, "Product not found");
            let _ = respond_to.send(Err(BillingError::ProductNotFound(product_id)));
            return;
        };

        let consume_after_purchase = kind.unwrap_or(product.kind) == ProductKind::Consumable;
        let params = LaunchParams {
            product_id: product.id.clone(),
            offer_token: product.offer_token.clone(),
        };
        let pending = PendingPurchase {
            attempt: self.correlator.next_attempt(),
            product_id,
            consume_after_purchase,
            respond_to,
            deadline: deadline_after(self.config.purchase_timeout()),
        };

        let attempt = match self.correlator.claim(pending) {
            Ok(attempt) => attempt,
            Err(rejected) => {
                warn!(product_id = %rejected.product_id, "Purchase already in progress");
                rejected.resolve(Err(BillingError::AlreadyInProgress));
                return;
            }
        };

        info!(attempt, product_id = %params.product_id, consume_after_purchase, "Launching purchase flow");
        self.provider_calls.spawn(async move {
            let result = provider.launch_purchase_flow(params).await;
            ProviderReply::Launched { attempt, result }
        });
    }

    fn handle_event(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::ServiceDisconnected => self.session.on_disconnected(),
            ProviderEvent::PurchasesUpdated { result, purchases } => {
                self.on_purchases_updated(result, purchases)
            }
        }
    }

    fn on_purchases_updated(&mut self, result: BillingResult, purchases: Vec<PurchaseRecord>) {
        let Some(pending) = self.correlator.take() else {
            debug!(code = %result.code, count = purchases.len(), "Purchase update without pending request");
            return;
        };
        let attempt = pending.attempt;

        match PurchaseCorrelator::classify(&result, purchases) {
            UpdateClass::Cancelled => {
                info!(attempt, product_id = %pending.product_id, "Purchase cancelled");
                pending.resolve(Ok(PurchaseOutcome::Cancelled));
            }
            UpdateClass::Pending(record) => {
                let product_id = record
                    .primary_product_id()
                    .unwrap_or(&pending.product_id)
                    .to_string();
                info!(attempt, %product_id, "Purchase pending");
                pending.resolve(Ok(PurchaseOutcome::Pending { product_id }));
            }
            UpdateClass::Failed(message) => {
                warn!(attempt, code = %result.code, error = %message, "Purchase failed");
                pending.resolve(Err(BillingError::PurchaseFailed(message)));
            }
            UpdateClass::Purchased(record) => {
                info!(attempt, product_id = %pending.product_id, order_id = %record.order_id, "Purchase completed");
                let outcome = PurchaseOutcome::Completed(Receipt::from_record(&record, &pending.product_id));
                let consume = pending.consume_after_purchase;
                let deferred = match self.config.settlement {
                    SettlementPolicy::Detached => {
                        pending.resolve(Ok(outcome));
                        None
                    }
                    SettlementPolicy::AwaitAcknowledgement => Some(DeferredReply { pending, outcome }),
                };
                self.settlements
                    .spawn(self.side_effects.clone().settle(record, consume, deferred));
            }
        }
    }

    fn expire_pending(&mut self) {
        if let Some(pending) = self.correlator.take() {
            warn!(attempt = pending.attempt, product_id = %pending.product_id, "Purchase timed out");
            pending.resolve(Err(BillingError::PurchaseTimedOut));
        }
    }

    /// Waits for running settlements, aborting whatever is left once the shutdown timeout
    /// elapses.
    async fn drain_settlements(&mut self) {
        let deadline = deadline_after(self.config.shutdown_timeout());
        let settlements = &mut self.settlements;
        let drained = tokio::time::timeout_at(deadline, async {
            while let Some(joined) = settlements.join_next().await {
                log_settlement(joined);
            }
        })
        .await;

        if drained.is_err() {
            warn!(running = self.settlements.len(), "Settlements still running at shutdown, aborting");
            self.settlements.shutdown().await;
        }
    }
}

/// `now + timeout`, capped so that no configured value can overflow the clock.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(MAX_TIMEOUT_SECS))
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn log_settlement(joined: Result<SettlementReport, JoinError>) {
    match joined {
        Ok(report) => info!(
            purchase_token = %report.purchase_token,
            acknowledgement = ?report.acknowledgement,
            consumption = ?report.consumption,
            "Settlement finished"
        ),
        Err(e) => warn!(error = %e, "Settlement task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_is_capped() {
        let now = Instant::now();
        let capped = deadline_after(Duration::from_secs(u64::MAX));
        assert!(capped >= now + Duration::from_secs(MAX_TIMEOUT_SECS));

        let regular = deadline_after(Duration::from_secs(60));
        assert!(regular < capped);
    }
}
