//! Acknowledgment and consumption of a settled purchase.

use std::sync::Arc;

use tracing::{info, warn};

use super::correlator::PendingPurchase;
use crate::model::{PurchaseOutcome, PurchaseRecord};
use crate::provider::BillingProvider;

/// Result of one settlement step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Skipped,
    Succeeded,
    Failed(String),
}

/// What happened to a purchase after it was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    pub purchase_token: String,
    pub acknowledgement: StepOutcome,
    pub consumption: StepOutcome,
}

/// A caller reply held back until the acknowledgment attempt has finished.
#[derive(Debug)]
pub struct DeferredReply {
    pub pending: PendingPurchase,
    pub outcome: PurchaseOutcome,
}

/// Applies acknowledgment and, for consumables, consumption. Nothing is retried.
#[derive(Clone)]
pub struct SideEffectProcessor {
    provider: Arc<dyn BillingProvider>,
}

impl SideEffectProcessor {
    pub fn new(provider: Arc<dyn BillingProvider>) -> Self {
        Self { provider }
    }

    /// Acknowledges then consumes, in that order, for the same token.
    ///
    /// A `deferred` reply is sent right after the acknowledgment attempt, whatever its result.
    pub async fn settle(
        self,
        purchase: PurchaseRecord,
        consume: bool,
        deferred: Option<DeferredReply>,
    ) -> SettlementReport {
        let token = purchase.purchase_token.clone();

        let acknowledgement = if purchase.needs_acknowledgement() {
            match self.provider.acknowledge_purchase(&token).await {
                Ok(()) => {
                    info!(purchase_token = %token, "Purchase acknowledged");
                    StepOutcome::Succeeded
                }
                Err(e) => {
                    warn!(purchase_token = %token, code = %e.code, error = %e.message, "Acknowledge failed");
                    StepOutcome::Failed(e.message)
                }
            }
        } else {
            StepOutcome::Skipped
        };

        if let Some(reply) = deferred {
            reply.pending.resolve(Ok(reply.outcome));
        }

        let consumption = if consume && purchase.is_purchased() {
            match self.provider.consume_purchase(&token).await {
                Ok(()) => {
                    info!(purchase_token = %token, "Purchase consumed");
                    StepOutcome::Succeeded
                }
                Err(e) => {
                    warn!(purchase_token = %token, code = %e.code, error = %e.message, "Consume failed");
                    StepOutcome::Failed(e.message)
                }
            }
        } else {
            StepOutcome::Skipped
        };

        SettlementReport {
            purchase_token: token,
            acknowledgement,
            consumption,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PurchaseState;
    use crate::provider::mock::{purchase_record, MockProvider, ProviderCall};
    use crate::provider::{ProviderError, ResponseCode};

    #[tokio::test]
    async fn test_acknowledge_before_consume() {
        let mock = Arc::new(MockProvider::new());
        let processor = SideEffectProcessor::new(mock.clone());

        let report = processor
            .settle(purchase_record("coins_100", "tok_1", PurchaseState::Purchased), true, None)
            .await;

        assert_eq!(report.acknowledgement, StepOutcome::Succeeded);
        assert_eq!(report.consumption, StepOutcome::Succeeded);
        assert_eq!(
            mock.calls(),
            vec![
                ProviderCall::AcknowledgePurchase("tok_1".to_string()),
                ProviderCall::ConsumePurchase("tok_1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_already_acknowledged_non_consumable() {
        let mock = Arc::new(MockProvider::new());
        let mut purchase = purchase_record("premium", "tok_2", PurchaseState::Purchased);
        purchase.acknowledged = true;

        let report = SideEffectProcessor::new(mock.clone())
            .settle(purchase, false, None)
            .await;

        assert_eq!(report.acknowledgement, StepOutcome::Skipped);
        assert_eq!(report.consumption, StepOutcome::Skipped);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_acknowledgement_still_consumes() {
        let mock = Arc::new(MockProvider::new().fail_acknowledge(ProviderError::new(
            ResponseCode::NetworkError,
            "Network error",
        )));

        let report = SideEffectProcessor::new(mock.clone())
            .settle(purchase_record("coins_100", "tok_3", PurchaseState::Purchased), true, None)
            .await;

        assert_eq!(report.acknowledgement, StepOutcome::Failed("Network error".to_string()));
        assert_eq!(report.consumption, StepOutcome::Succeeded);
        assert_eq!(mock.acknowledged_tokens(), vec!["tok_3".to_string()]);
    }

    #[tokio::test]
    async fn test_pending_purchase_is_left_alone() {
        let mock = Arc::new(MockProvider::new());

        let report = SideEffectProcessor::new(mock.clone())
            .settle(purchase_record("coins_100", "tok_4", PurchaseState::Pending), true, None)
            .await;

        assert_eq!(report.acknowledgement, StepOutcome::Skipped);
        assert_eq!(report.consumption, StepOutcome::Skipped);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_consumption_is_reported() {
        let mock = Arc::new(MockProvider::new().fail_consume(ProviderError::new(
            ResponseCode::ItemNotOwned,
            "Item not owned",
        )));

        let report = SideEffectProcessor::new(mock)
            .settle(purchase_record("coins_100", "tok_5", PurchaseState::Purchased), true, None)
            .await;

        assert_eq!(report.acknowledgement, StepOutcome::Succeeded);
        assert_eq!(report.consumption, StepOutcome::Failed("Item not owned".to_string()));
    }
}
