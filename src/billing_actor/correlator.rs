//! Single-slot correlation between a purchase request and the provider update answering it.

use tokio::time::Instant;

use super::BillingError;
use crate::framework::Response;
use crate::model::{PurchaseOutcome, PurchaseRecord, PurchaseState};
use crate::provider::{BillingResult, ResponseCode};

/// The purchase currently waiting for the provider.
#[derive(Debug)]
pub struct PendingPurchase {
    pub attempt: u64,
    pub product_id: String,
    pub consume_after_purchase: bool,
    pub respond_to: Response<PurchaseOutcome, BillingError>,
    pub deadline: Instant,
}

impl PendingPurchase {
    pub fn resolve(self, result: Result<PurchaseOutcome, BillingError>) {
        let _ = self.respond_to.send(result);
    }
}

/// How a provider update answers the pending purchase.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateClass {
    Cancelled,
    Purchased(PurchaseRecord),
    Pending(PurchaseRecord),
    Failed(String),
}

/// Holds zero or one [`PendingPurchase`].
///
/// Owned by the actor task, so `take` is the atomic take-and-clear: whichever path takes the
/// slot first (launch failure, provider update, deadline) is the only one that answers.
#[derive(Debug, Default)]
pub struct PurchaseCorrelator {
    slot: Option<PendingPurchase>,
    next_attempt: u64,
}

impl PurchaseCorrelator {
    pub fn next_attempt(&mut self) -> u64 {
        self.next_attempt += 1;
        self.next_attempt
    }

    /// Occupies the slot. Hands the request back if another purchase is in flight.
    pub fn claim(&mut self, pending: PendingPurchase) -> Result<u64, PendingPurchase> {
        if self.slot.is_some() {
            return Err(pending);
        }
        let attempt = pending.attempt;
        self.slot = Some(pending);
        Ok(attempt)
    }

    pub fn is_awaiting(&self) -> bool {
        self.slot.is_some()
    }

    pub fn take(&mut self) -> Option<PendingPurchase> {
        self.slot.take()
    }

    /// Takes the slot only if it still belongs to `attempt`.
    pub fn take_attempt(&mut self, attempt: u64) -> Option<PendingPurchase> {
        match &self.slot {
            Some(pending) if pending.attempt == attempt => self.slot.take(),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.slot.as_ref().map(|pending| pending.deadline)
    }

    /// Classifies a purchase update. Only the first reported purchase is considered.
    pub fn classify(result: &BillingResult, purchases: Vec<PurchaseRecord>) -> UpdateClass {
        if result.code == ResponseCode::UserCanceled {
            return UpdateClass::Cancelled;
        }
        if result.is_ok() {
            if let Some(first) = purchases.into_iter().next() {
                return match first.state {
                    PurchaseState::Purchased => UpdateClass::Purchased(first),
                    PurchaseState::Pending => UpdateClass::Pending(first),
                    PurchaseState::Cancelled => UpdateClass::Cancelled,
                };
            }
        }
        let message = if result.debug_message.is_empty() {
            format!("Provider reported {}", result.code)
        } else {
            result.debug_message.clone()
        };
        UpdateClass::Failed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::purchase_record;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn pending(attempt: u64) -> (PendingPurchase, oneshot::Receiver<Result<PurchaseOutcome, BillingError>>) {
        let (respond_to, response) = oneshot::channel();
        let pending = PendingPurchase {
            attempt,
            product_id: "coins_100".to_string(),
            consume_after_purchase: true,
            respond_to,
            deadline: Instant::now() + Duration::from_secs(60),
        };
        (pending, response)
    }

    #[tokio::test]
    async fn test_second_claim_is_rejected() {
        let mut correlator = PurchaseCorrelator::default();
        let (first, _first_rx) = pending(correlator.next_attempt());
        let (second, _second_rx) = pending(correlator.next_attempt());

        assert!(matches!(correlator.claim(first), Ok(1)));
        let rejected = correlator.claim(second).unwrap_err();
        assert_eq!(rejected.attempt, 2);
        assert_eq!(correlator.take().map(|p| p.attempt), Some(1));
        assert!(!correlator.is_awaiting());
    }

    #[tokio::test]
    async fn test_take_attempt_ignores_stale_ids() {
        let mut correlator = PurchaseCorrelator::default();
        let (first, _rx) = pending(correlator.next_attempt());
        correlator.claim(first).unwrap();

        assert!(correlator.take_attempt(7).is_none());
        assert!(correlator.is_awaiting());
        assert!(correlator.take_attempt(1).is_some());
        assert!(correlator.deadline().is_none());
    }

    #[tokio::test]
    async fn test_resolve_reaches_caller() {
        let (pending, response) = pending(1);
        pending.resolve(Ok(PurchaseOutcome::Cancelled));
        assert_eq!(response.await.unwrap(), Ok(PurchaseOutcome::Cancelled));
    }

    #[test]
    fn test_classify() {
        let purchased = purchase_record("coins_100", "tok", PurchaseState::Purchased);
        let deferred = purchase_record("coins_100", "tok", PurchaseState::Pending);

        assert_eq!(
            PurchaseCorrelator::classify(&BillingResult::ok(), vec![purchased.clone()]),
            UpdateClass::Purchased(purchased)
        );
        assert_eq!(
            PurchaseCorrelator::classify(&BillingResult::ok(), vec![deferred.clone()]),
            UpdateClass::Pending(deferred)
        );
        assert_eq!(
            PurchaseCorrelator::classify(
                &BillingResult::new(ResponseCode::UserCanceled, "canceled"),
                vec![]
            ),
            UpdateClass::Cancelled
        );
        assert_eq!(
            PurchaseCorrelator::classify(&BillingResult::ok(), vec![]),
            UpdateClass::Failed("Provider reported OK".to_string())
        );
        assert_eq!(
            PurchaseCorrelator::classify(
                &BillingResult::new(ResponseCode::ItemAlreadyOwned, "Item already owned"),
                vec![]
            ),
            UpdateClass::Failed("Item already owned".to_string())
        );
    }
}
