//! The in-app purchase controller and its components.

pub mod actor;
pub mod catalog;
pub mod correlator;
pub mod error;
pub mod restore;
pub mod session;
pub mod side_effects;

pub use actor::{BillingActor, BillingRequest, ControllerStatus};
pub use catalog::ProductCatalog;
pub use correlator::{PendingPurchase, PurchaseCorrelator, UpdateClass};
pub use error::*;
pub use session::{BillingSession, SessionState};
pub use side_effects::{SettlementReport, SideEffectProcessor, StepOutcome};

use crate::clients::BillingClient;
use crate::config::BillingConfig;
use crate::provider::BillingProvider;
use std::sync::Arc;

/// Creates a new billing actor and its client.
pub fn new(provider: Arc<dyn BillingProvider>, config: BillingConfig) -> (BillingActor, BillingClient) {
    BillingActor::new(provider, config)
}
