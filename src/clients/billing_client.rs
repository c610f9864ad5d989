use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::billing_actor::{BillingError, BillingRequest, ControllerStatus};
use crate::framework::call;
use crate::model::{ProductInfo, ProductKind, ProductRequest, PurchaseOutcome, RestoredPurchase};

/// Client for interacting with the billing actor.
///
/// Cheap to clone; every clone talks to the same actor. The actor stops once all clones are
/// dropped.
#[derive(Clone)]
pub struct BillingClient {
    sender: mpsc::Sender<BillingRequest>,
}

impl BillingClient {
    pub fn new(sender: mpsc::Sender<BillingRequest>) -> Self {
        Self { sender }
    }

    /// Connects (if needed) and loads the catalog. Returns the number of products found.
    #[instrument(skip(self, products), fields(requested = products.len()))]
    pub async fn initialize(&self, products: Vec<ProductRequest>) -> Result<usize, BillingError> {
        debug!("Sending request");
        call(&self.sender, |respond_to| BillingRequest::Initialize {
            products,
            respond_to,
        })
        .await?
    }

    /// Runs one purchase to its outcome. `kind` decides whether the purchase gets consumed;
    /// `None` uses the kind given at initialize time.
    #[instrument(skip(self))]
    pub async fn purchase(
        &self,
        product_id: &str,
        kind: Option<ProductKind>,
    ) -> Result<PurchaseOutcome, BillingError> {
        debug!("Sending request");
        call(&self.sender, |respond_to| BillingRequest::Purchase {
            product_id: product_id.to_string(),
            kind,
            respond_to,
        })
        .await?
    }

    #[instrument(skip(self))]
    pub async fn restore_purchases(&self) -> Result<Vec<RestoredPurchase>, BillingError> {
        debug!("Sending request");
        call(&self.sender, |respond_to| BillingRequest::Restore { respond_to }).await?
    }

    #[instrument(skip(self))]
    pub async fn product_info(&self, product_id: &str) -> Result<ProductInfo, BillingError> {
        debug!("Sending request");
        call(&self.sender, |respond_to| BillingRequest::ProductInfo {
            product_id: product_id.to_string(),
            respond_to,
        })
        .await?
    }

    #[instrument(skip(self))]
    pub async fn status(&self) -> Result<ControllerStatus, BillingError> {
        call(&self.sender, |respond_to| BillingRequest::Status { respond_to }).await?
    }
}
