//! # Billing Provider Boundary
//!
//! The provider is the external capability that owns the purchase UI, receipts and entitlement
//! state. The controller never talks to a platform SDK directly; it goes through the
//! [`BillingProvider`] trait.
//!
//! ## Two directions
//!
//! - **Requests** (controller → provider): plain async trait methods.
//! - **Events** (provider → controller): the provider pushes [`ProviderEvent`]s into the
//!   [`UpdateSink`] it receives on [`BillingProvider::connect`]. Events may be pushed from any
//!   thread; the sink is an unbounded channel so the provider never blocks on the controller.
//!
//! See [`mock`] for an in-memory provider used in tests and the demo binary.

pub mod mock;

use crate::model::{ProductDetails, ProductType, PurchaseRecord};
use async_trait::async_trait;
use std::fmt::Display;
use thiserror::Error;
use tokio::sync::mpsc;

/// Response codes reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Ok,
    UserCanceled,
    ServiceUnavailable,
    BillingUnavailable,
    ItemUnavailable,
    DeveloperError,
    Error,
    ItemAlreadyOwned,
    ItemNotOwned,
    NetworkError,
    ServiceDisconnected,
    FeatureNotSupported,
}

impl Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResponseCode::Ok => "OK",
            ResponseCode::UserCanceled => "USER_CANCELED",
            ResponseCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ResponseCode::BillingUnavailable => "BILLING_UNAVAILABLE",
            ResponseCode::ItemUnavailable => "ITEM_UNAVAILABLE",
            ResponseCode::DeveloperError => "DEVELOPER_ERROR",
            ResponseCode::Error => "ERROR",
            ResponseCode::ItemAlreadyOwned => "ITEM_ALREADY_OWNED",
            ResponseCode::ItemNotOwned => "ITEM_NOT_OWNED",
            ResponseCode::NetworkError => "NETWORK_ERROR",
            ResponseCode::ServiceDisconnected => "SERVICE_DISCONNECTED",
            ResponseCode::FeatureNotSupported => "FEATURE_NOT_SUPPORTED",
        };
        f.write_str(name)
    }
}

/// Result attached to every provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingResult {
    pub code: ResponseCode,
    pub debug_message: String,
}

impl BillingResult {
    pub fn new(code: ResponseCode, debug_message: impl Into<String>) -> Self {
        Self {
            code,
            debug_message: debug_message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(ResponseCode::Ok, "")
    }

    pub fn is_ok(&self) -> bool {
        self.code == ResponseCode::Ok
    }
}

/// A failed provider request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: ResponseCode,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Parameters for [`BillingProvider::launch_purchase_flow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    pub product_id: String,
    /// Set for subscriptions only.
    pub offer_token: Option<String>,
}

/// Asynchronous notifications pushed by the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// Answer to a launched purchase flow (or an out-of-band purchase).
    PurchasesUpdated {
        result: BillingResult,
        purchases: Vec<PurchaseRecord>,
    },
    /// The provider dropped the connection. No automatic reconnect happens.
    ServiceDisconnected,
}

/// Write half of the provider event channel.
#[derive(Debug, Clone)]
pub struct UpdateSink {
    sender: mpsc::UnboundedSender<ProviderEvent>,
}

/// Creates the provider event channel.
pub fn update_channel() -> (UpdateSink, mpsc::UnboundedReceiver<ProviderEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (UpdateSink { sender }, receiver)
}

impl UpdateSink {
    /// Pushes an event. Returns `false` if the controller is gone.
    pub fn emit(&self, event: ProviderEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Reports the answer to a launched purchase flow.
    pub fn purchases_updated(&self, result: BillingResult, purchases: Vec<PurchaseRecord>) -> bool {
        self.emit(ProviderEvent::PurchasesUpdated { result, purchases })
    }

    /// Reports that the provider dropped the connection.
    pub fn disconnected(&self) -> bool {
        self.emit(ProviderEvent::ServiceDisconnected)
    }
}

/// The external billing capability.
///
/// Implementations must be cheap to share (`Arc<dyn BillingProvider>`): catalog and restore
/// queries run on separate tasks concurrently.
#[async_trait]
pub trait BillingProvider: Send + Sync + 'static {
    /// Establishes the connection and registers the sink for purchase updates.
    async fn connect(&self, sink: UpdateSink) -> Result<(), ProviderError>;

    /// Fetches metadata for `ids`, all of which belong to `product_type`.
    async fn query_product_details(
        &self,
        product_type: ProductType,
        ids: Vec<String>,
    ) -> Result<Vec<ProductDetails>, ProviderError>;

    /// Shows the purchase UI. `Ok` is only the immediate acknowledgement; the actual answer
    /// arrives later as [`ProviderEvent::PurchasesUpdated`].
    async fn launch_purchase_flow(&self, params: LaunchParams) -> Result<(), ProviderError>;

    async fn acknowledge_purchase(&self, purchase_token: &str) -> Result<(), ProviderError>;

    async fn consume_purchase(&self, purchase_token: &str) -> Result<(), ProviderError>;

    async fn query_owned_purchases(
        &self,
        product_type: ProductType,
    ) -> Result<Vec<PurchaseRecord>, ProviderError>;
}
