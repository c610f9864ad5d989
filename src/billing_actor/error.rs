//! Error types for the billing actor.

use thiserror::Error;

use crate::framework::FrameworkError;

/// Errors surfaced to callers of the billing controller.
///
/// A user cancelling the purchase UI is not an error; it resolves as
/// [`PurchaseOutcome::Cancelled`](crate::model::PurchaseOutcome::Cancelled).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BillingError {
    /// An operation other than `initialize` was called while the session is not connected.
    #[error("Billing client not connected. Was initialize() called?")]
    NotConnected,

    /// A required request argument is missing.
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// The `initialize` product list could not be parsed.
    #[error("Malformed product list: {0}")]
    MalformedProductList(String),

    /// The product is not part of the loaded catalog.
    #[error("Product not found: {0}. Was initialize() called?")]
    ProductNotFound(String),

    /// Another purchase is still waiting for the provider's answer.
    #[error("Another purchase is already in progress")]
    AlreadyInProgress,

    /// The provider refused to show the purchase UI.
    #[error("Failed to launch purchase flow: {0}")]
    LaunchFailed(String),

    /// The provider answered the purchase with a failure.
    #[error("Purchase failed: {0}")]
    PurchaseFailed(String),

    /// The provider connection could not be established.
    #[error("Billing setup failed: {0}")]
    ConnectionFailed(String),

    /// No provider answer arrived before the purchase deadline.
    #[error("Purchase timed out waiting for the provider")]
    PurchaseTimedOut,

    /// The bridge was asked for a method it does not know.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// A response could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An error occurred while communicating with the actor.
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

impl From<String> for BillingError {
    fn from(msg: String) -> Self {
        BillingError::ActorCommunicationError(msg)
    }
}

impl From<FrameworkError> for BillingError {
    fn from(e: FrameworkError) -> Self {
        BillingError::ActorCommunicationError(e.to_string())
    }
}
