use std::sync::Arc;

use tracing::{error, info};

use crate::bridge::IapBridge;
use crate::clients::BillingClient;
use crate::config::BillingConfig;
use crate::provider::BillingProvider;

/// The runtime orchestrator for the billing controller.
///
/// `BillingSystem` is responsible for:
/// - **Lifecycle Management**: Starting the billing actor and stopping it again
/// - **Dependency Wiring**: Handing the provider and config to the actor
///
/// # Example
///
/// ```ignore
/// let system = BillingSystem::start(provider, BillingConfig::default());
///
/// let count = system.client.initialize(products).await?;
/// let outcome = system.client.purchase("coins_100", None).await?;
///
/// system.shutdown().await?;
/// ```
pub struct BillingSystem {
    /// Client for interacting with the billing actor
    pub client: BillingClient,

    /// Task handle of the running actor (used for graceful shutdown)
    handle: tokio::task::JoinHandle<()>,
}

impl BillingSystem {
    /// Spawns the billing actor on the current runtime.
    pub fn start(provider: Arc<dyn BillingProvider>, config: BillingConfig) -> Self {
        info!(
            purchase_timeout_secs = config.purchase_timeout_secs,
            shutdown_timeout_secs = config.shutdown_timeout_secs,
            settlement = ?config.settlement,
            "Starting billing system"
        );
        let (actor, client) = crate::billing_actor::new(provider, config);
        let handle = tokio::spawn(actor.run());
        Self { client, handle }
    }

    /// A host bridge sharing this system's actor.
    pub fn bridge(&self) -> IapBridge {
        IapBridge::new(self.client.clone())
    }

    /// Gracefully shuts down the system.
    ///
    /// Dropping the client closes the request channel. The actor then waits for running
    /// settlements and exits. A settlement still running after `shutdown_timeout_secs` (a hung
    /// acknowledgment, say) is aborted, so this never waits much longer than that. Clones of the
    /// client handed out earlier (including bridges) keep the actor alive until they are dropped
    /// too.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if the actor shut down cleanly
    /// - `Err(String)` if the actor task failed or panicked
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down billing system...");

        drop(self.client);

        if let Err(e) = self.handle.await {
            error!("Actor task failed: {:?}", e);
            return Err(format!("Actor task failed: {:?}", e));
        }

        info!("System shutdown complete.");
        Ok(())
    }
}
