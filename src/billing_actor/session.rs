//! Connection lifecycle to the billing provider.

use std::fmt::Display;
use std::sync::Arc;

use tracing::{info, warn};

use super::BillingError;
use crate::provider::{BillingProvider, ProviderError, UpdateSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Disconnected => f.write_str("disconnected"),
            SessionState::Connecting => f.write_str("connecting"),
            SessionState::Connected => f.write_str("connected"),
        }
    }
}

/// Gates every provider operation behind a successful connect.
///
/// There is no automatic reconnect: after the provider drops the connection the session stays
/// `Disconnected` until the caller initializes again.
pub struct BillingSession {
    provider: Arc<dyn BillingProvider>,
    sink: UpdateSink,
    state: SessionState,
}

impl BillingSession {
    pub fn new(provider: Arc<dyn BillingProvider>, sink: UpdateSink) -> Self {
        Self {
            provider,
            sink,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Connects unless already connected.
    pub async fn connect(&mut self) -> Result<(), BillingError> {
        match self.begin_connect() {
            Some((provider, sink)) => {
                let result = provider.connect(sink).await;
                self.finish_connect(result)
            }
            None => Ok(()),
        }
    }

    /// Moves to `Connecting` and hands out what the connect call needs. `None` when already
    /// connected.
    pub fn begin_connect(&mut self) -> Option<(Arc<dyn BillingProvider>, UpdateSink)> {
        if self.is_connected() {
            info!("Session already connected");
            return None;
        }

        self.state = SessionState::Connecting;
        info!(state = %self.state, "Connecting to billing provider");
        Some((self.provider.clone(), self.sink.clone()))
    }

    /// Applies the result of a connect call started with [`begin_connect`](Self::begin_connect).
    ///
    /// A disconnect observed while connecting wins over a late success.
    pub fn finish_connect(&mut self, result: Result<(), ProviderError>) -> Result<(), BillingError> {
        match result {
            Ok(()) if self.state == SessionState::Connecting => {
                self.state = SessionState::Connected;
                info!(state = %self.state, "Billing provider connected");
                Ok(())
            }
            Ok(()) => {
                warn!(state = %self.state, "Disconnected while connecting");
                Err(BillingError::ConnectionFailed(
                    "Billing service disconnected".to_string(),
                ))
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                warn!(code = %e.code, error = %e.message, "Billing setup failed");
                Err(BillingError::ConnectionFailed(e.message))
            }
        }
    }

    /// The provider, if the session is connected.
    pub fn provider(&self) -> Result<&Arc<dyn BillingProvider>, BillingError> {
        if self.is_connected() {
            Ok(&self.provider)
        } else {
            Err(BillingError::NotConnected)
        }
    }

    pub fn on_disconnected(&mut self) {
        if self.state != SessionState::Disconnected {
            warn!("Billing service disconnected");
        }
        self.state = SessionState::Disconnected;
    }
}
