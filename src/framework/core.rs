//! # Core Messaging Primitives
//!
//! The request/reply plumbing shared by every actor in the crate.
//!
//! ## Key Types
//!
//! - [`Response`]: The one-shot reply channel embedded in every request message.
//! - [`call`]: Sends one request and awaits its reply.
//! - [`FrameworkError`]: Failures of the channel itself (actor gone, reply dropped).

use tokio::sync::{mpsc, oneshot};

// =============================================================================
// 1. ERRORS
// =============================================================================

/// Errors that can occur within the messaging layer itself.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum FrameworkError {
    #[error("Actor closed")]
    ActorClosed,
    #[error("Actor dropped response channel")]
    ActorDropped,
}

// =============================================================================
// 2. REPLY CHANNEL
// =============================================================================

/// Type alias for the one-shot response channel used by actors.
///
/// The actor answers with the domain result `Result<T, E>`; channel failures are reported
/// separately as [`FrameworkError`] by [`call`].
pub type Response<T, E> = oneshot::Sender<Result<T, E>>;

/// Sends a request built by `make` and waits for the actor's reply.
///
/// The outer `Result` describes the channel, the inner one is the actor's answer.
///
/// ```rust
/// use iap_controller::framework::{call, Response};
/// use tokio::sync::mpsc;
///
/// enum Request {
///     Double { value: u32, respond_to: Response<u32, String> },
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let (sender, mut receiver) = mpsc::channel(4);
///     tokio::spawn(async move {
///         while let Some(Request::Double { value, respond_to }) = receiver.recv().await {
///             let _ = respond_to.send(Ok(value * 2));
///         }
///     });
///
///     let reply = call(&sender, |respond_to| Request::Double { value: 21, respond_to }).await;
///     assert_eq!(reply, Ok(Ok(42)));
/// }
/// ```
pub async fn call<M, T, E>(
    sender: &mpsc::Sender<M>,
    make: impl FnOnce(Response<T, E>) -> M,
) -> Result<Result<T, E>, FrameworkError> {
    let (respond_to, response) = oneshot::channel();
    sender
        .send(make(respond_to))
        .await
        .map_err(|_| FrameworkError::ActorClosed)?;
    response.await.map_err(|_| FrameworkError::ActorDropped)
}

// =============================================================================
// 3. TESTS
// =============================================================================
