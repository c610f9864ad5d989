//! Request/reply messaging used by the actors of this crate.
//!
//! # Main Components
//!
//! - [`Response`] - One-shot reply channel carried inside request messages
//! - [`call`] - Send a request and await the reply
//! - [`FrameworkError`] - Channel-level failures

pub mod core;

pub use core::*;
