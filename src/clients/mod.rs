//! Typed wrappers around the actors' request channels.

pub mod billing_client;

pub use billing_client::*;
