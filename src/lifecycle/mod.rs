//! Actor orchestration and observability setup.

pub mod billing_system;
pub mod tracing;

pub use billing_system::BillingSystem;
