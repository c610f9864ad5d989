//! # Observability & Tracing
//!
//! The [`setup_tracing`] function initializes structured logging with the `tracing` crate.
//! Client calls open a span per request (`purchase{product_id="coins_100" kind=None}`), so
//! every line logged by the actor while serving it is easy to follow.
//!
//! ## Configuration
//!
//! The compact format hides the crate/module prefix (`with_target(false)`) and levels come
//! from `RUST_LOG`.
//!
//! ```bash
//! # Purchase lifecycle only
//! RUST_LOG=info cargo run
//!
//! # Request payloads, provider queries, stray updates
//! RUST_LOG=debug cargo run
//! ```
//!
//! ## Purchase Trace Example
//!
//! **With `RUST_LOG=info`**:
//!
//! ```text
//! INFO Actor started entity_type="Billing"
//! INFO Billing provider connected state=connected
//! INFO Product query ok product_type=inapp found=2 outstanding=1
//! INFO Product query ok product_type=subs found=1 outstanding=0
//! INFO Catalog loaded product_count=3
//! INFO Launching purchase flow attempt=1 product_id=coins_100 consume_after_purchase=true
//! INFO Purchase completed attempt=1 product_id=coins_100 order_id=GPA.0001
//! INFO Purchase acknowledged purchase_token=token_1
//! INFO Purchase consumed purchase_token=token_1
//! INFO Settlement finished purchase_token=token_1 acknowledgement=Succeeded consumption=Succeeded
//! ```
//!
//! Failures use `warn!` with `code` and `error` fields (`Acknowledge failed`,
//! `Purchase timed out`, `Product query failed`).
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
