//! # IAP Controller
//!
//! > **An actor-based in-app purchase lifecycle controller.**
//!
//! The controller sits between a host application and a billing provider (the platform's
//! purchase service). The host asks for a handful of request/response operations; the provider
//! answers purchases asynchronously through callbacks. The controller matches those callbacks
//! back to the caller that is waiting for them, and applies acknowledgment and consumption
//! exactly once, after the purchase is observed.
//!
//! ## 🏗️ Design
//!
//! ### One owner for all state
//! A single Tokio task, the [`BillingActor`](billing_actor::BillingActor), owns the provider
//! session, the product catalog and the one-slot purchase correlator. Nothing is shared, so
//! nothing is locked: taking the pending purchase out of its slot is a plain `Option::take`.
//!
//! ### Three inputs, one loop
//! The actor `select!`s over caller requests, provider events and the pending purchase's
//! deadline. Whichever answers the pending purchase first wins; the others find the slot empty.
//! Provider calls (connect, catalog load, restore, launch) run on spawned tasks whose replies
//! re-enter the same loop, so a slow store never holds up the deadline.
//!
//! ### Fan-out / fan-in
//! Catalog loading queries each product partition on its own task and joins them with a
//! `JoinSet`. Restoring purchases runs both ownership queries concurrently with `tokio::join!`.
//!
//! ### Observability
//! `tracing` everywhere, with structured fields (`attempt`, `product_id`, `purchase_token`).
//! See the [`lifecycle::tracing`] module for details.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Controller ([`billing_actor`])
//! - **Role**: Session, catalog, correlator, side effects and restore, driven by one actor.
//! - **Key items**: [`BillingActor`](billing_actor::BillingActor),
//!   [`ProductCatalog`](billing_actor::ProductCatalog),
//!   [`PurchaseCorrelator`](billing_actor::PurchaseCorrelator).
//!
//! ### 2. The Boundary ([`provider`])
//! - **Role**: The [`BillingProvider`](provider::BillingProvider) trait the controller drives,
//!   plus an in-memory [`MockProvider`](provider::mock::MockProvider).
//!
//! ### 3. The Interface ([`clients`], [`bridge`])
//! - **Role**: [`BillingClient`](clients::BillingClient) hides the message passing;
//!   [`IapBridge`](bridge::IapBridge) speaks the host's JSON.
//!
//! ### 4. The Orchestrator ([`lifecycle`], [`config`])
//! - **Role**: Starts and stops the actor with a layered [`BillingConfig`](config::BillingConfig).
//! - **Key items**: [`BillingSystem`](lifecycle::BillingSystem),
//!   [`shutdown`](lifecycle::BillingSystem::shutdown).
//!
//! ### 5. The Plumbing ([`framework`], [`model`])
//! - **Role**: Request/reply helpers and the plain data types shared by every layer.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the demo against the mock provider
//! RUST_LOG=info cargo run
//!
//! # Run the tests
//! cargo test
//! ```

pub mod billing_actor;
pub mod bridge;
pub mod clients;
pub mod config;
pub mod framework;
pub mod lifecycle;
pub mod model;
pub mod provider;
