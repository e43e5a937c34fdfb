// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of the managed CoreDNS deployment.
//!
//! # Reconciliation Architecture
//!
//! Each lifecycle event runs one pass through the [`controller::Reconciler`]:
//!
//! 1. **Evaluate** - Load configuration and render the desired resource set
//! 2. **Analyze** - Classify each desired identity against live state
//! 3. **Apply** - Create or update resources when the configuration changed
//! 4. **Publish** - Derive the aggregate status and hand relation data to consumers
//!
//! Teardown events replace steps 1-4 with a purge of every owned resource.
//!
//! # Modules
//!
//! - [`analyzer`] - matching / missing / conflicting / extra classification
//! - [`apply`] - ordered apply with RBAC forbidden tolerance
//! - [`purge`] - provenance-scoped deletion
//! - [`status`] - status aggregation and relation publishing
//! - [`actions`] - operator actions
//! - [`retry`] - backoff for re-delivered events
//!
//! # Example: Driving a Reconciler
//!
//! ```rust,no_run
//! use coredns_operator::context::Context;
//! use coredns_operator::events::{Event, EventKind};
//! use coredns_operator::reconcilers::Reconciler;
//! use std::sync::Arc;
//!
//! async fn install(ctx: Arc<Context>) {
//!     let mut reconciler = Reconciler::new(ctx).await;
//!     let outcome = reconciler.handle(Event::new(EventKind::Install), true).await;
//!     println!("{:?}", outcome.status);
//! }
//! ```

pub mod actions;
pub mod analyzer;
pub mod apply;
pub mod controller;
pub mod purge;
pub mod retry;
pub mod status;

pub use analyzer::{analyze, ResourceAnalysis};
pub use controller::{PassOutcome, Phase, Reconciler};
