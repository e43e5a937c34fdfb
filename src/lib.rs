// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # coredns-operator - CoreDNS reconciliation controller for Kubernetes
//!
//! A Kubernetes controller that keeps a CoreDNS deployment in conformance with
//! a declarative configuration, reports drift and collisions, and publishes
//! the DNS service address to dependent consumers.
//!
//! ## Overview
//!
//! Each lifecycle event runs one reconciliation pass:
//!
//! - Render the desired resources from the bundled release and configuration
//! - Classify them against live cluster objects (matching, missing, conflicting)
//! - Apply when the configuration fingerprint changed, never over a collision
//! - Publish the aggregate status and the relation data
//!
//! ## Modules
//!
//! - [`catalog`] - Bundled CoreDNS releases and their patch rules
//! - [`manifests`] - Renderer and mutation rules
//! - [`reconcilers`] - Analyzer, apply, purge, status and the control loop
//! - [`cluster`] - Cluster client capability and its `kube` implementation
//! - [`events`] - Lifecycle events and the event source
//! - [`runtime`] - Event loop driver and event producers
//! - [`admin`] - Metrics, health and event injection endpoint
//!
//! ## Example
//!
//! ```rust,no_run
//! use coredns_operator::catalog::Catalog;
//! use coredns_operator::config::Configuration;
//! use coredns_operator::context::OperatorIdentity;
//! use coredns_operator::manifests;
//!
//! let mut config = Configuration::defaults();
//! config.set("forward", "1.1.1.1");
//! let identity = OperatorIdentity::new("coredns", "kube-system", "0123456789abcdef");
//!
//! let desired = manifests::render(&config, &identity, &Catalog::bundled()).unwrap();
//! for resource in &desired {
//!     println!("{}", resource.id());
//! }
//! ```

pub mod admin;
pub mod catalog;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod events;
pub mod http_errors;
pub mod labels;
pub mod manifests;
pub mod metrics;
pub mod publisher;
pub mod reconcilers;
pub mod resource;
pub mod runtime;
pub mod state;

#[cfg(test)]
pub mod test_utils;
