// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status aggregation and relation publishing.

use crate::constants::SERVICE_NAME;
use crate::errors::MSG_NO_SERVICE_ADDRESS;
use crate::publisher::{Publisher, RelationData, Status};
use crate::reconcilers::analyzer::ResourceAnalysis;
use crate::resource::{Resource, ResourceKind};
use tracing::{debug, warn};

/// Address the orchestrator assigned to the DNS service, or `""`.
#[must_use]
pub fn service_address(analysis: &ResourceAnalysis) -> String {
    match analysis.live(ResourceKind::Service, SERVICE_NAME) {
        Some(Resource::Service(service)) => service
            .spec
            .as_ref()
            .and_then(|spec| spec.cluster_ip.clone())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Derive the aggregate status; the first matching rule wins.
///
/// 1. Anything unready gives `Waiting` listing the identities.
/// 2. No service address gives `Waiting` for the address.
/// 3. Otherwise `Active` with the release version.
#[must_use]
pub fn aggregate(analysis: &ResourceAnalysis, address: &str, version: &str) -> Status {
    let unready = analysis.unready();
    if !unready.is_empty() {
        let names: Vec<String> = unready.iter().map(ToString::to_string).collect();
        return Status::Waiting(format!("Waiting for {}", names.join(", ")));
    }
    if address.is_empty() || address == "None" {
        return Status::Waiting(MSG_NO_SERVICE_ADDRESS.to_string());
    }
    Status::Active(version.to_string())
}

/// Publish relation data to every consumer, best effort.
///
/// Returns whether every consumer received the data.
pub async fn publish_relations(publisher: &dyn Publisher, data: &RelationData) -> bool {
    let consumers = match publisher.consumers().await {
        Ok(consumers) => consumers,
        Err(e) => {
            warn!(error = %e, "Failed to list DNS consumers");
            return false;
        }
    };

    let mut complete = true;
    for consumer in &consumers {
        match publisher.publish_relation(consumer, data).await {
            Ok(()) => debug!(consumer = %consumer, address = %data.sdn_ip, "Published DNS relation data"),
            Err(e) => {
                warn!(consumer = %consumer, error = %e, "Failed to publish DNS relation data");
                complete = false;
            }
        }
    }
    complete
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
