// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Identity-keyed apply of the desired set.

use crate::cluster::ClusterClient;
use crate::errors::ReconcileError;
use crate::metrics;
use crate::resource::{ResourceId, ResourceSet};
use tracing::{info, warn};

/// What an apply pass managed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: Vec<ResourceId>,
    /// RBAC objects the cluster refused to let us apply
    pub forbidden: Vec<ResourceId>,
}

impl ApplyReport {
    #[must_use]
    pub fn rbac_forbidden(&self) -> bool {
        !self.forbidden.is_empty()
    }
}

/// Apply every desired resource in order.
///
/// A forbidden response on an RBAC kind is recorded in the report and the
/// pass continues. Any other failure aborts the remaining work.
///
/// # Errors
///
/// Returns the classified client failure that aborted the pass.
pub async fn apply_all(
    client: &dyn ClusterClient,
    desired: &ResourceSet,
    report: &mut ApplyReport,
) -> Result<(), ReconcileError> {
    for resource in desired {
        let id = resource.id();
        match client.apply(resource).await {
            Ok(_) => {
                info!(resource = %id, "Applied resource");
                metrics::record_resource_applied(id.kind.as_str());
                report.applied.push(id);
            }
            Err(e) if e.is_forbidden() && id.kind.is_rbac() => {
                warn!(resource = %id, error = %e, "Forbidden to apply RBAC resource");
                report.forbidden.push(id);
            }
            Err(e) => {
                return Err(ReconcileError::from_client(
                    &format!("Failed to apply {id}"),
                    e,
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod apply_tests;
