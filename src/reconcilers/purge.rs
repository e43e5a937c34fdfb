// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deletion of owned resources.
//!
//! Only objects carrying this instance's provenance labels are ever deleted.
//! Objects that are already gone, or that we are not permitted to delete, do
//! not fail the operation.

use crate::cluster::ClusterClient;
use crate::errors::ClientError;
use crate::labels::Provenance;
use crate::metrics;
use crate::resource::{ResourceId, ResourceKind};
use tracing::{debug, info, warn};

/// Outcome of a deletion sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub deleted: Vec<ResourceId>,
    /// Already removed by someone else
    pub gone: Vec<ResourceId>,
    pub forbidden: Vec<ResourceId>,
}

/// Delete the given identities.
///
/// # Errors
///
/// Returns the first client error other than `NotFound` or `Forbidden`.
pub async fn delete_resources<'a, I>(
    client: &dyn ClusterClient,
    ids: I,
    report: &mut PurgeReport,
) -> Result<(), ClientError>
where
    I: IntoIterator<Item = &'a ResourceId>,
{
    for id in ids {
        match client.delete(id).await {
            Ok(()) => {
                info!(resource = %id, "Deleted resource");
                metrics::record_resource_deleted(id.kind.as_str());
                report.deleted.push(id.clone());
            }
            Err(e) if e.is_not_found() => {
                debug!(resource = %id, "Resource already deleted");
                report.gone.push(id.clone());
            }
            Err(e) if e.is_forbidden() => {
                warn!(resource = %id, error = %e, "Forbidden to delete resource");
                report.forbidden.push(id.clone());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Delete every object the provenance labels claim, in every namespace.
///
/// Kinds are swept in reverse apply order so workloads go before the
/// configuration and identities they use.
///
/// # Errors
///
/// Returns the first client error other than `NotFound` or `Forbidden`.
pub async fn purge(
    client: &dyn ClusterClient,
    provenance: &Provenance,
) -> Result<PurgeReport, ClientError> {
    let selector = provenance.selector();
    let mut report = PurgeReport::default();

    for kind in ResourceKind::ALL.iter().rev() {
        let owned = match client.list(*kind, None, &selector).await {
            Ok(owned) => owned,
            Err(e) if e.is_forbidden() => {
                warn!(kind = %kind, error = %e, "Forbidden to list owned resources");
                continue;
            }
            Err(e) => return Err(e),
        };
        let ids: Vec<ResourceId> = owned
            .iter()
            .filter(|live| provenance.claims(&live.labels()))
            .map(|live| live.id())
            .collect();
        delete_resources(client, &ids, &mut report).await?;
    }

    info!(
        deleted = report.deleted.len(),
        gone = report.gone.len(),
        forbidden = report.forbidden.len(),
        "Purged owned resources"
    );
    Ok(report)
}

#[cfg(test)]
#[path = "purge_tests.rs"]
mod purge_tests;
