// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-versus-live resource analysis.
//!
//! Every desired identity is looked up exactly once and lands in exactly one
//! of `matching`, `missing` or `conflicting`. Extras, owned objects that are
//! no longer desired, are found separately by a label-selector listing so the
//! per-pass analysis stays bounded by the size of the desired set.

use crate::cluster::ClusterClient;
use crate::errors::ClientError;
use crate::labels::Provenance;
use crate::resource::{Resource, ResourceId, ResourceKind, ResourceSet};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Classification of the desired set against live state.
#[derive(Debug, Clone, Default)]
pub struct ResourceAnalysis {
    /// Owned identities, with the live object as observed
    pub matching: BTreeMap<ResourceId, Resource>,
    /// Desired identities absent from the cluster
    pub missing: BTreeSet<ResourceId>,
    /// Desired identities occupied by objects this controller does not own
    pub conflicting: BTreeSet<ResourceId>,
    /// Owned objects no longer desired
    pub extra: BTreeSet<ResourceId>,
}

impl ResourceAnalysis {
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicting.is_empty()
    }

    /// Live object observed for a desired identity.
    #[must_use]
    pub fn live(&self, kind: ResourceKind, name: &str) -> Option<&Resource> {
        self.matching
            .values()
            .find(|resource| resource.is(kind, name))
    }

    /// Identities not yet reconciled: missing ones and workloads whose
    /// available replicas are below the desired count.
    #[must_use]
    pub fn unready(&self) -> Vec<ResourceId> {
        let mut unready: Vec<ResourceId> = self.missing.iter().cloned().collect();
        unready.extend(
            self.matching
                .iter()
                .filter(|(_, live)| !is_available(live))
                .map(|(id, _)| id.clone()),
        );
        unready.sort();
        unready
    }
}

/// Whether a live workload has all of its desired replicas available.
///
/// Non-workload kinds are available as soon as they exist.
#[must_use]
pub fn is_available(resource: &Resource) -> bool {
    let Resource::Deployment(deployment) = resource else {
        return true;
    };
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1);
    let available = deployment
        .status
        .as_ref()
        .and_then(|status| status.available_replicas)
        .unwrap_or(0);
    available >= desired
}

/// Classify every desired identity with one lookup each.
///
/// # Errors
///
/// Returns the first client error other than `NotFound`.
pub async fn analyze(
    client: &dyn ClusterClient,
    desired: &ResourceSet,
    provenance: &Provenance,
) -> Result<ResourceAnalysis, ClientError> {
    let mut analysis = ResourceAnalysis::default();

    for resource in desired {
        let id = resource.id();
        match client.get(&id).await {
            Ok(live) if provenance.claims(&live.labels()) => {
                debug!(resource = %id, "Resource is owned");
                analysis.matching.insert(id, live);
            }
            Ok(_) => {
                warn!(resource = %id, "Resource exists without our provenance labels");
                analysis.conflicting.insert(id);
            }
            Err(e) if e.is_not_found() => {
                debug!(resource = %id, "Resource is missing");
                analysis.missing.insert(id);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(analysis)
}

/// Add owned-but-undesired objects to `analysis.extra`.
///
/// Lists each supported kind across all namespaces with the provenance
/// selector. A kind that cannot be listed for lack of permission is skipped.
///
/// # Errors
///
/// Returns the first client error other than `Forbidden`.
pub async fn collect_extras(
    client: &dyn ClusterClient,
    desired: &ResourceSet,
    provenance: &Provenance,
    analysis: &mut ResourceAnalysis,
) -> Result<(), ClientError> {
    let selector = provenance.selector();
    let wanted = desired.ids();

    for kind in ResourceKind::ALL {
        let owned = match client.list(kind, None, &selector).await {
            Ok(owned) => owned,
            Err(e) if e.is_forbidden() => {
                warn!(kind = %kind, error = %e, "Not permitted to list owned resources");
                continue;
            }
            Err(e) => return Err(e),
        };
        analysis.extra.extend(
            owned
                .iter()
                .filter(|live| provenance.claims(&live.labels()))
                .map(Resource::id)
                .filter(|id| !wanted.contains(id)),
        );
    }

    Ok(())
}

#[cfg(test)]
#[path = "analyzer_tests.rs"]
mod analyzer_tests;
