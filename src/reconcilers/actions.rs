// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator actions: `list-versions`, `list-resources`, `scrub-resources`
//! and `sync-resources`.
//!
//! Resource actions report the analysis taken before they act, partitioned
//! into `matching`, `missing`, `conflicting` and `extra` with empty
//! partitions omitted. Failures are returned as a message and never affect
//! the reconcile state.

use crate::constants::MANIFEST_NAME;
use crate::context::Context;
use crate::events::{ActionName, ActionRequest, ActionResult};
use crate::manifests;
use crate::reconcilers::analyzer::{analyze, collect_extras, ResourceAnalysis};
use crate::reconcilers::purge::{delete_resources, PurgeReport};
use crate::resource::{ResourceId, ResourceSet};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Filters narrowing the resources an action reports or touches.
#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    manifest: Option<String>,
    kinds: Vec<String>,
}

impl ActionFilter {
    #[must_use]
    pub fn new(manifest: Option<&str>, resources: Option<&str>) -> Self {
        Self {
            manifest: manifest.map(str::to_lowercase),
            kinds: resources
                .map(|r| r.split_whitespace().map(str::to_lowercase).collect())
                .unwrap_or_default(),
        }
    }

    /// Whether `id` passes both filters.
    #[must_use]
    pub fn accepts(&self, id: &ResourceId) -> bool {
        let manifest_ok = self
            .manifest
            .as_deref()
            .is_none_or(|m| MANIFEST_NAME.contains(m));
        let kind = id.kind.as_str().to_lowercase();
        let kind_ok = self.kinds.is_empty() || self.kinds.iter().any(|k| kind.contains(k.as_str()));
        manifest_ok && kind_ok
    }

    /// Restrict an analysis to accepted identities.
    #[must_use]
    pub fn apply(&self, analysis: &ResourceAnalysis) -> ResourceAnalysis {
        ResourceAnalysis {
            matching: analysis
                .matching
                .iter()
                .filter(|(id, _)| self.accepts(id))
                .map(|(id, live)| (id.clone(), live.clone()))
                .collect(),
            missing: analysis.missing.iter().filter(|id| self.accepts(id)).cloned().collect(),
            conflicting: analysis
                .conflicting
                .iter()
                .filter(|id| self.accepts(id))
                .cloned()
                .collect(),
            extra: analysis.extra.iter().filter(|id| self.accepts(id)).cloned().collect(),
        }
    }
}

/// Newline-joined partitions, omitting empty ones.
#[must_use]
pub fn partitions(analysis: &ResourceAnalysis) -> BTreeMap<String, String> {
    let join = |ids: Vec<&ResourceId>| {
        ids.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut result = BTreeMap::new();
    let parts = [
        ("matching", analysis.matching.keys().collect::<Vec<_>>()),
        ("missing", analysis.missing.iter().collect()),
        ("conflicting", analysis.conflicting.iter().collect()),
        ("extra", analysis.extra.iter().collect()),
    ];
    for (name, ids) in parts {
        if !ids.is_empty() {
            result.insert(name.to_string(), join(ids));
        }
    }
    result
}

/// Run one action to completion.
#[instrument(skip(ctx, request), fields(action = request.name.as_str()))]
pub async fn run_action(ctx: &Context, request: &ActionRequest, primary: bool) -> ActionResult {
    if request.name == ActionName::ListVersions {
        let mut result = BTreeMap::new();
        result.insert("versions".to_string(), ctx.catalog.list_versions().join("\n"));
        return Ok(result);
    }

    if request.name.is_mutating() && !primary {
        return Err(format!(
            "{} can only run on the leader instance",
            request.name.as_str()
        ));
    }

    let desired = render_desired(ctx).await?;
    let provenance = ctx.identity.provenance();
    let mut analysis = analyze(ctx.client.as_ref(), &desired, &provenance)
        .await
        .map_err(|e| format!("Failed to analyze resources: {e}"))?;
    collect_extras(ctx.client.as_ref(), &desired, &provenance, &mut analysis)
        .await
        .map_err(|e| format!("Failed to list owned resources: {e}"))?;

    let filter = ActionFilter::new(request.manifest.as_deref(), request.resources.as_deref());
    let selected = filter.apply(&analysis);
    let result = partitions(&selected);

    match request.name {
        ActionName::ScrubResources => scrub(ctx, &selected).await?,
        ActionName::SyncResources => sync(ctx, &desired, &selected).await?,
        ActionName::ListResources | ActionName::ListVersions => {}
    }

    Ok(result)
}

async fn render_desired(ctx: &Context) -> Result<ResourceSet, String> {
    let config = ctx.config.load().await.map_err(|e| e.to_string())?;
    manifests::render(&config, &ctx.identity, &ctx.catalog).map_err(|e| e.to_string())
}

async fn scrub(ctx: &Context, selected: &ResourceAnalysis) -> Result<(), String> {
    let mut report = PurgeReport::default();
    delete_resources(ctx.client.as_ref(), &selected.extra, &mut report)
        .await
        .map_err(|e| format!("Failed to scrub resources: {e}"))?;
    info!(deleted = report.deleted.len(), "Scrubbed extra resources");
    Ok(())
}

async fn sync(
    ctx: &Context,
    desired: &ResourceSet,
    selected: &ResourceAnalysis,
) -> Result<(), String> {
    for id in &selected.missing {
        let Some(resource) = desired.get(id) else {
            continue;
        };
        ctx.client
            .apply(resource)
            .await
            .map_err(|e| format!("Failed to sync {id}: {e}"))?;
        info!(resource = %id, "Synced missing resource");
    }
    Ok(())
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod actions_tests;
