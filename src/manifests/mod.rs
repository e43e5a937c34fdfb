// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Manifest renderer.
//!
//! Rendering turns a [`Configuration`] into the full desired [`ResourceSet`]
//! for one pass:
//!
//! 1. Required options are checked before anything else is touched.
//! 2. The release is resolved from the catalog.
//! 3. The release documents are decoded in document order.
//! 4. The mutation chain from [`rules`] is applied to every resource.
//!
//! Rendering performs no cluster I/O; identical input yields an identical set.

pub mod rules;
pub mod template;

use crate::catalog::{Catalog, Release};
use crate::config::Configuration;
use crate::constants::{OPTION_COREFILE, OPTION_NAMESPACE};
use crate::context::OperatorIdentity;
use crate::errors::RenderError;
use crate::resource::ResourceSet;
use rules::{
    ClusterRoleRename, CorefileContent, DeploymentShape, Mutation, NamespaceRewrite,
    ProvenanceLabels, RegistryRewrite, ServiceAccountPrune, ServiceAddress,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Check that every required option is set.
///
/// # Errors
///
/// Returns `RenderError::ConfigIncomplete` naming the first missing option.
pub fn evaluate(config: &Configuration) -> Result<(), RenderError> {
    match config.missing_required() {
        Some(option) => Err(RenderError::ConfigIncomplete {
            option: option.to_string(),
        }),
        None => Ok(()),
    }
}

/// Resolve the release selected by the configuration.
///
/// # Errors
///
/// Returns `RenderError::UnknownRelease` if the selector matches no release.
pub fn resolve_release<'c>(
    config: &Configuration,
    catalog: &'c Catalog,
) -> Result<&'c Release, RenderError> {
    catalog.select(config.release().as_deref())
}

/// Build the ordered mutation chain for one render pass.
///
/// # Errors
///
/// Returns an error if an option the chain depends on is invalid.
pub fn mutation_chain(
    config: &Configuration,
    identity: &OperatorIdentity,
    release: &Release,
) -> Result<Vec<Box<dyn Mutation>>, RenderError> {
    let namespace = config
        .resolved_namespace(&identity.namespace)
        .ok_or_else(|| RenderError::ConfigIncomplete {
            option: OPTION_NAMESPACE.to_string(),
        })?;
    let corefile = config
        .get_string(OPTION_COREFILE)
        .ok_or_else(|| RenderError::ConfigIncomplete {
            option: OPTION_COREFILE.to_string(),
        })?;

    let values: BTreeMap<String, String> = config
        .options()
        .iter()
        .map(|(key, value)| (key.clone(), value.to_string()))
        .collect();

    let rules: Vec<Box<dyn Mutation>> = vec![
        Box::new(ProvenanceLabels {
            labels: identity.provenance().labels(&release.version),
        }),
        Box::new(RegistryRewrite {
            ignored_images: release.patch_rules.ignored_images.clone(),
            replacements: release.patch_rules.image_replacements.clone(),
            registry: config.image_registry(),
        }),
        Box::new(NamespaceRewrite {
            namespace: namespace.clone(),
        }),
        Box::new(ClusterRoleRename {
            name: identity.cluster_role_name(),
        }),
        Box::new(CorefileContent {
            corefile: template::safe_substitute(&corefile, &values),
        }),
        Box::new(DeploymentShape {
            replicas: config.replicas()?,
            memory_limit: config.memory_limit(),
        }),
        Box::new(ServiceAddress),
        Box::new(ServiceAccountPrune {
            prune: namespace == identity.namespace,
        }),
    ];
    Ok(rules)
}

/// Render a specific release.
///
/// # Errors
///
/// Returns an error if the configuration is incomplete or invalid, or the
/// release template cannot be decoded.
pub fn render_release(
    config: &Configuration,
    identity: &OperatorIdentity,
    release: &Release,
) -> Result<ResourceSet, RenderError> {
    evaluate(config)?;
    let chain = mutation_chain(config, identity, release)?;

    let mut set = ResourceSet::new();
    'resources: for resource in release.resources()? {
        let mut current = resource;
        for rule in &chain {
            match rule.mutate(current) {
                Some(next) => current = next,
                None => {
                    debug!(rule = rule.name(), "Resource removed by mutation rule");
                    continue 'resources;
                }
            }
        }
        set.push(current)
            .map_err(|id| RenderError::DuplicateResource { id })?;
    }

    debug!(
        release = %release.version,
        count = set.len(),
        "Rendered manifests"
    );
    Ok(set)
}

/// Render the desired resource set for `config`.
///
/// # Errors
///
/// Returns `RenderError::ConfigIncomplete` naming the first missing required
/// option, or any release or option error.
pub fn render(
    config: &Configuration,
    identity: &OperatorIdentity,
    catalog: &Catalog,
) -> Result<ResourceSet, RenderError> {
    evaluate(config)?;
    let release = resolve_release(config, catalog)?;
    render_release(config, identity, release)
}
