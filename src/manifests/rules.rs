// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Mutation rules applied to every rendered resource, in a fixed order.
//!
//! Each rule is a pure transform: it receives one resource and returns it
//! (possibly modified) or `None` to remove it from the set. Rules that target
//! a single bundled object match on kind and name and pass everything else
//! through untouched.

use crate::constants::{
    CLUSTER_ROLE_NAME, COREFILE_KEY, DEPLOYMENT_NAME, SERVICE_NAME,
};
use crate::resource::{Resource, ResourceKind};
use k8s_openapi::api::core::v1::Container;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;
use tracing::debug;

/// A single transform in the render chain.
pub trait Mutation: Send + Sync {
    /// Short rule name for logging.
    fn name(&self) -> &'static str;

    /// Transform a resource, or return `None` to drop it.
    fn mutate(&self, resource: Resource) -> Option<Resource>;
}

/// Stamp the provenance label set on every resource.
pub struct ProvenanceLabels {
    pub labels: BTreeMap<String, String>,
}

impl Mutation for ProvenanceLabels {
    fn name(&self) -> &'static str {
        "provenance-labels"
    }

    fn mutate(&self, mut resource: Resource) -> Option<Resource> {
        let metadata = resource.metadata_mut();
        metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(self.labels.clone());
        Some(resource)
    }
}

/// Rewrite container image references.
pub struct RegistryRewrite {
    /// Images starting with any of these prefixes are left untouched
    pub ignored_images: Vec<String>,
    /// Ordered `(find, replace)` pairs
    pub replacements: Vec<(String, String)>,
    /// Mirror registry host replacing the image's registry component
    pub registry: Option<String>,
}

impl RegistryRewrite {
    /// Rewrite one image reference.
    #[must_use]
    pub fn rewrite(&self, image: &str) -> String {
        if self
            .ignored_images
            .iter()
            .any(|prefix| image.starts_with(prefix.as_str()))
        {
            return image.to_string();
        }

        let mut rewritten = self
            .replacements
            .iter()
            .fold(image.to_string(), |acc, (find, replace)| {
                acc.replace(find.as_str(), replace)
            });

        if let Some(registry) = &self.registry {
            let registry = registry.trim_end_matches('/');
            rewritten = match rewritten.split_once('/') {
                Some((host, path)) if is_registry_host(host) => format!("{registry}/{path}"),
                _ => format!("{registry}/{rewritten}"),
            };
        }
        rewritten
    }

    fn rewrite_containers(&self, containers: &mut [Container]) {
        for container in containers {
            if let Some(image) = container.image.as_mut() {
                let rewritten = self.rewrite(image);
                if rewritten != *image {
                    debug!(container = %container.name, from = %image, to = %rewritten, "Rewriting image");
                    *image = rewritten;
                }
            }
        }
    }
}

/// Whether the first path component of an image reference names a registry.
fn is_registry_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

impl Mutation for RegistryRewrite {
    fn name(&self) -> &'static str {
        "registry-rewrite"
    }

    fn mutate(&self, mut resource: Resource) -> Option<Resource> {
        if let Resource::Deployment(deployment) = &mut resource {
            if let Some(pod) = deployment
                .spec
                .as_mut()
                .and_then(|spec| spec.template.spec.as_mut())
            {
                self.rewrite_containers(&mut pod.containers);
                if let Some(init) = pod.init_containers.as_mut() {
                    self.rewrite_containers(init);
                }
            }
        }
        Some(resource)
    }
}

/// Move namespaced resources into the target namespace.
///
/// Cluster-scoped resources never carry a namespace. Service-account subjects
/// of the bundled role binding follow the service account.
pub struct NamespaceRewrite {
    pub namespace: String,
}

impl Mutation for NamespaceRewrite {
    fn name(&self) -> &'static str {
        "namespace-rewrite"
    }

    fn mutate(&self, mut resource: Resource) -> Option<Resource> {
        if resource.kind().is_cluster_scoped() {
            resource.metadata_mut().namespace = None;
        } else {
            resource.metadata_mut().namespace = Some(self.namespace.clone());
        }

        if resource.is(ResourceKind::ClusterRoleBinding, CLUSTER_ROLE_NAME) {
            if let Resource::ClusterRoleBinding(binding) = &mut resource {
                for subject in binding.subjects.iter_mut().flatten() {
                    subject.namespace = Some(self.namespace.clone());
                }
            }
        }
        Some(resource)
    }
}

/// Give the bundled cluster role and binding a per-instance name.
pub struct ClusterRoleRename {
    pub name: String,
}

impl Mutation for ClusterRoleRename {
    fn name(&self) -> &'static str {
        "cluster-role-rename"
    }

    fn mutate(&self, mut resource: Resource) -> Option<Resource> {
        match &mut resource {
            Resource::ClusterRoleBinding(binding)
                if binding.metadata.name.as_deref() == Some(CLUSTER_ROLE_NAME) =>
            {
                binding.metadata.name = Some(self.name.clone());
                if binding.role_ref.name == CLUSTER_ROLE_NAME {
                    binding.role_ref.name.clone_from(&self.name);
                }
            }
            Resource::ClusterRole(role)
                if role.metadata.name.as_deref() == Some(CLUSTER_ROLE_NAME) =>
            {
                role.metadata.name = Some(self.name.clone());
            }
            _ => {}
        }
        Some(resource)
    }
}

/// Install the rendered Corefile into the bundled `ConfigMap`.
pub struct CorefileContent {
    pub corefile: String,
}

impl Mutation for CorefileContent {
    fn name(&self) -> &'static str {
        "corefile-content"
    }

    fn mutate(&self, mut resource: Resource) -> Option<Resource> {
        if let Resource::ConfigMap(config_map) = &mut resource {
            if config_map.metadata.name.as_deref() == Some(DEPLOYMENT_NAME) {
                config_map
                    .data
                    .get_or_insert_with(BTreeMap::new)
                    .insert(COREFILE_KEY.to_string(), self.corefile.clone());
            }
        }
        Some(resource)
    }
}

/// Override replica count and memory limit, and mount the service account token.
pub struct DeploymentShape {
    pub replicas: i32,
    pub memory_limit: String,
}

impl Mutation for DeploymentShape {
    fn name(&self) -> &'static str {
        "deployment-shape"
    }

    fn mutate(&self, mut resource: Resource) -> Option<Resource> {
        let Resource::Deployment(deployment) = &mut resource else {
            return Some(resource);
        };
        if deployment.metadata.name.as_deref() != Some(DEPLOYMENT_NAME) {
            return Some(resource);
        }

        if let Some(spec) = deployment.spec.as_mut() {
            spec.replicas = Some(self.replicas);
            if let Some(pod) = spec.template.spec.as_mut() {
                pod.automount_service_account_token = Some(true);

                let index = pod
                    .containers
                    .iter()
                    .position(|c| c.name == DEPLOYMENT_NAME)
                    .unwrap_or(0);
                if let Some(container) = pod.containers.get_mut(index) {
                    debug!(container = %container.name, limit = %self.memory_limit, "Setting memory limit");
                    container
                        .resources
                        .get_or_insert_with(Default::default)
                        .limits
                        .get_or_insert_with(BTreeMap::new)
                        .insert("memory".to_string(), Quantity(self.memory_limit.clone()));
                }
            }
        }
        Some(resource)
    }
}

/// Clear the static cluster address of the bundled `Service`.
pub struct ServiceAddress;

impl Mutation for ServiceAddress {
    fn name(&self) -> &'static str {
        "service-address"
    }

    fn mutate(&self, mut resource: Resource) -> Option<Resource> {
        if let Resource::Service(service) = &mut resource {
            if service.metadata.name.as_deref() == Some(SERVICE_NAME) {
                if let Some(spec) = service.spec.as_mut() {
                    spec.cluster_ip = None;
                    spec.cluster_ips = None;
                }
            }
        }
        Some(resource)
    }
}

/// Drop the bundled service account when deploying into the operating namespace.
pub struct ServiceAccountPrune {
    pub prune: bool,
}

impl Mutation for ServiceAccountPrune {
    fn name(&self) -> &'static str {
        "service-account-prune"
    }

    fn mutate(&self, resource: Resource) -> Option<Resource> {
        if self.prune && resource.is(ResourceKind::ServiceAccount, DEPLOYMENT_NAME) {
            debug!("Removing service account already provided in the operating namespace");
            return None;
        }
        Some(resource)
    }
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod rules_tests;
