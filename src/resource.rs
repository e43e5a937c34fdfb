// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed resource model shared by the renderer, analyzer and cluster client.
//!
//! Supported kinds form a closed enum. A [`Resource`] is a tagged union over
//! the matching `k8s-openapi` types, so every kind carries its real payload
//! and new kinds are added by extending both enums.

use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Service, ServiceAccount},
    rbac::v1::{ClusterRole, ClusterRoleBinding},
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kinds of resources this controller renders and manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    ClusterRole,
    ClusterRoleBinding,
    ServiceAccount,
    ConfigMap,
    Deployment,
    Service,
}

impl ResourceKind {
    /// Every supported kind, in apply order.
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::ClusterRole,
        ResourceKind::ClusterRoleBinding,
        ResourceKind::ServiceAccount,
        ResourceKind::ConfigMap,
        ResourceKind::Deployment,
        ResourceKind::Service,
    ];

    /// The Kubernetes `kind` string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::ClusterRole => "ClusterRole",
            ResourceKind::ClusterRoleBinding => "ClusterRoleBinding",
            ResourceKind::ServiceAccount => "ServiceAccount",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::Service => "Service",
        }
    }

    /// Parse a Kubernetes `kind` string.
    #[must_use]
    pub fn from_kind(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == kind)
    }

    /// Cluster-scoped kinds never carry a namespace.
    #[must_use]
    pub fn is_cluster_scoped(self) -> bool {
        matches!(
            self,
            ResourceKind::ClusterRole | ResourceKind::ClusterRoleBinding
        )
    }

    /// RBAC kinds get special handling for 401/403 responses on apply.
    #[must_use]
    pub fn is_rbac(self) -> bool {
        self.is_cluster_scoped()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a resource: `(kind, namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceId {
    #[must_use]
    pub fn new(kind: ResourceKind, namespace: Option<&str>, name: &str) -> Self {
        Self {
            kind,
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceId {
    /// Formats as `Kind/[namespace/]name`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}/{}", self.kind, namespace, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// A desired or live resource, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resource {
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
    ServiceAccount(ServiceAccount),
    ConfigMap(ConfigMap),
    Deployment(Deployment),
    Service(Service),
}

/// Evaluate an expression against the inner object of any variant.
macro_rules! each_variant {
    ($resource:expr, $obj:ident => $body:expr) => {
        match $resource {
            Resource::ClusterRole($obj) => $body,
            Resource::ClusterRoleBinding($obj) => $body,
            Resource::ServiceAccount($obj) => $body,
            Resource::ConfigMap($obj) => $body,
            Resource::Deployment($obj) => $body,
            Resource::Service($obj) => $body,
        }
    };
}

impl Resource {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::ClusterRole(_) => ResourceKind::ClusterRole,
            Resource::ClusterRoleBinding(_) => ResourceKind::ClusterRoleBinding,
            Resource::ServiceAccount(_) => ResourceKind::ServiceAccount,
            Resource::ConfigMap(_) => ResourceKind::ConfigMap,
            Resource::Deployment(_) => ResourceKind::Deployment,
            Resource::Service(_) => ResourceKind::Service,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &ObjectMeta {
        each_variant!(self, obj => &obj.metadata)
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        each_variant!(self, obj => &mut obj.metadata)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    /// Labels of the object, empty when none are set.
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.metadata().labels.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn id(&self) -> ResourceId {
        ResourceId::new(self.kind(), self.namespace(), self.name())
    }

    /// Whether this is the named object of the given kind.
    #[must_use]
    pub fn is(&self, kind: ResourceKind, name: &str) -> bool {
        self.kind() == kind && self.name() == name
    }

    /// Decode a resource from a JSON document carrying `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the `kind` is missing or unsupported, or if the
    /// document does not match the schema of that kind.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ResourceDecodeError> {
        let kind = value
            .get("kind")
            .and_then(serde_json::Value::as_str)
            .ok_or(ResourceDecodeError::MissingKind)?;
        let kind = ResourceKind::from_kind(kind)
            .ok_or_else(|| ResourceDecodeError::UnsupportedKind(kind.to_string()))?;

        let resource = match kind {
            ResourceKind::ClusterRole => Resource::ClusterRole(serde_json::from_value(value)?),
            ResourceKind::ClusterRoleBinding => {
                Resource::ClusterRoleBinding(serde_json::from_value(value)?)
            }
            ResourceKind::ServiceAccount => {
                Resource::ServiceAccount(serde_json::from_value(value)?)
            }
            ResourceKind::ConfigMap => Resource::ConfigMap(serde_json::from_value(value)?),
            ResourceKind::Deployment => Resource::Deployment(serde_json::from_value(value)?),
            ResourceKind::Service => Resource::Service(serde_json::from_value(value)?),
        };
        Ok(resource)
    }
}

/// Errors decoding a resource document.
#[derive(Debug, thiserror::Error)]
pub enum ResourceDecodeError {
    #[error("resource document has no kind")]
    MissingKind,

    #[error("unsupported resource kind '{0}'")]
    UnsupportedKind(String),

    #[error("invalid resource document: {0}")]
    Schema(#[from] serde_json::Error),
}

/// Ordered set of desired resources produced by one render pass.
///
/// Identities are unique; insertion order is preserved so apply order and
/// serialized form are stable for identical input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResourceSet {
    resources: Vec<Resource>,
}

impl ResourceSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource.
    ///
    /// # Errors
    ///
    /// Returns the identity if it is already present in the set.
    pub fn push(&mut self, resource: Resource) -> Result<(), ResourceId> {
        let id = resource.id();
        if self.contains(&id) {
            return Err(id);
        }
        self.resources.push(resource);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.resources.iter().any(|r| &r.id() == id)
    }

    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| &r.id() == id)
    }

    #[must_use]
    pub fn ids(&self) -> BTreeSet<ResourceId> {
        self.resources.iter().map(Resource::id).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.resources.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Find the first resource of the given kind and name.
    #[must_use]
    pub fn find(&self, kind: ResourceKind, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.is(kind, name))
    }
}

impl<'a> IntoIterator for &'a ResourceSet {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.iter()
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod resource_tests;
