// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster API capability consumed by the reconciler.
//!
//! [`ClusterClient`] is the narrow get/apply/delete/list surface the
//! reconciliation engine needs. [`KubeClusterClient`] implements it against a
//! live API server with typed `kube` APIs, dispatching on [`ResourceKind`].
//!
//! # Apply Strategy
//!
//! `apply` checks whether the object exists. If it does, it patches using
//! server-side apply with this controller's field manager. Otherwise, it
//! creates the object. Re-applying an already-applied object is a no-op
//! content-wise, so an apply interrupted mid-pass is safe to repeat.

use crate::constants::FIELD_MANAGER;
use crate::errors::ClientError;
use crate::http_errors::classify_kube_error;
use crate::labels::selector_string;
use crate::resource::{Resource, ResourceId, ResourceKind};
use async_trait::async_trait;
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Service, ServiceAccount},
    rbac::v1::{ClusterRole, ClusterRoleBinding},
};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::{debug, info};

/// Get/apply/delete/list primitives against typed resources.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch the live object with this identity.
    ///
    /// Returns `ClientError::NotFound` if it does not exist.
    async fn get(&self, id: &ResourceId) -> Result<Resource, ClientError>;

    /// Create or update an object, returning the live result.
    async fn apply(&self, resource: &Resource) -> Result<Resource, ClientError>;

    /// Delete the object with this identity.
    ///
    /// Returns `ClientError::NotFound` if it does not exist.
    async fn delete(&self, id: &ResourceId) -> Result<(), ClientError>;

    /// List objects of `kind` matching every label in `selector`.
    ///
    /// `namespace = None` lists across all namespaces.
    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Resource>, ClientError>;
}

/// [`ClusterClient`] backed by a `kube::Client`.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Typed API for an identity: cluster-wide for cluster-scoped kinds, else namespaced.
    fn api<K>(&self, kind: ResourceKind, namespace: Option<&str>) -> Result<Api<K>, ClientError>
    where
        K: kube::Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>,
    {
        match namespace {
            Some(ns) => Ok(Api::namespaced(self.client.clone(), ns)),
            None => Err(ClientError::Serialization(format!(
                "{kind} requires a namespace"
            ))),
        }
    }

    /// Typed API for listing, across all namespaces when none is given.
    fn list_api<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

async fn get_typed<K>(api: Api<K>, id: &ResourceId) -> Result<K, ClientError>
where
    K: Clone + DeserializeOwned + Debug,
{
    api.get(&id.name)
        .await
        .map_err(|e| classify_kube_error(e, &id.to_string()))
}

async fn apply_typed<K>(api: Api<K>, obj: &K, id: &ResourceId) -> Result<K, ClientError>
where
    K: Clone + DeserializeOwned + Serialize + Debug,
{
    let describe = id.to_string();
    let existing = api
        .get_opt(&id.name)
        .await
        .map_err(|e| classify_kube_error(e, &describe))?;

    let result = if existing.is_some() {
        debug!(resource = %describe, "Resource already exists, applying update");
        api.patch(
            &id.name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(obj),
        )
        .await
    } else {
        debug!(resource = %describe, "Creating resource");
        api.create(&PostParams::default(), obj).await
    };

    let live = result.map_err(|e| classify_kube_error(e, &describe))?;
    info!(resource = %describe, "Applied resource");
    Ok(live)
}

async fn delete_typed<K>(api: Api<K>, id: &ResourceId) -> Result<(), ClientError>
where
    K: Clone + DeserializeOwned + Debug,
{
    api.delete(&id.name, &DeleteParams::default())
        .await
        .map(|_| ())
        .map_err(|e| classify_kube_error(e, &id.to_string()))
}

async fn list_typed<K>(api: Api<K>, selector: &BTreeMap<String, String>) -> Result<Vec<K>, ClientError>
where
    K: Clone + DeserializeOwned + Debug,
{
    let params = ListParams::default().labels(&selector_string(selector));
    api.list(&params)
        .await
        .map(|list| list.items)
        .map_err(|e| classify_kube_error(e, "list"))
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get(&self, id: &ResourceId) -> Result<Resource, ClientError> {
        let ns = id.namespace.as_deref();
        match id.kind {
            ResourceKind::ClusterRole => {
                get_typed::<ClusterRole>(Api::all(self.client.clone()), id)
                    .await
                    .map(Resource::ClusterRole)
            }
            ResourceKind::ClusterRoleBinding => {
                get_typed::<ClusterRoleBinding>(Api::all(self.client.clone()), id)
                    .await
                    .map(Resource::ClusterRoleBinding)
            }
            ResourceKind::ServiceAccount => {
                get_typed::<ServiceAccount>(self.api(id.kind, ns)?, id)
                    .await
                    .map(Resource::ServiceAccount)
            }
            ResourceKind::ConfigMap => get_typed::<ConfigMap>(self.api(id.kind, ns)?, id)
                .await
                .map(Resource::ConfigMap),
            ResourceKind::Deployment => get_typed::<Deployment>(self.api(id.kind, ns)?, id)
                .await
                .map(Resource::Deployment),
            ResourceKind::Service => get_typed::<Service>(self.api(id.kind, ns)?, id)
                .await
                .map(Resource::Service),
        }
    }

    async fn apply(&self, resource: &Resource) -> Result<Resource, ClientError> {
        let id = resource.id();
        let ns = id.namespace.as_deref();
        match resource {
            Resource::ClusterRole(obj) => apply_typed(Api::all(self.client.clone()), obj, &id)
                .await
                .map(Resource::ClusterRole),
            Resource::ClusterRoleBinding(obj) => {
                apply_typed(Api::all(self.client.clone()), obj, &id)
                    .await
                    .map(Resource::ClusterRoleBinding)
            }
            Resource::ServiceAccount(obj) => apply_typed(self.api(id.kind, ns)?, obj, &id)
                .await
                .map(Resource::ServiceAccount),
            Resource::ConfigMap(obj) => apply_typed(self.api(id.kind, ns)?, obj, &id)
                .await
                .map(Resource::ConfigMap),
            Resource::Deployment(obj) => apply_typed(self.api(id.kind, ns)?, obj, &id)
                .await
                .map(Resource::Deployment),
            Resource::Service(obj) => apply_typed(self.api(id.kind, ns)?, obj, &id)
                .await
                .map(Resource::Service),
        }
    }

    async fn delete(&self, id: &ResourceId) -> Result<(), ClientError> {
        let ns = id.namespace.as_deref();
        let result = match id.kind {
            ResourceKind::ClusterRole => {
                delete_typed::<ClusterRole>(Api::all(self.client.clone()), id).await
            }
            ResourceKind::ClusterRoleBinding => {
                delete_typed::<ClusterRoleBinding>(Api::all(self.client.clone()), id).await
            }
            ResourceKind::ServiceAccount => {
                delete_typed::<ServiceAccount>(self.api(id.kind, ns)?, id).await
            }
            ResourceKind::ConfigMap => delete_typed::<ConfigMap>(self.api(id.kind, ns)?, id).await,
            ResourceKind::Deployment => {
                delete_typed::<Deployment>(self.api(id.kind, ns)?, id).await
            }
            ResourceKind::Service => delete_typed::<Service>(self.api(id.kind, ns)?, id).await,
        };
        if result.is_ok() {
            info!(resource = %id, "Deleted resource");
        }
        result
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Resource>, ClientError> {
        fn wrap<K>(items: Vec<K>, f: fn(K) -> Resource) -> Vec<Resource> {
            items.into_iter().map(f).collect()
        }

        let resources = match kind {
            ResourceKind::ClusterRole => wrap(
                list_typed::<ClusterRole>(Api::all(self.client.clone()), selector).await?,
                Resource::ClusterRole,
            ),
            ResourceKind::ClusterRoleBinding => wrap(
                list_typed::<ClusterRoleBinding>(Api::all(self.client.clone()), selector).await?,
                Resource::ClusterRoleBinding,
            ),
            ResourceKind::ServiceAccount => wrap(
                list_typed::<ServiceAccount>(self.list_api(namespace), selector).await?,
                Resource::ServiceAccount,
            ),
            ResourceKind::ConfigMap => wrap(
                list_typed::<ConfigMap>(self.list_api(namespace), selector).await?,
                Resource::ConfigMap,
            ),
            ResourceKind::Deployment => wrap(
                list_typed::<Deployment>(self.list_api(namespace), selector).await?,
                Resource::Deployment,
            ),
            ResourceKind::Service => wrap(
                list_typed::<Service>(self.list_api(namespace), selector).await?,
                Resource::Service,
            ),
        };
        Ok(resources)
    }
}
