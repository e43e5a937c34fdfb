// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Persisted reconcile state.
//!
//! [`ReconcileState`] survives across lifecycle events and process restarts.
//! It is loaded once at startup (and again when leadership is acquired),
//! mutated only by the reconciler, and written only by the primary.

use crate::cluster::ClusterClient;
use crate::constants::{
    STATE_CONFIGMAP_SUFFIX, STATE_CONFIG_HASH_KEY, STATE_DEPLOYED_KEY, STATE_DESTROYING_KEY,
};
use crate::errors::StateError;
use crate::resource::{Resource, ResourceId, ResourceKind};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Process-wide reconcile state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileState {
    /// Fingerprint of the last fully applied configuration; `None` if never applied
    pub config_hash: Option<String>,
    /// Whether the manifests have been applied at least once
    pub deployed: bool,
    /// Latched by a teardown event; never reset within the process and never
    /// restored from the store by a later process
    pub destroying: bool,
}

impl ReconcileState {
    /// Encode as `ConfigMap` data.
    #[must_use]
    pub fn to_data(&self) -> BTreeMap<String, String> {
        let mut data = BTreeMap::new();
        data.insert(
            STATE_CONFIG_HASH_KEY.to_string(),
            self.config_hash.clone().unwrap_or_default(),
        );
        data.insert(STATE_DEPLOYED_KEY.to_string(), self.deployed.to_string());
        data.insert(
            STATE_DESTROYING_KEY.to_string(),
            self.destroying.to_string(),
        );
        data
    }

    /// Decode from `ConfigMap` data; absent keys take their initial value.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Corrupt` if a flag is not `true` or `false`.
    pub fn from_data(data: &BTreeMap<String, String>) -> Result<Self, StateError> {
        let flag = |key: &str| -> Result<bool, StateError> {
            match data.get(key).map(String::as_str) {
                None | Some("") => Ok(false),
                Some(value) => value.parse().map_err(|_| StateError::Corrupt {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
            }
        };

        Ok(Self {
            config_hash: data
                .get(STATE_CONFIG_HASH_KEY)
                .filter(|hash| !hash.is_empty())
                .cloned(),
            deployed: flag(STATE_DEPLOYED_KEY)?,
            destroying: flag(STATE_DESTROYING_KEY)?,
        })
    }
}

/// Durable slot holding [`ReconcileState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load persisted state; initial state if nothing has been stored.
    async fn load(&self) -> Result<ReconcileState, StateError>;

    /// Persist state.
    async fn save(&self, state: &ReconcileState) -> Result<(), StateError>;
}

/// State stored in the `<app>-state` `ConfigMap` of the operating namespace.
pub struct ConfigMapStateStore {
    client: Arc<dyn ClusterClient>,
    id: ResourceId,
}

impl ConfigMapStateStore {
    #[must_use]
    pub fn new(client: Arc<dyn ClusterClient>, app: &str, namespace: &str) -> Self {
        let name = format!("{app}-{STATE_CONFIGMAP_SUFFIX}");
        Self {
            client,
            id: ResourceId::new(ResourceKind::ConfigMap, Some(namespace), &name),
        }
    }
}

#[async_trait]
impl StateStore for ConfigMapStateStore {
    async fn load(&self) -> Result<ReconcileState, StateError> {
        match self.client.get(&self.id).await {
            Ok(Resource::ConfigMap(cm)) => {
                ReconcileState::from_data(&cm.data.unwrap_or_default())
            }
            Ok(_) => Ok(ReconcileState::default()),
            Err(e) if e.is_not_found() => Ok(ReconcileState::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &ReconcileState) -> Result<(), StateError> {
        let config_map = ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.id.name.clone()),
                namespace: self.id.namespace.clone(),
                ..ObjectMeta::default()
            },
            data: Some(state.to_data()),
            ..ConfigMap::default()
        };
        self.client.apply(&Resource::ConfigMap(config_map)).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod state_tests;
