// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory fakes for unit tests.
//!
//! The fakes implement the crate's capability traits over plain collections
//! and record every call so tests can assert on API traffic.

use crate::catalog::Catalog;
use crate::cluster::ClusterClient;
use crate::config::{ConfigSource, Configuration};
use crate::context::{Context, OperatorIdentity};
use crate::errors::{ClientError, ConfigError, PublishError, StateError};
use crate::manifests;
use crate::publisher::{Publisher, RelationData, Status};
use crate::resource::{Resource, ResourceId, ResourceKind, ResourceSet};
use crate::state::{ReconcileState, StateStore};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DeploymentStatus;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Operating namespace used across tests.
pub const TEST_NAMESPACE: &str = "test-model";

/// Identity used across tests.
pub fn test_identity() -> OperatorIdentity {
    OperatorIdentity::new("coredns", TEST_NAMESPACE, "cafebabe-1234-5678")
}

/// Desired set rendered from bundled defaults into `namespace`.
pub fn rendered(namespace: &str) -> ResourceSet {
    let mut config = Configuration::defaults();
    config.set("namespace", namespace);
    manifests::render(&config, &test_identity(), &Catalog::bundled())
        .expect("bundled defaults render")
}

pub fn forbidden() -> ClientError {
    ClientError::Forbidden {
        code: 403,
        message: "forbidden".to_string(),
    }
}

pub fn unavailable() -> ClientError {
    ClientError::Api {
        code: 503,
        message: "service unavailable".to_string(),
    }
}

/// In-memory cluster.
#[derive(Default)]
pub struct FakeClusterClient {
    objects: Mutex<BTreeMap<ResourceId, Resource>>,
    apply_failures: Mutex<BTreeMap<ResourceKind, ClientError>>,
    get_failure: Mutex<Option<ClientError>>,
    delete_failures: Mutex<BTreeMap<ResourceKind, ClientError>>,
    pub get_calls: AtomicUsize,
    pub apply_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub applied: Mutex<Vec<ResourceId>>,
    pub deleted: Mutex<Vec<ResourceId>>,
}

impl FakeClusterClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a live object without counting an apply.
    pub fn insert(&self, resource: Resource) {
        self.objects.lock().unwrap().insert(resource.id(), resource);
    }

    pub fn object(&self, id: &ResourceId) -> Option<Resource> {
        self.objects.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn fail_apply(&self, kind: ResourceKind, error: ClientError) {
        self.apply_failures.lock().unwrap().insert(kind, error);
    }

    pub fn fail_get(&self, error: ClientError) {
        *self.get_failure.lock().unwrap() = Some(error);
    }

    pub fn fail_delete(&self, kind: ResourceKind, error: ClientError) {
        self.delete_failures.lock().unwrap().insert(kind, error);
    }

    pub fn clear_failures(&self) {
        self.apply_failures.lock().unwrap().clear();
        self.delete_failures.lock().unwrap().clear();
        *self.get_failure.lock().unwrap() = None;
    }

    pub fn applies(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Simulate the orchestrator converging: deployments become available
    /// and services get an address.
    pub fn settle(&self, address: &str) {
        for resource in self.objects.lock().unwrap().values_mut() {
            match resource {
                Resource::Deployment(deployment) => {
                    let replicas = deployment
                        .spec
                        .as_ref()
                        .and_then(|s| s.replicas)
                        .unwrap_or(1);
                    deployment.status = Some(DeploymentStatus {
                        replicas: Some(replicas),
                        available_replicas: Some(replicas),
                        ..DeploymentStatus::default()
                    });
                }
                Resource::Service(service) => {
                    if let Some(spec) = service.spec.as_mut() {
                        spec.cluster_ip = Some(address.to_string());
                    }
                }
                _ => {}
            }
        }
    }
}

#[async_trait]
impl ClusterClient for FakeClusterClient {
    async fn get(&self, id: &ResourceId) -> Result<Resource, ClientError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.get_failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.object(id).ok_or_else(|| ClientError::NotFound {
            resource: id.to_string(),
        })
    }

    async fn apply(&self, resource: &Resource) -> Result<Resource, ClientError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.apply_failures.lock().unwrap().get(&resource.kind()) {
            return Err(error.clone());
        }
        self.applied.lock().unwrap().push(resource.id());
        self.insert(resource.clone());
        Ok(resource.clone())
    }

    async fn delete(&self, id: &ResourceId) -> Result<(), ClientError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.delete_failures.lock().unwrap().get(&id.kind) {
            return Err(error.clone());
        }
        match self.objects.lock().unwrap().remove(id) {
            Some(_) => {
                self.deleted.lock().unwrap().push(id.clone());
                Ok(())
            }
            None => Err(ClientError::NotFound {
                resource: id.to_string(),
            }),
        }
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Resource>, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .values()
            .filter(|r| r.kind() == kind)
            .filter(|r| namespace.is_none() || r.namespace() == namespace)
            .filter(|r| {
                let labels = r.labels();
                selector.iter().all(|(k, v)| labels.get(k) == Some(v))
            })
            .cloned()
            .collect())
    }
}

/// In-memory state slot.
#[derive(Default)]
pub struct MemoryStateStore {
    pub state: Mutex<ReconcileState>,
    pub saves: AtomicUsize,
}

impl MemoryStateStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn current(&self) -> ReconcileState {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<ReconcileState, StateError> {
        Ok(self.current())
    }

    async fn save(&self, state: &ReconcileState) -> Result<(), StateError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = state.clone();
        Ok(())
    }
}

/// Publisher that records everything it is asked to publish.
#[derive(Default)]
pub struct RecordingPublisher {
    pub statuses: Mutex<Vec<Status>>,
    pub consumers: Mutex<Vec<String>>,
    pub relations: Mutex<Vec<(String, RelationData)>>,
    pub fail_relations: Mutex<bool>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_consumers(names: &[&str]) -> Arc<Self> {
        let publisher = Self::default();
        *publisher.consumers.lock().unwrap() = names.iter().map(|n| (*n).to_string()).collect();
        Arc::new(publisher)
    }

    pub fn last_status(&self) -> Option<Status> {
        self.statuses.lock().unwrap().last().cloned()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.lock().unwrap().len()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn set_status(&self, status: &Status) -> Result<(), PublishError> {
        self.statuses.lock().unwrap().push(status.clone());
        Ok(())
    }

    async fn consumers(&self) -> Result<Vec<String>, PublishError> {
        Ok(self.consumers.lock().unwrap().clone())
    }

    async fn publish_relation(
        &self,
        consumer: &str,
        data: &RelationData,
    ) -> Result<(), PublishError> {
        if *self.fail_relations.lock().unwrap() {
            return Err(PublishError::Client(ClientError::Transport(
                "relation unavailable".to_string(),
            )));
        }
        self.relations
            .lock()
            .unwrap()
            .push((consumer.to_string(), data.clone()));
        Ok(())
    }
}

/// Configuration source returning a mutable in-memory configuration.
pub struct StaticConfig {
    pub config: Mutex<Configuration>,
}

impl StaticConfig {
    pub fn new(config: Configuration) -> Arc<Self> {
        Arc::new(Self {
            config: Mutex::new(config),
        })
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.lock().unwrap().set(key, value);
    }
}

#[async_trait]
impl ConfigSource for StaticConfig {
    async fn load(&self) -> Result<Configuration, ConfigError> {
        Ok(self.config.lock().unwrap().clone())
    }
}

/// Fakes wired into a [`Context`].
pub struct Harness {
    pub client: Arc<FakeClusterClient>,
    pub store: Arc<MemoryStateStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub config: Arc<StaticConfig>,
    pub context: Arc<Context>,
}

impl Harness {
    /// Harness with bundled defaults deploying into `namespace`.
    pub fn new(namespace: &str) -> Self {
        let mut config = Configuration::defaults();
        config.set("namespace", namespace);
        Self::with_parts(config, RecordingPublisher::new())
    }

    pub fn with_parts(config: Configuration, publisher: Arc<RecordingPublisher>) -> Self {
        let client = FakeClusterClient::new();
        let store = MemoryStateStore::new();
        let config = StaticConfig::new(config);
        let context = Arc::new(Context {
            client: client.clone(),
            store: store.clone(),
            publisher: publisher.clone(),
            config: config.clone(),
            catalog: Arc::new(Catalog::bundled()),
            identity: test_identity(),
        });
        Self {
            client,
            store,
            publisher,
            config,
            context,
        }
    }
}
