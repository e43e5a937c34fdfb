// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use coredns_operator::{
    catalog::Catalog,
    cluster::KubeClusterClient,
    config::{ConfigSource, Configuration},
    context::{Context, OperatorIdentity},
    errors::ConfigError,
    publisher::ConfigMapPublisher,
    state::ConfigMapStateStore,
};
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{Api, DeleteParams, PostParams},
    client::Client,
};
use serde_json::json;
use std::sync::Arc;

/// Application name used by every integration test
pub const TEST_APP: &str = "coredns";

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let ns = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": {
                "test": "integration",
                "managed-by": "coredns-operator-test"
            }
        }
    }))?;

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("Test namespace already deleted: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Configuration source that always yields the same options.
pub struct FixedConfig(pub Configuration);

#[async_trait]
impl ConfigSource for FixedConfig {
    async fn load(&self) -> Result<Configuration, ConfigError> {
        Ok(self.0.clone())
    }
}

/// Context wired to a live cluster, with the operating namespace as the
/// target namespace and a fixed instance id.
pub fn cluster_context(client: Client, namespace: &str, instance_id: &str) -> Arc<Context> {
    let cluster = Arc::new(KubeClusterClient::new(client));
    let mut config = Configuration::defaults();
    config.set("namespace", namespace);

    Arc::new(Context {
        client: cluster.clone(),
        store: Arc::new(ConfigMapStateStore::new(cluster.clone(), TEST_APP, namespace)),
        publisher: Arc::new(ConfigMapPublisher::new(cluster, TEST_APP, namespace)),
        config: Arc::new(FixedConfig(config)),
        catalog: Arc::new(Catalog::bundled()),
        identity: OperatorIdentity::new(TEST_APP, namespace, instance_id),
    })
}
