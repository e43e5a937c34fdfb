// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Externally visible status and relation data.
//!
//! [`Status`] is derived on every pass and never read back as input.
//! [`RelationData`] is the service-discovery payload handed to every DNS
//! consumer once the service is active.

use crate::cluster::ClusterClient;
use crate::constants::{
    DNS_PORT, RELATION_ADDRESS_KEY, RELATION_DOMAIN_KEY, RELATION_PORT_KEY,
    STATUS_CONFIGMAP_SUFFIX,
};
use crate::errors::PublishError;
use crate::labels::DNS_CONSUMER_LABEL;
use crate::resource::{Resource, ResourceId, ResourceKind};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Aggregate status of the managed DNS service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum Status {
    Maintenance(String),
    Waiting(String),
    Blocked(String),
    Active(String),
}

impl Status {
    /// Lowercase category name (`active`, `waiting`, ...).
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Status::Maintenance(_) => "maintenance",
            Status::Waiting(_) => "waiting",
            Status::Blocked(_) => "blocked",
            Status::Active(_) => "active",
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Status::Maintenance(m) | Status::Waiting(m) | Status::Blocked(m) | Status::Active(m) => m,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Status::Active(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category(), self.message())
    }
}

/// Service-discovery facts published to DNS consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationData {
    pub domain: String,
    #[serde(rename = "sdn-ip")]
    pub sdn_ip: String,
    pub port: String,
}

impl RelationData {
    #[must_use]
    pub fn new(domain: &str, sdn_ip: &str) -> Self {
        Self {
            domain: domain.to_string(),
            sdn_ip: sdn_ip.to_string(),
            port: DNS_PORT.to_string(),
        }
    }

    /// Key/value form written to each consumer.
    #[must_use]
    pub fn to_data(&self) -> BTreeMap<String, String> {
        let mut data = BTreeMap::new();
        data.insert(RELATION_DOMAIN_KEY.to_string(), self.domain.clone());
        data.insert(RELATION_ADDRESS_KEY.to_string(), self.sdn_ip.clone());
        data.insert(RELATION_PORT_KEY.to_string(), self.port.clone());
        data
    }
}

/// Outward status and relation channel.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish the aggregate status.
    async fn set_status(&self, status: &Status) -> Result<(), PublishError>;

    /// Names of the current DNS consumers.
    async fn consumers(&self) -> Result<Vec<String>, PublishError>;

    /// Hand relation data to one consumer.
    async fn publish_relation(&self, consumer: &str, data: &RelationData)
        -> Result<(), PublishError>;
}

/// Publisher writing to `ConfigMap`s in the operating namespace.
///
/// Status lands in `<app>-status`; consumers are `ConfigMap`s labelled
/// `coredns-operator.io/dns-consumer=<app>` and receive the relation keys.
pub struct ConfigMapPublisher {
    client: Arc<dyn ClusterClient>,
    app: String,
    namespace: String,
}

impl ConfigMapPublisher {
    #[must_use]
    pub fn new(client: Arc<dyn ClusterClient>, app: &str, namespace: &str) -> Self {
        Self {
            client,
            app: app.to_string(),
            namespace: namespace.to_string(),
        }
    }

    fn config_map(&self, name: &str, data: BTreeMap<String, String>) -> Resource {
        Resource::ConfigMap(ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(self.namespace.clone()),
                ..ObjectMeta::default()
            },
            data: Some(data),
            ..ConfigMap::default()
        })
    }
}

#[async_trait]
impl Publisher for ConfigMapPublisher {
    async fn set_status(&self, status: &Status) -> Result<(), PublishError> {
        let mut data = BTreeMap::new();
        data.insert("status".to_string(), status.category().to_string());
        data.insert("message".to_string(), status.message().to_string());
        data.insert("since".to_string(), chrono::Utc::now().to_rfc3339());

        let name = format!("{}-{STATUS_CONFIGMAP_SUFFIX}", self.app);
        self.client.apply(&self.config_map(&name, data)).await?;
        Ok(())
    }

    async fn consumers(&self) -> Result<Vec<String>, PublishError> {
        let mut selector = BTreeMap::new();
        selector.insert(DNS_CONSUMER_LABEL.to_string(), self.app.clone());

        let consumers = self
            .client
            .list(ResourceKind::ConfigMap, Some(&self.namespace), &selector)
            .await?;
        Ok(consumers.iter().map(|r| r.name().to_string()).collect())
    }

    async fn publish_relation(
        &self,
        consumer: &str,
        data: &RelationData,
    ) -> Result<(), PublishError> {
        let id = ResourceId::new(ResourceKind::ConfigMap, Some(&self.namespace), consumer);
        let Resource::ConfigMap(mut current) = self.client.get(&id).await? else {
            return Ok(());
        };

        let mut merged = current.data.take().unwrap_or_default();
        merged.extend(data.to_data());
        current.data = Some(merged);
        current.metadata.managed_fields = None;
        current.metadata.resource_version = None;

        self.client.apply(&Resource::ConfigMap(current)).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod publisher_tests;
