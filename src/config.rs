// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state configuration.
//!
//! A [`Configuration`] is an ordered mapping of option names to scalar values.
//! Bundled defaults are overlaid by the operator-supplied YAML file, after
//! which empty-string and null values are removed: an empty option is unset,
//! never a literal empty value.
//!
//! The configuration fingerprint used to skip redundant applies is the SHA-256
//! digest of the compact JSON encoding of the sorted map.

use crate::constants::{
    DEFAULT_COREFILE, DEFAULT_DOMAIN, DEFAULT_FORWARD, DEFAULT_MEMORY_LIMIT,
    DEFAULT_NAMESPACE_TEMPLATE, DEFAULT_REPLICAS, NAMESPACE_PLACEHOLDER, OPTION_COREFILE,
    OPTION_DOMAIN, OPTION_FORWARD, OPTION_IMAGE_REGISTRY, OPTION_MEMORY_LIMIT, OPTION_NAMESPACE,
    OPTION_RELEASE, OPTION_REPLICAS, REQUIRED_OPTIONS,
};
use crate::errors::ConfigError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// A scalar option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ConfigValue {
    fn is_empty(&self) -> bool {
        matches!(self, ConfigValue::String(s) if s.is_empty())
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Int(i) => write!(f, "{i}"),
            ConfigValue::Float(x) => write!(f, "{x}"),
            ConfigValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

/// Desired-state configuration for one controller instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Configuration {
    options: BTreeMap<String, ConfigValue>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Configuration {
    /// Bundled defaults for every recognised option that has one.
    #[must_use]
    pub fn defaults() -> Self {
        let mut options = BTreeMap::new();
        options.insert(OPTION_COREFILE.to_string(), DEFAULT_COREFILE.into());
        options.insert(
            OPTION_NAMESPACE.to_string(),
            DEFAULT_NAMESPACE_TEMPLATE.into(),
        );
        options.insert(OPTION_DOMAIN.to_string(), DEFAULT_DOMAIN.into());
        options.insert(OPTION_FORWARD.to_string(), DEFAULT_FORWARD.into());
        options.insert(OPTION_REPLICAS.to_string(), DEFAULT_REPLICAS.into());
        options.insert(
            OPTION_MEMORY_LIMIT.to_string(),
            DEFAULT_MEMORY_LIMIT.into(),
        );
        Self { options }
    }

    /// Configuration holding exactly the given options, with empty values removed.
    pub fn from_options<I, K, V>(options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ConfigValue>,
    {
        let mut config = Self {
            options: BTreeMap::new(),
        };
        for (key, value) in options {
            config.set(key, value);
        }
        config
    }

    /// Overlay a YAML mapping onto the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a mapping of string keys to
    /// scalar values.
    pub fn from_yaml_str(document: &str) -> Result<Self, ConfigError> {
        let mut config = Self::defaults();
        let overlay: Option<BTreeMap<String, serde_yaml::Value>> = serde_yaml::from_str(document)?;

        for (key, value) in overlay.unwrap_or_default() {
            match value {
                serde_yaml::Value::Null => {
                    config.options.remove(&key);
                }
                serde_yaml::Value::Bool(b) => config.set(key, b),
                serde_yaml::Value::String(s) => config.set(key, s),
                serde_yaml::Value::Number(n) => {
                    let value = if let Some(i) = n.as_i64() {
                        ConfigValue::Int(i)
                    } else if let Some(x) = n.as_f64() {
                        ConfigValue::Float(x)
                    } else {
                        return Err(ConfigError::InvalidOption {
                            option: key,
                            reason: format!("number {n} is out of range"),
                        });
                    };
                    config.set(key, value);
                }
                serde_yaml::Value::Sequence(_)
                | serde_yaml::Value::Mapping(_)
                | serde_yaml::Value::Tagged(_) => {
                    return Err(ConfigError::NonScalar { option: key });
                }
            }
        }

        Ok(config)
    }

    /// Set an option; an empty string unsets it.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        let key = key.into();
        let value = value.into();
        if value.is_empty() {
            self.options.remove(&key);
        } else {
            self.options.insert(key, value);
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.options.get(key)
    }

    /// Option rendered as a string, if set.
    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.options.get(key).map(ToString::to_string)
    }

    /// All options, sorted by name.
    #[must_use]
    pub fn options(&self) -> &BTreeMap<String, ConfigValue> {
        &self.options
    }

    /// First required option that is unset, in check order.
    #[must_use]
    pub fn missing_required(&self) -> Option<&'static str> {
        REQUIRED_OPTIONS
            .into_iter()
            .find(|option| !self.options.contains_key(*option))
    }

    /// SHA-256 hex digest of the canonical serialization.
    ///
    /// `BTreeMap` keys serialize sorted, so the digest is independent of the
    /// order options were supplied in.
    #[must_use]
    pub fn hash(&self) -> String {
        let canonical = serde_json::to_string(&self.options).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Target namespace with the placeholder replaced by the operating namespace.
    #[must_use]
    pub fn resolved_namespace(&self, operating_namespace: &str) -> Option<String> {
        self.get_string(OPTION_NAMESPACE)
            .map(|template| template.replace(NAMESPACE_PLACEHOLDER, operating_namespace))
    }

    /// Release selector, if set.
    #[must_use]
    pub fn release(&self) -> Option<String> {
        self.get_string(OPTION_RELEASE)
    }

    /// Image registry mirror, if set.
    #[must_use]
    pub fn image_registry(&self) -> Option<String> {
        self.get_string(OPTION_IMAGE_REGISTRY)
    }

    /// Cluster DNS domain.
    #[must_use]
    pub fn domain(&self) -> String {
        self.get_string(OPTION_DOMAIN)
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string())
    }

    /// Workload memory limit.
    #[must_use]
    pub fn memory_limit(&self) -> String {
        self.get_string(OPTION_MEMORY_LIMIT)
            .unwrap_or_else(|| DEFAULT_MEMORY_LIMIT.to_string())
    }

    /// Workload replica count.
    ///
    /// # Errors
    ///
    /// Returns an error unless the option is a positive integer (numeric
    /// strings are accepted).
    pub fn replicas(&self) -> Result<i32, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidOption {
            option: OPTION_REPLICAS.to_string(),
            reason,
        };

        let replicas = match self.options.get(OPTION_REPLICAS) {
            None => DEFAULT_REPLICAS,
            Some(ConfigValue::Int(i)) => *i,
            Some(ConfigValue::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| invalid(format!("'{s}' is not an integer")))?,
            Some(other) => return Err(invalid(format!("'{other}' is not an integer"))),
        };

        if replicas < 1 {
            return Err(invalid(format!("{replicas} is not a positive integer")));
        }
        i32::try_from(replicas).map_err(|_| invalid(format!("{replicas} is too large")))
    }
}

/// Source of the desired-state configuration.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Load the current configuration.
    async fn load(&self) -> Result<Configuration, ConfigError>;
}

/// Configuration read from a YAML file on every load.
///
/// When no path is configured the bundled defaults are used.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: Option<PathBuf>,
}

impl FileConfigSource {
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn load(&self) -> Result<Configuration, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(Configuration::defaults());
        };

        let document =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
        Configuration::from_yaml_str(&document)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
