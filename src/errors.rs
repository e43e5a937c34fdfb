// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the CoreDNS operator.
//!
//! This module provides specialized error types for:
//! - Cluster API operations (`ClientError`)
//! - Desired-state configuration loading (`ConfigError`)
//! - Manifest rendering (`RenderError`)
//! - Persisted state and status publishing (`StateError`, `PublishError`)
//! - The reconciler taxonomy (`ReconcileError`) with its mapping onto [`Status`]
//!
//! Every reconciliation failure is converted into a published status at the
//! reconciler boundary; none of these errors terminate the process.

use crate::publisher::Status;
use crate::resource::ResourceId;
use std::path::PathBuf;
use thiserror::Error;

/// Status message published while the manifests are being applied
pub const MSG_APPLYING: &str = "Applying manifests";

/// Status message published when RBAC objects could not be applied
pub const MSG_RBAC_FORBIDDEN: &str = "Forbidden to apply RBAC policies";

/// Status message published while the DNS service has no address
pub const MSG_NO_SERVICE_ADDRESS: &str = "Waiting for DNS service address";

/// Errors returned by a [`crate::cluster::ClusterClient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Object does not exist (HTTP 404)
    #[error("{resource} not found")]
    NotFound {
        /// Description of the missing object
        resource: String,
    },

    /// Caller lacks permission (HTTP 401/403)
    #[error("Forbidden (HTTP {code}): {message}")]
    Forbidden {
        /// HTTP status code (401 or 403)
        code: u16,
        /// Message returned by the API server
        message: String,
    },

    /// Write conflicted with another actor (HTTP 409)
    #[error("Conflict: {message}")]
    Conflict {
        /// Message returned by the API server
        message: String,
    },

    /// Any other API server error response
    #[error("API error (HTTP {code}): {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Message returned by the API server
        message: String,
    },

    /// The API server could not be reached
    #[error("Transport error: {0}")]
    Transport(String),

    /// An object could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ClientError {
    /// HTTP status code carried by this error, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Forbidden { code, .. } | Self::Api { code, .. } => Some(*code),
            Self::Conflict { .. } => Some(409),
            Self::Transport(_) | Self::Serialization(_) => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// Whether a later retry may succeed (HTTP 429, 5xx, transport failures).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { code, .. } => *code == 429 || (500..600).contains(code),
            Self::Transport(_) => true,
            _ => false,
        }
    }
}

/// Errors loading the desired-state configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not a YAML mapping
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An option value is a sequence or mapping
    #[error("Configuration option '{option}' must be a scalar value")]
    NonScalar { option: String },

    /// An option holds a value of the wrong shape
    #[error("Invalid value for configuration option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },
}

/// Errors rendering the desired resource set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A required option is unset
    #[error("Provider manifests waiting for definition of {option}")]
    ConfigIncomplete { option: String },

    /// The release selector names no bundled release
    #[error("Unknown release '{release}'")]
    UnknownRelease { release: String },

    /// An option holds a value the renderer cannot use
    #[error("Invalid value for configuration option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },

    /// A bundled release template could not be decoded
    #[error("Invalid manifest template for release {version}: {reason}")]
    Template { version: String, reason: String },

    /// A release template declares the same identity twice
    #[error("Duplicate resource {id} in rendered manifests")]
    DuplicateResource { id: ResourceId },
}

impl From<ConfigError> for RenderError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidOption { option, reason } => Self::InvalidOption { option, reason },
            other => Self::InvalidOption {
                option: "configuration".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Errors loading or saving persisted reconcile state.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("State store unavailable: {0}")]
    Client(#[from] ClientError),

    /// A stored key holds an unparseable value
    #[error("Corrupt state key '{key}': '{value}'")]
    Corrupt { key: String, value: String },
}

/// Errors publishing status or relation data.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to publish: {0}")]
    Client(#[from] ClientError),
}

/// Reconciliation failures, each mapped onto a published [`Status`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// A required option is unset; cleared by the next valid config change
    #[error("{0}")]
    ConfigIncomplete(String),

    /// The configuration is present but unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Desired identities are occupied by unrecognized objects
    #[error("{}", collision_summary(.identities.len()))]
    ResourceCollision { identities: Vec<ResourceId> },

    /// The cluster API failed with a retryable error; retried on the next event
    #[error("{context}: {source}")]
    ClientTransient {
        context: String,
        #[source]
        source: ClientError,
    },

    /// Applying RBAC objects was forbidden
    #[error("Forbidden to apply RBAC policies")]
    Authorization,

    /// Anything else, surfaced with its detail
    #[error("{0}")]
    Unexpected(String),
}

/// Summary line for a collision count (`1 Kubernetes resource collision`).
#[must_use]
pub fn collision_summary(count: usize) -> String {
    if count == 1 {
        "1 Kubernetes resource collision".to_string()
    } else {
        format!("{count} Kubernetes resource collisions")
    }
}

impl ReconcileError {
    /// Wrap a cluster client failure observed while doing `context`.
    ///
    /// Only retryable failures (HTTP 429, 5xx, transport) are transient.
    /// Everything else, including a rejected object, surfaces as `Unexpected`.
    #[must_use]
    pub fn from_client(context: &str, source: ClientError) -> Self {
        if source.is_retryable() {
            Self::ClientTransient {
                context: context.to_string(),
                source,
            }
        } else {
            Self::Unexpected(format!("{context}: {source}"))
        }
    }

    /// Status published for this failure.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::ClientTransient { .. } => Status::Waiting(self.to_string()),
            _ => Status::Blocked(self.to_string()),
        }
    }

    /// Whether the runtime should schedule a re-delivered event.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ClientTransient { .. })
    }

    /// Metric label for `coredns_operator_errors_total`.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::ConfigIncomplete(_) => "config_incomplete",
            Self::InvalidConfig(_) => "invalid_config",
            Self::ResourceCollision { .. } => "collision",
            Self::ClientTransient { .. } => "client_transient",
            Self::Authorization => "authorization",
            Self::Unexpected(_) => "unexpected",
        }
    }
}

impl From<RenderError> for ReconcileError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::ConfigIncomplete { .. } => Self::ConfigIncomplete(err.to_string()),
            RenderError::UnknownRelease { .. } | RenderError::InvalidOption { .. } => {
                Self::InvalidConfig(err.to_string())
            }
            RenderError::Template { .. } | RenderError::DuplicateResource { .. } => {
                Self::Unexpected(err.to_string())
            }
        }
    }
}

impl From<ConfigError> for ReconcileError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
