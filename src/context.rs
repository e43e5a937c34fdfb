// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the reconciler and its actions.
//!
//! The reconciler receives an `Arc<Context>` that contains:
//! - The cluster client capability
//! - The persisted state store and status publisher
//! - The configuration source and manifest catalog
//! - The identity of this controller instance

use crate::catalog::Catalog;
use crate::cluster::ClusterClient;
use crate::config::ConfigSource;
use crate::constants::{OPERATOR_NAME, SHORT_INSTANCE_ID_LEN};
use crate::labels::Provenance;
use crate::publisher::Publisher;
use crate::state::StateStore;
use std::sync::Arc;

/// Identity of one controller instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorIdentity {
    /// Application name (`coredns`)
    pub app: String,
    /// Operating namespace of the controller
    pub namespace: String,
    /// Stable instance identifier (namespace UID unless overridden)
    pub instance_id: String,
}

impl OperatorIdentity {
    #[must_use]
    pub fn new(app: &str, namespace: &str, instance_id: &str) -> Self {
        Self {
            app: app.to_string(),
            namespace: namespace.to_string(),
            instance_id: instance_id.to_string(),
        }
    }

    /// First eight characters of the instance identifier.
    #[must_use]
    pub fn short_id(&self) -> String {
        self.instance_id
            .chars()
            .take(SHORT_INSTANCE_ID_LEN)
            .collect()
    }

    /// Name given to the cluster-scoped role and binding of this instance.
    ///
    /// Cluster-scoped names are global, so the operating namespace and the
    /// short instance id are folded in (`coredns-operator:<ns>-<id8>:<app>`).
    #[must_use]
    pub fn cluster_role_name(&self) -> String {
        format!(
            "{OPERATOR_NAME}:{}-{}:{}",
            self.namespace,
            self.short_id(),
            self.app
        )
    }

    /// Provenance stamped on and matched against owned resources.
    #[must_use]
    pub fn provenance(&self) -> Provenance {
        Provenance::new(&self.app, &self.short_id())
    }
}

/// Dependencies shared by the reconciler, actions and admin server.
#[derive(Clone)]
pub struct Context {
    /// Cluster API capability
    pub client: Arc<dyn ClusterClient>,

    /// Durable slot for reconcile state
    pub store: Arc<dyn StateStore>,

    /// Status and relation publisher
    pub publisher: Arc<dyn Publisher>,

    /// Desired-state configuration source
    pub config: Arc<dyn ConfigSource>,

    /// Bundled releases
    pub catalog: Arc<Catalog>,

    /// Identity of this controller instance
    pub identity: OperatorIdentity,
}
