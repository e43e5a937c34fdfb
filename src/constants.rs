// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the CoreDNS operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Operator Identity
// ============================================================================

/// Name this controller stamps into `app.kubernetes.io/managed-by`
pub const OPERATOR_NAME: &str = "coredns-operator";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "coredns-operator";

/// Default application name when none is supplied on the command line
pub const DEFAULT_APP_NAME: &str = "coredns";

/// Name of the single manifest bundle this operator manages
pub const MANIFEST_NAME: &str = "coredns";

/// Number of characters of the instance identifier used in names and labels
pub const SHORT_INSTANCE_ID_LEN: usize = 8;

/// Placeholder in the namespace template replaced by the operating namespace
pub const NAMESPACE_PLACEHOLDER: &str = "{model}";

// ============================================================================
// Bundled Manifest Object Names
// ============================================================================

/// Name of the bundled `ClusterRole` and `ClusterRoleBinding`
pub const CLUSTER_ROLE_NAME: &str = "system:coredns";

/// Name of the bundled `ServiceAccount`, `ConfigMap` and `Deployment`
pub const DEPLOYMENT_NAME: &str = "coredns";

/// Name of the bundled `Service`
pub const SERVICE_NAME: &str = "kube-dns";

/// Key of the DNS configuration inside the `ConfigMap`
pub const COREFILE_KEY: &str = "Corefile";

// ============================================================================
// Configuration Options
// ============================================================================

/// DNS server configuration template
pub const OPTION_COREFILE: &str = "corefile";

/// Target namespace template
pub const OPTION_NAMESPACE: &str = "namespace";

/// Cluster DNS domain published to consumers
pub const OPTION_DOMAIN: &str = "domain";

/// Upstream resolver substituted into the default Corefile
pub const OPTION_FORWARD: &str = "forward";

/// Workload replica count
pub const OPTION_REPLICAS: &str = "replicas";

/// Workload memory limit
pub const OPTION_MEMORY_LIMIT: &str = "memory_limit";

/// Release selector
pub const OPTION_RELEASE: &str = "release";

/// Image registry mirror
pub const OPTION_IMAGE_REGISTRY: &str = "image_registry";

/// Options that must be set before any manifest can be rendered, in check order
pub const REQUIRED_OPTIONS: [&str; 2] = [OPTION_COREFILE, OPTION_NAMESPACE];

// ============================================================================
// Configuration Defaults
// ============================================================================

/// Default Corefile template, embedded at compile time
pub const DEFAULT_COREFILE: &str = include_str!("../templates/Corefile.tmpl");

/// Default namespace template (the operating namespace)
pub const DEFAULT_NAMESPACE_TEMPLATE: &str = "{model}";

/// Default cluster domain
pub const DEFAULT_DOMAIN: &str = "cluster.local";

/// Default upstream resolver
pub const DEFAULT_FORWARD: &str = "/etc/resolv.conf";

/// Default workload replica count
pub const DEFAULT_REPLICAS: i64 = 1;

/// Default workload memory limit
pub const DEFAULT_MEMORY_LIMIT: &str = "170Mi";

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Standard DNS port published to consumers
pub const DNS_PORT: u16 = 53;

// ============================================================================
// Relation Data Keys
// ============================================================================

/// Relation key carrying the cluster DNS domain
pub const RELATION_DOMAIN_KEY: &str = "domain";

/// Relation key carrying the DNS service address
pub const RELATION_ADDRESS_KEY: &str = "sdn-ip";

/// Relation key carrying the DNS port
pub const RELATION_PORT_KEY: &str = "port";

// ============================================================================
// Persisted State Keys
// ============================================================================

/// Suffix of the state `ConfigMap` name (`<app>-state`)
pub const STATE_CONFIGMAP_SUFFIX: &str = "state";

/// Suffix of the status `ConfigMap` name (`<app>-status`)
pub const STATUS_CONFIGMAP_SUFFIX: &str = "status";

/// State key for the last applied configuration digest
pub const STATE_CONFIG_HASH_KEY: &str = "config-hash";

/// State key for the deployed flag
pub const STATE_DEPLOYED_KEY: &str = "deployed";

/// State key for the destroying latch
pub const STATE_DESTROYING_KEY: &str = "destroying";

// ============================================================================
// Runtime Timing
// ============================================================================

/// Default interval between periodic `update-status` events (5 minutes)
pub const DEFAULT_UPDATE_STATUS_INTERVAL_SECS: u64 = 300;

/// Default interval between configuration file checks
pub const DEFAULT_CONFIG_POLL_INTERVAL_SECS: u64 = 10;

/// Lease duration for leader election
pub const LEASE_DURATION_SECS: u64 = 15;

/// Grace period before a lease is renewed
pub const LEASE_GRACE_SECS: u64 = 5;

/// Capacity of the lifecycle event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Default bind address for the metrics and health routes
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Default bind address for the event and action routes
pub const DEFAULT_ADMIN_ADDR: &str = "127.0.0.1:8081";
