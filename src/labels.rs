// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provenance labels stamped on every resource this controller creates.
//!
//! The label set identifies objects owned by one controller instance. The
//! analyzer uses it to tell owned objects from foreign ones, and purge and
//! scrub use it as the list selector so unrelated cluster objects are never
//! touched.

use crate::constants::{MANIFEST_NAME, OPERATOR_NAME};
use std::collections::BTreeMap;

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

// ============================================================================
// Operator-Specific Labels
// ============================================================================

/// Label carrying the application name of the owning controller
pub const APPLICATION_LABEL: &str = "coredns-operator.io/application";

/// Label carrying the short instance identifier of the owning controller
pub const INSTANCE_LABEL: &str = "coredns-operator.io/instance";

/// Label carrying the manifest bundle name
pub const MANIFEST_LABEL: &str = "coredns-operator.io/manifest";

/// Label carrying the manifest bundle version (`coredns-v1.12.1`)
pub const MANIFEST_VERSION_LABEL: &str = "coredns-operator.io/manifest-version";

/// Label marking a `ConfigMap` as a DNS consumer channel for an application
pub const DNS_CONSUMER_LABEL: &str = "coredns-operator.io/dns-consumer";

/// Provenance of resources rendered by one controller instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Application name of the controller
    pub application: String,
    /// Short instance identifier
    pub instance: String,
}

impl Provenance {
    #[must_use]
    pub fn new(application: &str, instance: &str) -> Self {
        Self {
            application: application.to_string(),
            instance: instance.to_string(),
        }
    }

    /// Full label set stamped on every resource rendered from `version`.
    #[must_use]
    pub fn labels(&self, version: &str) -> BTreeMap<String, String> {
        let mut labels = self.selector();
        labels.insert(K8S_MANAGED_BY.into(), OPERATOR_NAME.into());
        labels.insert(
            MANIFEST_VERSION_LABEL.into(),
            format!("{MANIFEST_NAME}-{version}"),
        );
        labels
    }

    /// Version-independent subset used to list owned objects.
    ///
    /// Objects rendered from an older release still match, so an upgrade
    /// adopts them instead of reporting collisions.
    #[must_use]
    pub fn selector(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(APPLICATION_LABEL.into(), self.application.clone());
        labels.insert(INSTANCE_LABEL.into(), self.instance.clone());
        labels.insert(MANIFEST_LABEL.into(), MANIFEST_NAME.into());
        labels
    }

    /// Whether a live object's labels mark it as owned by this controller.
    #[must_use]
    pub fn claims(&self, labels: &BTreeMap<String, String>) -> bool {
        self.selector()
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

/// Render a label map as a Kubernetes label selector string (`a=b,c=d`).
#[must_use]
pub fn selector_string(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_include_selector_and_version() {
        let provenance = Provenance::new("coredns", "1a2b3c4d");
        let labels = provenance.labels("v1.12.1");

        assert_eq!(labels.get(APPLICATION_LABEL).unwrap(), "coredns");
        assert_eq!(labels.get(INSTANCE_LABEL).unwrap(), "1a2b3c4d");
        assert_eq!(labels.get(MANIFEST_LABEL).unwrap(), "coredns");
        assert_eq!(
            labels.get(MANIFEST_VERSION_LABEL).unwrap(),
            "coredns-v1.12.1"
        );
        assert_eq!(labels.get(K8S_MANAGED_BY).unwrap(), "coredns-operator");
    }

    #[test]
    fn test_claims_ignores_version() {
        let provenance = Provenance::new("coredns", "1a2b3c4d");

        assert!(provenance.claims(&provenance.labels("v1.11.3")));
        assert!(provenance.claims(&provenance.labels("v1.12.1")));
    }

    #[test]
    fn test_claims_rejects_other_instance() {
        let ours = Provenance::new("coredns", "1a2b3c4d");
        let theirs = Provenance::new("coredns", "ffffffff");

        assert!(!ours.claims(&theirs.labels("v1.12.1")));
        assert!(!ours.claims(&BTreeMap::new()));
    }

    #[test]
    fn test_selector_string_is_sorted() {
        let provenance = Provenance::new("coredns", "1a2b3c4d");
        assert_eq!(
            selector_string(&provenance.selector()),
            "coredns-operator.io/application=coredns,coredns-operator.io/instance=1a2b3c4d,coredns-operator.io/manifest=coredns"
        );
    }
}
