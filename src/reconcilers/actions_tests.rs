// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `actions.rs`

#[cfg(test)]
mod tests {
    use crate::events::{ActionName, ActionRequest};
    use crate::reconcilers::actions::{run_action, ActionFilter};
    use crate::resource::{ResourceId, ResourceKind};
    use crate::test_utils::{rendered, unavailable, Harness};

    fn request(name: ActionName, manifest: Option<&str>, resources: Option<&str>) -> ActionRequest {
        ActionRequest::new(name).with_filters(
            manifest.map(ToString::to_string),
            resources.map(ToString::to_string),
        )
    }

    #[test]
    fn test_filter_matches_kind_substrings() {
        let filter = ActionFilter::new(None, Some("service  Deploy"));
        let service = ResourceId::new(ResourceKind::Service, Some("kube-system"), "kube-dns");
        let account = ResourceId::new(ResourceKind::ServiceAccount, Some("kube-system"), "coredns");
        let deployment = ResourceId::new(ResourceKind::Deployment, Some("kube-system"), "coredns");
        let role = ResourceId::new(ResourceKind::ClusterRole, None, "system:coredns");

        assert!(filter.accepts(&service));
        assert!(filter.accepts(&account));
        assert!(filter.accepts(&deployment));
        assert!(!filter.accepts(&role));
    }

    #[test]
    fn test_filter_by_manifest_name() {
        let id = ResourceId::new(ResourceKind::ConfigMap, Some("kube-system"), "coredns");

        assert!(ActionFilter::new(Some("core"), None).accepts(&id));
        assert!(!ActionFilter::new(Some("metrics-server"), None).accepts(&id));
    }

    #[tokio::test]
    async fn test_list_versions_sorted() {
        let harness = Harness::new("kube-system");

        let result = run_action(
            &harness.context,
            &ActionRequest::new(ActionName::ListVersions),
            false,
        )
        .await
        .unwrap();

        assert_eq!(result["versions"], "v1.11.3\nv1.12.1");
    }

    #[tokio::test]
    async fn test_list_resources_on_fresh_cluster() {
        let harness = Harness::new("kube-system");

        let result = run_action(
            &harness.context,
            &request(ActionName::ListResources, None, Some("service")),
            false,
        )
        .await
        .unwrap();

        assert_eq!(
            result["missing"],
            "ServiceAccount/kube-system/coredns\nService/kube-system/kube-dns"
        );
        assert!(!result.contains_key("matching"), "Empty partitions are omitted");
        assert_eq!(harness.client.applies(), 0, "Listing never writes");
    }

    #[tokio::test]
    async fn test_sync_creates_missing_resources() {
        let harness = Harness::new("kube-system");

        let result = run_action(
            &harness.context,
            &request(ActionName::SyncResources, None, None),
            true,
        )
        .await
        .unwrap();

        assert_eq!(result["missing"].lines().count(), 6);
        assert_eq!(harness.client.applies(), 6);
        assert_eq!(harness.client.len(), 6);
    }

    #[tokio::test]
    async fn test_sync_fails_on_client_error() {
        let harness = Harness::new("kube-system");
        harness
            .client
            .fail_apply(ResourceKind::Deployment, unavailable());

        let err = run_action(
            &harness.context,
            &request(ActionName::SyncResources, None, None),
            true,
        )
        .await
        .unwrap_err();

        assert!(err.starts_with("Failed to sync Deployment/kube-system/coredns"));
    }

    #[tokio::test]
    async fn test_scrub_deletes_extras_only() {
        let harness = Harness::new("kube-system");
        for resource in &rendered("old-namespace") {
            harness.client.insert(resource.clone());
        }

        let result = run_action(
            &harness.context,
            &request(ActionName::ScrubResources, None, None),
            true,
        )
        .await
        .unwrap();

        // Cluster-scoped RBAC is shared between both renders and stays.
        assert_eq!(result["extra"].lines().count(), 4);
        assert_eq!(harness.client.len(), 2);
        let role = ResourceId::new(
            ResourceKind::ClusterRole,
            None,
            &harness.context.identity.cluster_role_name(),
        );
        assert!(harness.client.object(&role).is_some());
    }

    #[tokio::test]
    async fn test_mutating_actions_require_leader() {
        let harness = Harness::new("kube-system");

        let err = run_action(
            &harness.context,
            &request(ActionName::ScrubResources, None, None),
            false,
        )
        .await
        .unwrap_err();

        assert_eq!(err, "scrub-resources can only run on the leader instance");
    }

    #[tokio::test]
    async fn test_incomplete_config_fails_action() {
        let harness = Harness::new("kube-system");
        harness.config.set("corefile", "");

        let err = run_action(
            &harness.context,
            &request(ActionName::ListResources, None, None),
            false,
        )
        .await
        .unwrap_err();

        assert_eq!(err, "Provider manifests waiting for definition of corefile");
    }
}
