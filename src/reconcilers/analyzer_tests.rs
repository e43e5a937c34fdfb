// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `analyzer.rs`

#[cfg(test)]
mod tests {
    use crate::catalog::Catalog;
    use crate::config::Configuration;
    use crate::errors::ClientError;
    use crate::manifests;
    use crate::reconcilers::analyzer::{analyze, collect_extras, is_available};
    use crate::resource::{Resource, ResourceId, ResourceKind, ResourceSet};
    use crate::test_utils::{test_identity, FakeClusterClient};
    use std::sync::atomic::Ordering;

    fn desired(namespace: &str) -> ResourceSet {
        let mut config = Configuration::defaults();
        config.set("namespace", namespace);
        manifests::render(&config, &test_identity(), &Catalog::bundled()).unwrap()
    }

    fn unlabelled(resource: &Resource) -> Resource {
        let mut foreign = resource.clone();
        foreign.metadata_mut().labels = None;
        foreign
    }

    #[tokio::test]
    async fn test_fresh_cluster_is_all_missing() {
        let client = FakeClusterClient::new();
        let desired = desired("kube-system");

        let analysis = analyze(client.as_ref(), &desired, &test_identity().provenance())
            .await
            .unwrap();

        assert_eq!(analysis.missing, desired.ids());
        assert!(analysis.matching.is_empty());
        assert!(!analysis.has_conflicts());
        assert_eq!(
            client.get_calls.load(Ordering::SeqCst),
            desired.len(),
            "Exactly one lookup per desired identity"
        );
        assert_eq!(client.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_owned_objects_match_despite_drift() {
        let client = FakeClusterClient::new();
        let desired = desired("kube-system");
        for resource in &desired {
            let mut drifted = resource.clone();
            drifted
                .metadata_mut()
                .annotations
                .get_or_insert_with(Default::default)
                .insert("edited-by".to_string(), "someone".to_string());
            client.insert(drifted);
        }

        let analysis = analyze(client.as_ref(), &desired, &test_identity().provenance())
            .await
            .unwrap();

        assert_eq!(analysis.matching.len(), desired.len());
        assert!(analysis.missing.is_empty());
        assert!(analysis.conflicting.is_empty());
    }

    #[tokio::test]
    async fn test_unlabelled_object_is_conflicting() {
        let client = FakeClusterClient::new();
        let desired = desired("kube-system");
        let service = desired.find(ResourceKind::Service, "kube-dns").unwrap();
        client.insert(unlabelled(service));

        let analysis = analyze(client.as_ref(), &desired, &test_identity().provenance())
            .await
            .unwrap();

        assert_eq!(analysis.conflicting.len(), 1);
        assert!(analysis.conflicting.contains(&service.id()));
        assert_eq!(analysis.missing.len(), desired.len() - 1);
    }

    #[tokio::test]
    async fn test_other_instance_is_conflicting() {
        let client = FakeClusterClient::new();
        let desired = desired("kube-system");
        let config_map = desired.find(ResourceKind::ConfigMap, "coredns").unwrap();
        let mut other = config_map.clone();
        other
            .metadata_mut()
            .labels
            .get_or_insert_with(Default::default)
            .insert("coredns-operator.io/instance".to_string(), "ffffffff".to_string());
        client.insert(other);

        let analysis = analyze(client.as_ref(), &desired, &test_identity().provenance())
            .await
            .unwrap();

        assert!(analysis.conflicting.contains(&config_map.id()));
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let client = FakeClusterClient::new();
        client.fail_get(ClientError::Transport("connection refused".to_string()));

        let result = analyze(
            client.as_ref(),
            &desired("kube-system"),
            &test_identity().provenance(),
        )
        .await;

        assert!(matches!(result, Err(ClientError::Transport(_))));
    }

    #[tokio::test]
    async fn test_extras_are_owned_and_undesired() {
        let client = FakeClusterClient::new();
        let previous = desired("old-namespace");
        let current = desired("kube-system");
        for resource in &previous {
            client.insert(resource.clone());
        }
        let foreign = ResourceId::new(ResourceKind::ConfigMap, Some("old-namespace"), "foreign");
        let mut unrelated = unlabelled(previous.find(ResourceKind::ConfigMap, "coredns").unwrap());
        unrelated.metadata_mut().name = Some("foreign".to_string());
        client.insert(unrelated);

        let provenance = test_identity().provenance();
        let mut analysis = analyze(client.as_ref(), &current, &provenance).await.unwrap();
        collect_extras(client.as_ref(), &current, &provenance, &mut analysis)
            .await
            .unwrap();

        assert!(analysis
            .extra
            .contains(&ResourceId::new(ResourceKind::Deployment, Some("old-namespace"), "coredns")));
        assert!(!analysis.extra.contains(&foreign), "Unowned objects are never extras");
        assert!(
            analysis.extra.iter().all(|id| !current.contains(id)),
            "Desired identities are never extras"
        );
    }

    #[test]
    fn test_deployment_availability() {
        let set = desired("kube-system");
        let deployment = set.find(ResourceKind::Deployment, "coredns").unwrap().clone();
        assert!(!is_available(&deployment), "No status yet");

        let client = FakeClusterClient::new();
        client.insert(deployment.clone());
        client.settle("10.0.0.10");
        let settled = client.object(&deployment.id()).unwrap();
        assert!(is_available(&settled));

        let service = set.find(ResourceKind::Service, "kube-dns").unwrap();
        assert!(is_available(service));
    }

    #[tokio::test]
    async fn test_unready_lists_missing_and_unavailable() {
        let client = FakeClusterClient::new();
        let desired = desired("kube-system");
        let deployment = desired.find(ResourceKind::Deployment, "coredns").unwrap();
        client.insert(deployment.clone());

        let analysis = analyze(client.as_ref(), &desired, &test_identity().provenance())
            .await
            .unwrap();

        let unready = analysis.unready();
        assert_eq!(unready.len(), desired.len());
        assert!(unready.contains(&deployment.id()));
    }
}
