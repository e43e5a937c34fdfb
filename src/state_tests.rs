// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `state.rs`

#[cfg(test)]
mod tests {
    use crate::errors::StateError;
    use crate::resource::{Resource, ResourceId, ResourceKind};
    use crate::state::{ConfigMapStateStore, ReconcileState, StateStore};
    use crate::test_utils::FakeClusterClient;
    use std::collections::BTreeMap;

    #[test]
    fn test_initial_state() {
        let state = ReconcileState::default();
        assert_eq!(state.config_hash, None, "Never applied");
        assert!(!state.deployed);
        assert!(!state.destroying);
    }

    #[test]
    fn test_data_round_trip() {
        let state = ReconcileState {
            config_hash: Some("abc123".to_string()),
            deployed: true,
            destroying: false,
        };
        assert_eq!(ReconcileState::from_data(&state.to_data()).unwrap(), state);
    }

    #[test]
    fn test_empty_hash_means_never_applied() {
        let mut data = BTreeMap::new();
        data.insert("config-hash".to_string(), String::new());
        assert_eq!(ReconcileState::from_data(&data).unwrap().config_hash, None);
    }

    #[test]
    fn test_corrupt_flag_rejected() {
        let mut data = BTreeMap::new();
        data.insert("destroying".to_string(), "maybe".to_string());

        let err = ReconcileState::from_data(&data).unwrap_err();
        assert!(matches!(err, StateError::Corrupt { ref key, .. } if key == "destroying"));
    }

    #[tokio::test]
    async fn test_configmap_store_persists_state() {
        // Arrange
        let client = FakeClusterClient::new();
        let store = ConfigMapStateStore::new(client.clone(), "coredns", "test-model");
        let state = ReconcileState {
            config_hash: Some("deadbeef".to_string()),
            deployed: true,
            destroying: true,
        };

        // Act
        store.save(&state).await.unwrap();
        let loaded = store.load().await.unwrap();

        // Assert
        assert_eq!(loaded, state);
        let id = ResourceId::new(ResourceKind::ConfigMap, Some("test-model"), "coredns-state");
        assert!(
            matches!(client.object(&id), Some(Resource::ConfigMap(_))),
            "State should live in the coredns-state ConfigMap"
        );
    }

    #[tokio::test]
    async fn test_configmap_store_missing_is_initial() {
        let client = FakeClusterClient::new();
        let store = ConfigMapStateStore::new(client, "coredns", "test-model");
        assert_eq!(store.load().await.unwrap(), ReconcileState::default());
    }
}
