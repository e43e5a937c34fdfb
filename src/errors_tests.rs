// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for operator error types.

#[cfg(test)]
mod tests {
    use crate::errors::*;
    use crate::publisher::Status;
    use crate::resource::{ResourceId, ResourceKind};

    #[test]
    fn test_config_incomplete_message() {
        let error = RenderError::ConfigIncomplete {
            option: "corefile".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Provider manifests waiting for definition of corefile"
        );
        assert_eq!(
            ReconcileError::from(error).status(),
            Status::Blocked("Provider manifests waiting for definition of corefile".to_string())
        );
    }

    #[test]
    fn test_single_collision_message() {
        let error = ReconcileError::ResourceCollision {
            identities: vec![ResourceId::new(
                ResourceKind::Service,
                Some("kube-system"),
                "kube-dns",
            )],
        };

        assert_eq!(error.to_string(), "1 Kubernetes resource collision");
        assert_eq!(
            error.status(),
            Status::Blocked("1 Kubernetes resource collision".to_string())
        );
    }

    #[test]
    fn test_multiple_collisions_message() {
        assert_eq!(collision_summary(3), "3 Kubernetes resource collisions");
    }

    #[test]
    fn test_transient_error_maps_to_waiting() {
        let error = ReconcileError::from_client(
            "Failed to apply Deployment/kube-system/coredns",
            ClientError::Api {
                code: 503,
                message: "etcd unavailable".to_string(),
            },
        );

        assert!(error.is_retryable(), "5xx should schedule a retry");
        assert_eq!(
            error.status(),
            Status::Waiting(
                "Failed to apply Deployment/kube-system/coredns: API error (HTTP 503): etcd unavailable"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_permanent_api_errors_are_blocked() {
        for code in [400, 409, 422] {
            let error = ReconcileError::from_client(
                "Failed to apply Service/kube-system/kube-dns",
                ClientError::Api {
                    code,
                    message: "rejected".to_string(),
                },
            );

            assert!(!error.is_retryable(), "HTTP {code} should not retry");
            assert!(matches!(error, ReconcileError::Unexpected(_)));
            assert!(matches!(error.status(), Status::Blocked(_)));
        }

        let throttled = ReconcileError::from_client(
            "Failed to analyze resources",
            ClientError::Api {
                code: 429,
                message: "too many requests".to_string(),
            },
        );
        assert!(throttled.is_retryable());
    }

    #[test]
    fn test_forbidden_outside_rbac_is_blocked() {
        let error = ReconcileError::from_client(
            "Failed to apply ConfigMap/kube-system/coredns",
            ClientError::Forbidden {
                code: 403,
                message: "configmaps is forbidden".to_string(),
            },
        );

        assert!(!error.is_retryable());
        assert!(matches!(error.status(), Status::Blocked(_)));
    }

    #[test]
    fn test_authorization_message() {
        assert_eq!(
            ReconcileError::Authorization.status(),
            Status::Blocked(MSG_RBAC_FORBIDDEN.to_string())
        );
    }

    #[test]
    fn test_unknown_release_is_invalid_config() {
        let error: ReconcileError = RenderError::UnknownRelease {
            release: "v0.0.1".to_string(),
        }
        .into();

        assert_eq!(error.metric_label(), "invalid_config");
        assert_eq!(error.to_string(), "Invalid configuration: Unknown release 'v0.0.1'");
    }
}
