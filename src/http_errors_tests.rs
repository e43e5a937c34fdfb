// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for http_errors module
//!
//! These tests verify Kubernetes API error classification.

#[cfg(test)]
mod tests {
    use crate::errors::ClientError;
    use crate::http_errors::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(
            kube::error::Status::failure(&format!("{reason} from API server"), reason)
                .with_code(code)
                .boxed(),
        )
    }

    // ============================================================================
    // Test HTTP 4xx Error Code Mappings
    // ============================================================================

    #[test]
    fn test_map_http_401_unauthorized() {
        let err = classify_kube_error(api_error(401, "Unauthorized"), "ClusterRole/x");
        assert!(err.is_forbidden(), "401 should map to Forbidden");
        assert_eq!(err.status_code(), Some(401));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_map_http_403_forbidden() {
        let err = classify_kube_error(api_error(403, "Forbidden"), "ClusterRole/x");
        assert!(err.is_forbidden(), "403 should map to Forbidden");
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn test_map_http_404_not_found() {
        let err = classify_kube_error(
            api_error(404, "NotFound"),
            "Deployment/kube-system/coredns",
        );
        assert_eq!(
            err,
            ClientError::NotFound {
                resource: "Deployment/kube-system/coredns".to_string()
            }
        );
        assert_eq!(err.to_string(), "Deployment/kube-system/coredns not found");
    }

    #[test]
    fn test_map_http_409_conflict() {
        let err = classify_kube_error(api_error(409, "Conflict"), "Service/x/kube-dns");
        assert!(matches!(err, ClientError::Conflict { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_map_http_422_is_not_retryable() {
        let err = map_status_code(422, "invalid", "Service/x/kube-dns");
        assert_eq!(err.status_code(), Some(422));
        assert!(!err.is_retryable(), "422 is a permanent client error");
    }

    // ============================================================================
    // Test Retryable Mappings
    // ============================================================================

    #[test]
    fn test_map_http_429_is_retryable() {
        let err = classify_kube_error(api_error(429, "TooManyRequests"), "ConfigMap/x/coredns");
        assert!(err.is_retryable(), "HTTP 429 (rate limiting) should be retryable");
    }

    #[test]
    fn test_map_http_5xx_is_retryable() {
        for code in [500, 502, 503, 504] {
            let err = map_status_code(code, "server error", "ConfigMap/x/coredns");
            assert!(err.is_retryable(), "HTTP {code} should be retryable");
        }
    }

    #[test]
    fn test_transport_error_is_retryable() {
        let err = ClientError::Transport("connection refused".to_string());
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), None);
    }
}
