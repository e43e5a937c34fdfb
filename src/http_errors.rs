// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP error code mapping from Kubernetes API failures to [`ClientError`].
//!
//! # HTTP Code Mapping
//!
//! | HTTP Code | Variant | Retryable |
//! |-----------|---------|-----------|
//! | 401, 403 | `Forbidden` | no |
//! | 404 | `NotFound` | no |
//! | 409 | `Conflict` | no |
//! | 429 | `Api` | yes |
//! | 5xx | `Api` | yes |
//! | Other | `Api` | no |
//! | transport | `Transport` | yes |

use crate::errors::ClientError;

/// Map a Kubernetes API status code and message to a [`ClientError`].
///
/// # Arguments
///
/// * `status_code` - HTTP status code returned by the API server
/// * `message` - Message returned by the API server
/// * `resource` - Description of the object being accessed, used for 404s
#[must_use]
pub fn map_status_code(status_code: u16, message: &str, resource: &str) -> ClientError {
    match status_code {
        401 | 403 => ClientError::Forbidden {
            code: status_code,
            message: message.to_string(),
        },
        404 => ClientError::NotFound {
            resource: resource.to_string(),
        },
        409 => ClientError::Conflict {
            message: message.to_string(),
        },
        code => ClientError::Api {
            code,
            message: message.to_string(),
        },
    }
}

/// Classify a `kube::Error` into a [`ClientError`].
///
/// `resource` describes the object being accessed (`Deployment/kube-system/coredns`)
/// and is carried into `NotFound` errors.
#[must_use]
pub fn classify_kube_error(err: kube::Error, resource: &str) -> ClientError {
    match err {
        kube::Error::Api(response) => {
            map_status_code(response.code, &response.message, resource)
        }
        kube::Error::SerdeError(e) => ClientError::Serialization(e.to_string()),
        other => ClientError::Transport(other.to_string()),
    }
}

#[cfg(test)]
#[path = "http_errors_tests.rs"]
mod http_errors_tests;
