// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Admin HTTP endpoints.
//!
//! Two listeners are served. The metrics listener is read-only and may be
//! exposed to the cluster:
//!
//! - `GET /metrics` - Prometheus text exposition
//! - `GET /healthz` - liveness of the event loop
//!
//! The control listener can purge resources, so it binds to loopback unless
//! told otherwise:
//!
//! - `POST /events/{event}` - inject a lifecycle event
//! - `POST /actions/{name}?manifest=&resources=` - run an action through the
//!   event loop and return its JSON result

use crate::events::{ActionName, ActionRequest, EventKind, EventSender};
use crate::metrics;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Clone)]
pub struct AdminState {
    pub sender: EventSender,
}

/// Optional action filters from the query string.
#[derive(Debug, Default, Deserialize)]
pub struct ActionParams {
    pub manifest: Option<String>,
    pub resources: Option<String>,
}

/// Read-only routes.
pub fn metrics_router(state: AdminState) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Routes that change cluster state.
pub fn control_router(state: AdminState) -> Router {
    Router::new()
        .route("/events/{event}", post(post_event))
        .route("/actions/{name}", post(post_action))
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Admin server listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn get_metrics() -> Response {
    match metrics::gather_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn healthz(State(state): State<AdminState>) -> Response {
    if state.sender.is_closed() {
        (StatusCode::SERVICE_UNAVAILABLE, "event loop stopped").into_response()
    } else {
        (StatusCode::OK, "ok").into_response()
    }
}

pub async fn post_event(State(state): State<AdminState>, Path(event): Path<String>) -> Response {
    let kind = match event.parse::<EventKind>() {
        Ok(kind) => kind,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    match state.sender.send(kind).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "event": event }))).into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()),
    }
}

pub async fn post_action(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Query(params): Query<ActionParams>,
) -> Response {
    let name = match name.parse::<ActionName>() {
        Ok(name) => name,
        Err(e) => return error_response(StatusCode::NOT_FOUND, &e.to_string()),
    };
    let request = ActionRequest::new(name).with_filters(params.manifest, params.resources);

    match state.sender.request(request).await {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(message)) => error_response(StatusCode::UNPROCESSABLE_ENTITY, &message),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod admin_tests;
