// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for the CoreDNS operator against a live cluster.
//!
//! Each test works in its own namespace and removes everything it created.
//! Cluster-scoped RBAC objects are named per instance, so tests do not
//! collide with each other or with a deployed operator.
//!
//! Run with: cargo test --test simple_integration -- --ignored

#![allow(clippy::items_after_statements)]

mod common;

use common::{cleanup_test_namespace, cluster_context, create_test_namespace, get_kube_client_or_skip};
use coredns_operator::constants::SERVICE_NAME;
use coredns_operator::events::{ActionName, ActionRequest, Event, EventKind};
use coredns_operator::manifests;
use coredns_operator::publisher::Status;
use coredns_operator::reconcilers::actions::run_action;
use coredns_operator::reconcilers::{analyze, Reconciler};
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, PostParams};
use serde_json::json;

/// Desired resources when the target is the operating namespace: the bundled
/// service account is pruned, leaving the role, binding, config map,
/// deployment and service.
const DESIRED_COUNT: usize = 5;

async fn desired_analysis(
    ctx: &coredns_operator::context::Context,
) -> Result<coredns_operator::reconcilers::ResourceAnalysis, Box<dyn std::error::Error>> {
    let config = ctx.config.load().await?;
    let desired = manifests::render(&config, &ctx.identity, &ctx.catalog)?;
    Ok(analyze(ctx.client.as_ref(), &desired, &ctx.identity.provenance()).await?)
}

#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn test_install_then_remove() -> Result<(), Box<dyn std::error::Error>> {
    let Some(client) = get_kube_client_or_skip().await else {
        return Ok(());
    };
    let namespace = "coredns-it-lifecycle";
    create_test_namespace(&client, namespace).await?;

    let ctx = cluster_context(client.clone(), namespace, "1a2b3c4d-lifecycle");
    let mut reconciler = Reconciler::new(ctx.clone()).await;

    println!("Installing into {namespace}");
    let outcome = reconciler.handle(Event::new(EventKind::Install), true).await;
    println!("Install outcome: {outcome:?}");
    assert_eq!(outcome.applied, DESIRED_COUNT, "every desired resource should be applied");
    assert!(
        matches!(outcome.status, Some(Status::Waiting(_) | Status::Active(_))),
        "install should not block: {:?}",
        outcome.status
    );
    assert!(reconciler.state().deployed);

    let analysis = desired_analysis(&ctx).await?;
    assert!(analysis.missing.is_empty(), "missing: {:?}", analysis.missing);
    assert!(!analysis.has_conflicts());
    assert_eq!(analysis.matching.len(), DESIRED_COUNT);

    // Same configuration, nothing to apply
    let again = reconciler
        .handle(Event::new(EventKind::UpdateStatus), true)
        .await;
    assert_eq!(again.applied, 0);

    println!("Removing from {namespace}");
    let removed = reconciler.handle(Event::new(EventKind::Remove), true).await;
    assert!(removed.deleted >= DESIRED_COUNT, "deleted only {}", removed.deleted);
    assert!(matches!(removed.status, Some(Status::Blocked(_))));

    let analysis = desired_analysis(&ctx).await?;
    assert!(analysis.matching.is_empty(), "left behind: {:?}", analysis.matching.keys());

    cleanup_test_namespace(&client, namespace).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn test_non_primary_is_read_only() -> Result<(), Box<dyn std::error::Error>> {
    let Some(client) = get_kube_client_or_skip().await else {
        return Ok(());
    };
    let namespace = "coredns-it-standby";
    create_test_namespace(&client, namespace).await?;

    let ctx = cluster_context(client.clone(), namespace, "5e6f7a8b-standby");
    let mut reconciler = Reconciler::new(ctx.clone()).await;

    let outcome = reconciler.handle(Event::new(EventKind::Install), false).await;
    assert_eq!(outcome.applied, 0);
    assert!(matches!(outcome.status, Some(Status::Waiting(_))));

    let analysis = desired_analysis(&ctx).await?;
    assert_eq!(analysis.missing.len(), DESIRED_COUNT);

    cleanup_test_namespace(&client, namespace).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn test_foreign_service_blocks_install() -> Result<(), Box<dyn std::error::Error>> {
    let Some(client) = get_kube_client_or_skip().await else {
        return Ok(());
    };
    let namespace = "coredns-it-collision";
    create_test_namespace(&client, namespace).await?;

    // A Service with the managed name but without provenance labels
    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    let foreign: Service = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": { "name": SERVICE_NAME },
        "spec": {
            "ports": [{ "name": "dns", "port": 53, "protocol": "UDP" }],
            "selector": { "app": "someone-else" }
        }
    }))?;
    services.create(&PostParams::default(), &foreign).await?;

    let ctx = cluster_context(client.clone(), namespace, "9c0d1e2f-collision");
    let mut reconciler = Reconciler::new(ctx.clone()).await;

    let outcome = reconciler.handle(Event::new(EventKind::Install), true).await;
    assert_eq!(outcome.applied, 0, "nothing may be applied over a collision");
    assert_eq!(
        outcome.status,
        Some(Status::Blocked("1 Kubernetes resource collision".to_string()))
    );

    let listing = run_action(
        &ctx,
        &ActionRequest::new(ActionName::ListResources).with_filters(None, Some("service".to_string())),
        true,
    )
    .await?;
    assert!(listing
        .get("conflicting")
        .is_some_and(|ids| ids.contains(SERVICE_NAME)));

    cleanup_test_namespace(&client, namespace).await?;
    Ok(())
}
