// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The reconciliation control loop.
//!
//! [`Reconciler::handle`] runs one lifecycle event to completion. A normal
//! pass moves through `Evaluating -> Analyzing -> Applying -> Publishing`;
//! teardown moves through `Destroying -> Purging`. Every pass ends `Idle`.
//!
//! Failures are returned as [`ReconcileError`] by each phase and converted to
//! a published [`Status`] here; nothing escapes to the caller.

use crate::config::Configuration;
use crate::context::Context;
use crate::errors::{ReconcileError, MSG_APPLYING};
use crate::events::{Event, EventKind};
use crate::manifests;
use crate::metrics;
use crate::publisher::{RelationData, Status};
use crate::reconcilers::actions::run_action;
use crate::reconcilers::analyzer::{analyze, ResourceAnalysis};
use crate::reconcilers::apply::{apply_all, ApplyReport};
use crate::reconcilers::purge::purge;
use crate::reconcilers::status::{aggregate, publish_relations, service_address};
use crate::resource::ResourceSet;
use crate::state::ReconcileState;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Phase of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Evaluating,
    Analyzing,
    Applying,
    Publishing,
    Destroying,
    Purging,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Evaluating => "evaluating",
            Phase::Analyzing => "analyzing",
            Phase::Applying => "applying",
            Phase::Publishing => "publishing",
            Phase::Destroying => "destroying",
            Phase::Purging => "purging",
        };
        f.write_str(name)
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Status computed by the pass; `None` for actions
    pub status: Option<Status>,
    pub applied: usize,
    pub deleted: usize,
    /// Whether the runtime should re-deliver an event after a backoff
    pub retry: bool,
}

/// Desired state computed in the evaluating phase.
struct Desired {
    config: Configuration,
    resources: ResourceSet,
    version: String,
    hash: String,
}

/// Owns the reconcile state and drives passes against the shared context.
pub struct Reconciler {
    ctx: Arc<Context>,
    state: ReconcileState,
    phase: Phase,
    last_relation: Option<RelationData>,
}

impl Reconciler {
    /// Create a reconciler, loading persisted state.
    ///
    /// An unreadable state slot is logged and treated as initial state.
    pub async fn new(ctx: Arc<Context>) -> Self {
        let mut reconciler = Self::with_state(ctx, ReconcileState::default());
        reconciler.reload_state().await;
        reconciler
    }

    #[must_use]
    pub fn with_state(ctx: Arc<Context>, state: ReconcileState) -> Self {
        Self {
            ctx,
            state,
            phase: Phase::Idle,
            last_relation: None,
        }
    }

    /// Reload persisted state.
    ///
    /// The teardown latch belongs to this process: a stored `destroying` flag
    /// left by an earlier process is ignored, and ours is kept.
    pub async fn reload_state(&mut self) {
        match self.ctx.store.load().await {
            Ok(state) => {
                if state.destroying && !self.state.destroying {
                    debug!("Ignoring teardown latch persisted by an earlier process");
                }
                let destroying = self.state.destroying;
                self.state = state;
                self.state.destroying = destroying;
                debug!(state = ?self.state, "Loaded reconcile state");
            }
            Err(e) => warn!(error = %e, "Failed to load reconcile state, keeping current state"),
        }
    }

    #[must_use]
    pub fn state(&self) -> &ReconcileState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Handle one event to completion.
    pub async fn handle(&mut self, event: Event, primary: bool) -> PassOutcome {
        let Event { kind, reply } = event;
        let start = Instant::now();
        info!(event = %kind, primary, "Handling event");

        if let EventKind::Action(request) = &kind {
            let result = run_action(&self.ctx, request, primary).await;
            if let Err(message) = &result {
                warn!(action = request.name.as_str(), error = %message, "Action failed");
            }
            let outcome = if result.is_ok() { "success" } else { "failure" };
            if let Some(reply) = reply {
                if reply.send(result).is_err() {
                    debug!("Action invoker went away before the result was ready");
                }
            }
            metrics::record_reconciliation(kind.name(), outcome, start.elapsed());
            return PassOutcome::default();
        }

        if kind == EventKind::LeaderElected {
            self.reload_state().await;
        }
        if kind == EventKind::Upgrade {
            // New bundled releases must be applied even if the config is unchanged.
            self.state.config_hash = None;
        }

        let outcome = if kind.is_teardown() || self.state.destroying {
            self.teardown(primary).await
        } else {
            self.reconcile(&kind, primary).await
        };
        self.phase = Phase::Idle;

        let label = outcome.status.as_ref().map_or("none", Status::category);
        metrics::record_reconciliation(kind.name(), label, start.elapsed());
        outcome
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = %self.phase, to = %phase, "Phase transition");
        self.phase = phase;
    }

    async fn teardown(&mut self, primary: bool) -> PassOutcome {
        self.enter(Phase::Destroying);
        self.state.destroying = true;
        let mut outcome = PassOutcome::default();

        if !primary {
            outcome.status = Some(self.removing_status());
            return outcome;
        }
        self.persist_state().await;

        self.enter(Phase::Purging);
        let status = match purge(self.ctx.client.as_ref(), &self.ctx.identity.provenance()).await {
            Ok(report) => {
                outcome.deleted = report.deleted.len();
                self.removing_status()
            }
            Err(e) => {
                let err = ReconcileError::from_client("Failed to purge resources", e);
                error!(error = %err, "Purge failed");
                metrics::record_error(err.metric_label());
                outcome.retry = err.is_retryable();
                err.status()
            }
        };

        self.publish_status(&status).await;
        outcome.status = Some(status);
        outcome
    }

    fn removing_status(&self) -> Status {
        Status::Blocked(format!("Removing {}", self.ctx.identity.app))
    }

    async fn reconcile(&mut self, kind: &EventKind, primary: bool) -> PassOutcome {
        let mut report = ApplyReport::default();
        let result = self.run_pass(kind, primary, &mut report).await;

        let mut outcome = PassOutcome {
            applied: report.applied.len(),
            ..PassOutcome::default()
        };
        let status = match result {
            Ok(status) => status,
            Err(err) => {
                match &err {
                    ReconcileError::ResourceCollision { identities } => {
                        for id in identities {
                            error!(resource = %id, "Resource collision");
                        }
                    }
                    _ => error!(error = %err, "Reconciliation failed"),
                }
                metrics::record_error(err.metric_label());
                outcome.retry = err.is_retryable();
                err.status()
            }
        };

        if primary {
            self.publish_status(&status).await;
        }
        info!(status = %status, applied = outcome.applied, "Reconciliation pass finished");
        outcome.status = Some(status);
        outcome
    }

    async fn run_pass(
        &mut self,
        kind: &EventKind,
        primary: bool,
        report: &mut ApplyReport,
    ) -> Result<Status, ReconcileError> {
        self.enter(Phase::Evaluating);
        let desired = self.evaluate().await?;

        self.enter(Phase::Analyzing);
        let mut analysis = self.analyze(&desired.resources).await?;
        if analysis.has_conflicts() {
            metrics::record_collisions(analysis.conflicting.len());
            return Err(ReconcileError::ResourceCollision {
                identities: analysis.conflicting.iter().cloned().collect(),
            });
        }
        metrics::record_collisions(0);

        if primary {
            if self.state.config_hash.as_deref() == Some(desired.hash.as_str()) {
                debug!(hash = %desired.hash, "Configuration unchanged, skipping apply");
            } else {
                self.enter(Phase::Applying);
                self.publish_status(&Status::Maintenance(MSG_APPLYING.to_string()))
                    .await;
                apply_all(self.ctx.client.as_ref(), &desired.resources, report).await?;

                if report.rbac_forbidden() {
                    return Err(ReconcileError::Authorization);
                }
                self.state.config_hash = Some(desired.hash.clone());
                self.state.deployed = true;
                self.persist_state().await;
                analysis = self.analyze(&desired.resources).await?;
            }
        }

        self.enter(Phase::Publishing);
        let address = service_address(&analysis);
        let status = aggregate(&analysis, &address, &desired.version);
        if primary && status.is_active() {
            let data = RelationData::new(&desired.config.domain(), &address);
            self.publish_relation_data(data, kind.is_relation()).await;
        }
        Ok(status)
    }

    async fn evaluate(&self) -> Result<Desired, ReconcileError> {
        let config = self.ctx.config.load().await?;
        manifests::evaluate(&config)?;
        let release = manifests::resolve_release(&config, &self.ctx.catalog)?;
        let resources = manifests::render_release(&config, &self.ctx.identity, release)?;
        Ok(Desired {
            hash: config.hash(),
            version: release.version.clone(),
            resources,
            config,
        })
    }

    async fn analyze(&self, desired: &ResourceSet) -> Result<ResourceAnalysis, ReconcileError> {
        analyze(self.ctx.client.as_ref(), desired, &self.ctx.identity.provenance())
            .await
            .map_err(|e| ReconcileError::from_client("Failed to analyze resources", e))
    }

    async fn publish_relation_data(&mut self, data: RelationData, force: bool) {
        if !force && self.last_relation.as_ref() == Some(&data) {
            return;
        }
        if publish_relations(self.ctx.publisher.as_ref(), &data).await {
            self.last_relation = Some(data);
        }
    }

    async fn publish_status(&self, status: &Status) {
        if let Err(e) = self.ctx.publisher.set_status(status).await {
            warn!(status = %status, error = %e, "Failed to publish status");
        }
    }

    async fn persist_state(&self) {
        if let Err(e) = self.ctx.store.save(&self.state).await {
            warn!(error = %e, "Failed to persist reconcile state");
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
