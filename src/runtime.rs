// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Event loop driver and event producers.
//!
//! The [`EventLoop`] pulls one event at a time from an [`EventSource`] and
//! hands it to the [`Reconciler`] together with the current leadership fact.
//! Producers run as independent tasks and only ever enqueue events:
//!
//! - a fixed-interval `update-status` timer
//! - a configuration file poller and SIGHUP (`config-changed`)
//! - leadership transitions (`leader-elected`)
//! - a watcher on relation consumer `ConfigMap`s (`relation-created/changed`)
//!
//! Passes that end on a retryable failure get a re-delivered `update-status`
//! after an exponential backoff. The loop itself never sleeps.

use crate::events::{EventKind, EventSender, EventSource};
use crate::labels::DNS_CONSUMER_LABEL;
use crate::metrics;
use crate::reconcilers::retry::RetryBackoff;
use crate::reconcilers::Reconciler;
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, ResourceExt};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Drives the reconciler from an event source.
pub struct EventLoop<S: EventSource> {
    reconciler: Reconciler,
    source: S,
    sender: EventSender,
    leadership: watch::Receiver<bool>,
    backoff: RetryBackoff,
    pending_retry: Option<JoinHandle<()>>,
}

impl<S: EventSource> EventLoop<S> {
    /// `sender` must feed `source`; it is used to re-deliver events.
    #[must_use]
    pub fn new(
        reconciler: Reconciler,
        source: S,
        sender: EventSender,
        leadership: watch::Receiver<bool>,
    ) -> Self {
        Self {
            reconciler,
            source,
            sender,
            leadership,
            backoff: RetryBackoff::default(),
            pending_retry: None,
        }
    }

    /// Process events until the source closes or `shutdown` resolves.
    ///
    /// Shutdown never starts teardown; an in-flight pass always completes.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Event loop started");

        loop {
            let event = tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, stopping event loop");
                    break;
                }
                event = self.source.next_event() => event,
            };
            let Some(event) = event else {
                info!("Event source closed, stopping event loop");
                break;
            };

            let primary = *self.leadership.borrow();
            metrics::record_leader_status(primary);
            let outcome = self.reconciler.handle(event, primary).await;

            if outcome.retry {
                self.schedule_retry();
            } else if outcome.status.is_some() {
                self.backoff.reset();
            }
        }

        if let Some(pending) = self.pending_retry.take() {
            pending.abort();
        }
    }

    fn schedule_retry(&mut self) {
        let delay = self.backoff.next_delay();
        if let Some(previous) = self.pending_retry.take() {
            previous.abort();
        }
        debug!(delay = ?delay, attempt = self.backoff.attempts, "Scheduling re-delivered update-status");

        let sender = self.sender.clone();
        self.pending_retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(EventKind::UpdateStatus).await.is_err() {
                debug!("Event loop stopped before retry");
            }
        }));
    }
}

/// Emit `update-status` every `interval`, starting one interval from now.
pub fn spawn_update_status_timer(sender: EventSender, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if sender.send(EventKind::UpdateStatus).await.is_err() {
                break;
            }
        }
    })
}

async fn fingerprint(path: &Path) -> Option<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(content) => Some(Sha256::digest(&content).to_vec()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Configuration file unreadable");
            None
        }
    }
}

/// Emit `config-changed` whenever the file content changes.
pub fn spawn_config_poller(sender: EventSender, path: PathBuf, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = fingerprint(&path).await;
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let current = fingerprint(&path).await;
            if current != last {
                info!(path = %path.display(), "Configuration file changed");
                last = current;
                if sender.send(EventKind::ConfigChanged).await.is_err() {
                    break;
                }
            }
        }
    })
}

/// Emit `config-changed` on SIGHUP.
///
/// # Errors
///
/// Returns an error if the signal handler cannot be installed.
pub fn spawn_sighup(sender: EventSender) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    Ok(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading configuration");
            if sender.send(EventKind::ConfigChanged).await.is_err() {
                break;
            }
        }
    }))
}

/// Emit `leader-elected` each time this instance becomes primary.
pub fn spawn_leadership_forwarder(
    sender: EventSender,
    mut leadership: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while leadership.changed().await.is_ok() {
            let primary = *leadership.borrow_and_update();
            metrics::record_leader_status(primary);
            if primary {
                info!("Acquired leadership");
                if sender.send(EventKind::LeaderElected).await.is_err() {
                    break;
                }
            } else {
                warn!("Lost leadership, continuing read-only");
            }
        }
    })
}

/// Watch relation consumer `ConfigMap`s and emit relation events.
pub fn spawn_consumer_watcher(
    sender: EventSender,
    client: Client,
    namespace: &str,
    app: &str,
) -> JoinHandle<()> {
    let api: Api<ConfigMap> = Api::namespaced(client, namespace);
    let config = watcher::Config::default().labels(&format!("{DNS_CONSUMER_LABEL}={app}"));

    tokio::spawn(async move {
        let mut stream = watcher(api, config).default_backoff().boxed();
        while let Some(result) = stream.next().await {
            let kind = match result {
                Ok(watcher::Event::InitApply(cm)) => EventKind::RelationCreated {
                    consumer: cm.name_any(),
                },
                Ok(watcher::Event::Apply(cm)) => EventKind::RelationChanged {
                    consumer: cm.name_any(),
                },
                Ok(_) => continue,
                Err(e) => {
                    error!(error = %e, "Consumer watch failed");
                    continue;
                }
            };
            if sender.send(kind).await.is_err() {
                break;
            }
        }
    })
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = ctrl_c => info!("SIGINT received"),
                _ = terminate.recv() => info!("SIGTERM received"),
            }
        }
        Err(e) => {
            warn!(error = %e, "Cannot install SIGTERM handler, waiting for SIGINT only");
            if ctrl_c.await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod runtime_tests;
