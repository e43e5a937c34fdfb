// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lifecycle events delivered to the reconciler.
//!
//! Events arrive one at a time from an [`EventSource`]. Actions carry a reply
//! channel; every other event is fire-and-forget.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Operator-facing actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionName {
    ListVersions,
    ListResources,
    ScrubResources,
    SyncResources,
}

impl ActionName {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActionName::ListVersions => "list-versions",
            ActionName::ListResources => "list-resources",
            ActionName::ScrubResources => "scrub-resources",
            ActionName::SyncResources => "sync-resources",
        }
    }

    /// Whether the action writes to the cluster.
    #[must_use]
    pub fn is_mutating(self) -> bool {
        matches!(self, ActionName::ScrubResources | ActionName::SyncResources)
    }
}

impl FromStr for ActionName {
    type Err = EventParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list-versions" => Ok(ActionName::ListVersions),
            "list-resources" => Ok(ActionName::ListResources),
            "scrub-resources" => Ok(ActionName::ScrubResources),
            "sync-resources" => Ok(ActionName::SyncResources),
            other => Err(EventParseError::UnknownAction(other.to_string())),
        }
    }
}

/// An action invocation with its optional filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub name: ActionName,
    /// Substring of the manifest name
    pub manifest: Option<String>,
    /// Whitespace-separated kind substrings
    pub resources: Option<String>,
}

impl ActionRequest {
    #[must_use]
    pub fn new(name: ActionName) -> Self {
        Self {
            name,
            manifest: None,
            resources: None,
        }
    }

    #[must_use]
    pub fn with_filters(mut self, manifest: Option<String>, resources: Option<String>) -> Self {
        self.manifest = manifest.filter(|m| !m.is_empty());
        self.resources = resources.filter(|r| !r.is_empty());
        self
    }
}

/// Structured action result, or the failure message.
pub type ActionResult = Result<BTreeMap<String, String>, String>;

/// Kinds of lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Install,
    Upgrade,
    ConfigChanged,
    LeaderElected,
    RelationCreated { consumer: String },
    RelationChanged { consumer: String },
    UpdateStatus,
    Stop,
    Remove,
    Action(ActionRequest),
}

impl EventKind {
    /// Stable name used in logs and metric labels.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Install => "install",
            EventKind::Upgrade => "upgrade",
            EventKind::ConfigChanged => "config-changed",
            EventKind::LeaderElected => "leader-elected",
            EventKind::RelationCreated { .. } => "relation-created",
            EventKind::RelationChanged { .. } => "relation-changed",
            EventKind::UpdateStatus => "update-status",
            EventKind::Stop => "stop",
            EventKind::Remove => "remove",
            EventKind::Action(_) => "action",
        }
    }

    /// Whether the event starts teardown.
    #[must_use]
    pub fn is_teardown(&self) -> bool {
        matches!(self, EventKind::Stop | EventKind::Remove)
    }

    #[must_use]
    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            EventKind::RelationCreated { .. } | EventKind::RelationChanged { .. }
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::RelationCreated { consumer } | EventKind::RelationChanged { consumer } => {
                write!(f, "{}({consumer})", self.name())
            }
            EventKind::Action(request) => write!(f, "action({})", request.name.as_str()),
            _ => f.write_str(self.name()),
        }
    }
}

impl FromStr for EventKind {
    type Err = EventParseError;

    /// Parse the events that can be injected by name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(EventKind::Install),
            "upgrade" => Ok(EventKind::Upgrade),
            "config-changed" => Ok(EventKind::ConfigChanged),
            "leader-elected" => Ok(EventKind::LeaderElected),
            "update-status" => Ok(EventKind::UpdateStatus),
            "stop" => Ok(EventKind::Stop),
            "remove" => Ok(EventKind::Remove),
            other => Err(EventParseError::UnknownEvent(other.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventParseError {
    #[error("Unknown event '{0}'")]
    UnknownEvent(String),

    #[error("Unknown action '{0}'")]
    UnknownAction(String),
}

/// One delivered event.
#[derive(Debug)]
pub struct Event {
    pub kind: EventKind,
    /// Present for actions; receives the action result
    pub reply: Option<oneshot::Sender<ActionResult>>,
}

impl Event {
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self { kind, reply: None }
    }
}

/// Source of lifecycle events.
#[async_trait]
pub trait EventSource: Send {
    /// Next event, or `None` once the source is closed.
    async fn next_event(&mut self) -> Option<Event>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("Event loop is not running")]
    Closed,

    #[error("Event loop dropped the action reply")]
    NoReply,
}

/// Cloneable handle feeding a [`ChannelEventSource`].
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    /// Queue a fire-and-forget event.
    ///
    /// # Errors
    ///
    /// Returns `SendError::Closed` if the loop has stopped.
    pub async fn send(&self, kind: EventKind) -> Result<(), SendError> {
        self.tx
            .send(Event::new(kind))
            .await
            .map_err(|_| SendError::Closed)
    }

    /// Queue an action and wait for its result.
    ///
    /// # Errors
    ///
    /// Returns `SendError` if the loop has stopped or dropped the reply.
    pub async fn request(&self, request: ActionRequest) -> Result<ActionResult, SendError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Event {
                kind: EventKind::Action(request),
                reply: Some(reply),
            })
            .await
            .map_err(|_| SendError::Closed)?;
        rx.await.map_err(|_| SendError::NoReply)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Event source backed by a bounded mpsc channel.
#[derive(Debug)]
pub struct ChannelEventSource {
    rx: mpsc::Receiver<Event>,
}

impl ChannelEventSource {
    #[must_use]
    pub fn channel(capacity: usize) -> (EventSender, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (EventSender { tx }, Self { rx })
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod events_tests;
