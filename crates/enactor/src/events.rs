//! Notification layer
//!
//! Events are emitted by the Enactor after the execution-record entry of the
//! instruction that caused them has been appended. Delivery is at least once:
//! an observer that fails (or panics) gets the event one more time. Observer
//! failures are logged and never reach the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};

/// Attempts per observer per event
const DELIVERY_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    NodeCreated,
    NodeDeleted,
    HealthCheckResult { healthy: bool, reason: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub node_id: String,
    pub node_name: String,
    pub infra_name: String,
    pub at: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind, node_id: &str, node_name: &str, infra_name: &str) -> Self {
        Self {
            kind,
            node_id: node_id.to_string(),
            node_name: node_name.to_string(),
            infra_name: infra_name.to_string(),
            at: Utc::now(),
        }
    }

    /// One-line description, e.g. `node created: demo-web-0`
    pub fn summary(&self) -> String {
        match &self.kind {
            EventKind::NodeCreated => format!("node created: {}", self.node_name),
            EventKind::NodeDeleted => format!("node deleted: {}", self.node_name),
            EventKind::HealthCheckResult { healthy: true, .. } => {
                format!("health check passed: {}", self.node_name)
            }
            EventKind::HealthCheckResult { healthy: false, reason } => format!(
                "health check failed: {} ({})",
                self.node_name,
                reason.as_deref().unwrap_or("no reason given")
            ),
        }
    }
}

/// Receiver of run events
pub trait Observer: Send + Sync {
    fn notify(&self, event: &Event) -> anyhow::Result<()>;
}

impl<F> Observer for F
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync,
{
    fn notify(&self, event: &Event) -> anyhow::Result<()> {
        self(event)
    }
}

/// Fans events out to registered observers
#[derive(Clone, Default)]
pub struct Notifier {
    observers: Vec<Arc<dyn Observer>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver `event` to every observer
    pub fn emit(&self, event: &Event) {
        for (i, observer) in self.observers.iter().enumerate() {
            for attempt in 1..=DELIVERY_ATTEMPTS {
                match catch_unwind(AssertUnwindSafe(|| observer.notify(event))) {
                    Ok(Ok(())) => break,
                    Ok(Err(e)) => {
                        log::warn!(
                            "observer {i} failed on '{}' (attempt {attempt}/{DELIVERY_ATTEMPTS}): {e:#}",
                            event.summary()
                        );
                    }
                    Err(_) => {
                        log::warn!(
                            "observer {i} panicked on '{}' (attempt {attempt}/{DELIVERY_ATTEMPTS})",
                            event.summary()
                        );
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Writes every event to the log at info level
pub struct LogObserver;

impl Observer for LogObserver {
    fn notify(&self, event: &Event) -> anyhow::Result<()> {
        log::info!("[{}] {}", event.infra_name, event.summary());
        Ok(())
    }
}

/// Collects events in memory
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of received events matching `pred`
    pub fn count(&self, pred: impl Fn(&EventKind) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| pred(&e.kind))
            .count()
    }
}

impl Observer for EventLog {
    fn notify(&self, event: &Event) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}
