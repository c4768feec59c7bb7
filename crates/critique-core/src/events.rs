//! Review lifecycle events for append-only streaming.
//!
//! Events are the ground truth of a run's progress: plans, step results, and
//! the terminal summary or error all land here, in order, and are never
//! mutated or removed. Readers tail the stream or replay it from the start.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// A unique event ID (UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        EventId(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a published event.
///
/// `KeepAlive` never enters the log; readers synthesize it when a blocking
/// read times out with nothing new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Plan,
    Step,
    KeepAlive,
    Summary,
    Error,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match self {
            EventKind::Plan => "plan",
            EventKind::Step => "step",
            EventKind::KeepAlive => "keep-alive",
            EventKind::Summary => "summary",
            EventKind::Error => "error",
        };
        write!(f, "{token}")
    }
}

/// One unit published to a run's stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub event_id: EventId,
    pub kind: EventKind,
    /// Empty for run-level events.
    #[serde(default)]
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    pub payload: Value,
}

impl ReviewEvent {
    fn new(kind: EventKind, file_path: &str, step_name: Option<&str>, payload: Value) -> Self {
        ReviewEvent {
            event_id: EventId::new(),
            kind,
            file_path: file_path.to_string(),
            step_name: step_name.map(str::to_string),
            payload,
        }
    }

    pub fn plan(file_path: &str, payload: Value) -> Self {
        Self::new(EventKind::Plan, file_path, None, payload)
    }

    pub fn step(file_path: &str, step_name: &str, payload: Value) -> Self {
        Self::new(EventKind::Step, file_path, Some(step_name), payload)
    }

    pub fn summary(payload: Value) -> Self {
        Self::new(EventKind::Summary, "", None, payload)
    }

    pub fn error(file_path: &str, message: &str) -> Self {
        Self::new(EventKind::Error, file_path, None, json!({ "error": message }))
    }

    pub fn keep_alive() -> Self {
        Self::new(EventKind::KeepAlive, "", None, Value::Null)
    }

    /// Whether this event closes its run's stream for readers.
    pub fn is_terminal(&self) -> bool {
        match self.kind {
            EventKind::Summary => true,
            EventKind::Error => self.file_path.is_empty(),
            _ => false,
        }
    }
}

/// A published event with its stream-assigned position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Strictly increasing within one run's stream.
    pub sequence: u64,
    pub event: ReviewEvent,
    pub recorded_at: DateTime<Utc>,
}
