use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dupescope_core::{RecordId, SetId};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditAction {
    Merge,
    Ignore,
    RemoveMember {
        /// The set dropped below two members and is now ignored.
        collapsed: bool,
    },
}

/// One committed transition of a duplicate set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub set_id: SetId,
    pub action: AuditAction,
    /// Records affected by the transition.
    pub record_ids: Vec<RecordId>,
    pub at: DateTime<Utc>,
}

/// Receives one event per successful transition, after it commits.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, event: AuditEvent) {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event);
    }
}

/// Emits events as structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let records = event
            .record_ids
            .iter()
            .map(RecordId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        info!(
            target: "dupescope::audit",
            set = %event.set_id,
            action = ?event.action,
            records = %records,
            at = %event.at.to_rfc3339(),
            "duplicate set transition"
        );
    }
}
