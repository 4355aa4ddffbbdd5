use chrono::Duration;
use uuid::Uuid;

use crate::features::tickets::models::{TicketPriority, TicketStatus};

/// Which SLA deadline was breached or is about to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreachKind {
    FirstResponse,
    Resolution,
}

impl BreachKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BreachKind::FirstResponse => "first_response",
            BreachKind::Resolution => "resolution",
        }
    }
}

impl std::fmt::Display for BreachKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain event emitted by the engines. Consumed by out-of-process listeners
/// (notifications, webhooks) through an injected sink.
#[derive(Debug, Clone)]
pub struct TicketEvent {
    pub ticket_id: Uuid,
    pub reference: String,
    /// Acting identity; None for system or guest actions.
    pub actor: Option<Uuid>,
    pub kind: TicketEventKind,
}

#[derive(Debug, Clone)]
pub enum TicketEventKind {
    Created,
    Updated {
        changes: serde_json::Value,
    },
    StatusChanged {
        old_status: TicketStatus,
        new_status: TicketStatus,
    },
    Assigned {
        agent_id: Uuid,
    },
    Unassigned {
        previous_agent_id: Option<Uuid>,
    },
    PriorityChanged {
        old_priority: TicketPriority,
        new_priority: TicketPriority,
    },
    Escalated {
        reason: String,
    },
    Resolved,
    Closed,
    Reopened,
    ReplyRecorded,
    InternalNoteAdded,
    SlaBreached {
        kind: BreachKind,
    },
    SlaWarning {
        kind: BreachKind,
        remaining: Duration,
    },
    TagAdded {
        tag: String,
    },
    TagRemoved {
        tag: String,
    },
    DepartmentChanged {
        old_department_id: Option<Uuid>,
        new_department_id: Uuid,
    },
}

/// Receives domain events as they happen. Implementations must not assume
/// the originating mutation is already persisted.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: TicketEvent);
}

/// Default sink: structured log lines, one per event.
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: TicketEvent) {
        match &event.kind {
            TicketEventKind::SlaBreached { kind } => {
                tracing::warn!(
                    reference = %event.reference,
                    breach_type = %kind,
                    "SLA breached"
                );
            }
            TicketEventKind::SlaWarning { kind, remaining } => {
                tracing::warn!(
                    reference = %event.reference,
                    warning_type = %kind,
                    remaining_minutes = remaining.num_minutes(),
                    "SLA deadline approaching"
                );
            }
            TicketEventKind::Escalated { reason } => {
                tracing::warn!(reference = %event.reference, %reason, "Ticket escalated");
            }
            kind => {
                tracing::info!(reference = %event.reference, ?kind, "Ticket event");
            }
        }
    }
}

/// Captures every published event; intended for tests and embedders that
/// dispatch events after the fact.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: std::sync::Mutex<Vec<TicketEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<TicketEvent> {
        std::mem::take(&mut self.events.lock().expect("event sink poisoned"))
    }

    pub fn snapshot(&self) -> Vec<TicketEvent> {
        self.events.lock().expect("event sink poisoned").clone()
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: TicketEvent) {
        self.events.lock().expect("event sink poisoned").push(event);
    }
}
