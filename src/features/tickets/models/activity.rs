use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tag for append-only audit entries. Never mutated or deleted by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Created,
    StatusChanged,
    PriorityChanged,
    Assigned,
    Unassigned,
    ReplyAdded,
    NoteAdded,
    TagAdded,
    TagRemoved,
    DepartmentChanged,
    Escalated,
    SlaBreached,
}

impl ActivityType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Created => "created",
            ActivityType::StatusChanged => "status_changed",
            ActivityType::PriorityChanged => "priority_changed",
            ActivityType::Assigned => "assigned",
            ActivityType::Unassigned => "unassigned",
            ActivityType::ReplyAdded => "reply_added",
            ActivityType::NoteAdded => "note_added",
            ActivityType::TagAdded => "tag_added",
            ActivityType::TagRemoved => "tag_removed",
            ActivityType::DepartmentChanged => "department_changed",
            ActivityType::Escalated => "escalated",
            ActivityType::SlaBreached => "sla_breached",
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ActivityType::Created),
            "status_changed" => Ok(ActivityType::StatusChanged),
            "priority_changed" => Ok(ActivityType::PriorityChanged),
            "assigned" => Ok(ActivityType::Assigned),
            "unassigned" => Ok(ActivityType::Unassigned),
            "reply_added" => Ok(ActivityType::ReplyAdded),
            "note_added" => Ok(ActivityType::NoteAdded),
            "tag_added" => Ok(ActivityType::TagAdded),
            "tag_removed" => Ok(ActivityType::TagRemoved),
            "department_changed" => Ok(ActivityType::DepartmentChanged),
            "escalated" => Ok(ActivityType::Escalated),
            "sla_breached" => Ok(ActivityType::SlaBreached),
            other => Err(format!("Unknown activity type: {}", other)),
        }
    }
}

/// An immutable audit-log entry attached to a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketActivity {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub activity_type: ActivityType,
    pub properties: serde_json::Value,
    pub causer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
