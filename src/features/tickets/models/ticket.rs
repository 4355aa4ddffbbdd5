use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ticket lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    WaitingOnCustomer,
    WaitingOnAgent,
    Escalated,
    Resolved,
    Closed,
    Reopened,
}

impl TicketStatus {
    /// Every status except Resolved and Closed counts as open.
    pub const OPEN_STATUSES: [TicketStatus; 6] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::WaitingOnCustomer,
        TicketStatus::WaitingOnAgent,
        TicketStatus::Escalated,
        TicketStatus::Reopened,
    ];

    pub fn is_open(self) -> bool {
        Self::OPEN_STATUSES.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::WaitingOnCustomer => "waiting_on_customer",
            TicketStatus::WaitingOnAgent => "waiting_on_agent",
            TicketStatus::Escalated => "escalated",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
            TicketStatus::Reopened => "reopened",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "waiting_on_customer" => Ok(TicketStatus::WaitingOnCustomer),
            "waiting_on_agent" => Ok(TicketStatus::WaitingOnAgent),
            "escalated" => Ok(TicketStatus::Escalated),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            "reopened" => Ok(TicketStatus::Reopened),
            other => Err(format!("Unknown ticket status: {}", other)),
        }
    }
}

/// Ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
    Critical,
}

impl TicketPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
            TicketPriority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TicketPriority::Low),
            "medium" => Ok(TicketPriority::Medium),
            "high" => Ok(TicketPriority::High),
            "urgent" => Ok(TicketPriority::Urgent),
            "critical" => Ok(TicketPriority::Critical),
            other => Err(format!("Unknown ticket priority: {}", other)),
        }
    }
}

/// The central support-ticket record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    /// Human-readable reference like "ESC-A1B2C3". Immutable once assigned.
    pub reference: String,
    pub subject: String,
    pub description: String,
    /// None for guest tickets.
    pub requester_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub sla_policy_id: Option<Uuid>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub channel: String,
    pub tags: Vec<String>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub first_response_due_at: Option<DateTime<Utc>>,
    pub resolution_due_at: Option<DateTime<Utc>>,
    // Breach flags are monotonic: once set they are never cleared, not even
    // on reopen.
    pub sla_first_response_breached: bool,
    pub sla_resolution_breached: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    pub fn is_resolved(&self) -> bool {
        self.status == TicketStatus::Resolved
    }

    pub fn is_closed(&self) -> bool {
        self.status == TicketStatus::Closed
    }
}

/// Parameters for creating a ticket.
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    pub subject: String,
    pub description: String,
    pub requester_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub sla_policy_id: Option<Uuid>,
    pub priority: Option<TicketPriority>,
    pub channel: Option<String>,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_statuses() {
        assert!(TicketStatus::Open.is_open());
        assert!(TicketStatus::Escalated.is_open());
        assert!(TicketStatus::Reopened.is_open());
        assert!(!TicketStatus::Resolved.is_open());
        assert!(!TicketStatus::Closed.is_open());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::WaitingOnCustomer,
            TicketStatus::WaitingOnAgent,
            TicketStatus::Escalated,
            TicketStatus::Resolved,
            TicketStatus::Closed,
            TicketStatus::Reopened,
        ] {
            assert_eq!(status.as_str().parse::<TicketStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_priority_serde_uses_lowercase() {
        let json = serde_json::to_value(TicketPriority::Urgent).unwrap();
        assert_eq!(json, serde_json::json!("urgent"));
    }
}
