use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::tickets::models::{TicketPriority, TicketStatus};

/// What causes a rule to be considered for a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    SlaBreach,
    /// Matches on *current* priority equality, not on a priority transition.
    /// Preserved verbatim from the legacy rule vocabulary.
    PriorityChange,
    NoResponse,
    CustomerReply,
    TimeBased,
}

impl TriggerType {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerType::SlaBreach => "sla_breach",
            TriggerType::PriorityChange => "priority_change",
            TriggerType::NoResponse => "no_response",
            TriggerType::CustomerReply => "customer_reply",
            TriggerType::TimeBased => "time_based",
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sla_breach" => Ok(TriggerType::SlaBreach),
            "priority_change" => Ok(TriggerType::PriorityChange),
            "no_response" => Ok(TriggerType::NoResponse),
            "customer_reply" => Ok(TriggerType::CustomerReply),
            "time_based" => Ok(TriggerType::TimeBased),
            other => Err(format!("Unknown trigger type: {}", other)),
        }
    }
}

/// A condition value that the legacy wire format allows as either a single
/// value or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: PartialEq> OneOrMany<T> {
    pub fn contains(&self, value: &T) -> bool {
        match self {
            OneOrMany::One(v) => v == value,
            OneOrMany::Many(vs) => vs.contains(value),
        }
    }
}

/// Typed rule conditions. Serializes to the legacy snake_case key/value map,
/// so rules stored by older deployments deserialize unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OneOrMany<TicketStatus>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<OneOrMany<TicketPriority>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unassigned_only: Option<bool>,
    /// NoResponse trigger: hours since creation without a first response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_response_hours: Option<f64>,
    /// TimeBased trigger: hours since creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours_since_creation: Option<f64>,
}

/// Typed rule actions in the legacy wire shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleActions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_priority: Option<TicketPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assign_to_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<Uuid>,
}

/// Closed action vocabulary. One rule may carry any subset; execution order
/// is fixed (priority, escalate, assignment, department).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleAction {
    SetPriority(TicketPriority),
    Escalate,
    AssignTo(Uuid),
    MoveToDepartment(Uuid),
}

impl RuleActions {
    /// Expand the wire shape into the closed action list.
    pub fn to_list(&self) -> Vec<RuleAction> {
        let mut actions = Vec::new();
        if let Some(priority) = self.set_priority {
            actions.push(RuleAction::SetPriority(priority));
        }
        if self.escalate.unwrap_or(false) {
            actions.push(RuleAction::Escalate);
        }
        if let Some(agent_id) = self.assign_to_id {
            actions.push(RuleAction::AssignTo(agent_id));
        }
        if let Some(department_id) = self.department_id {
            actions.push(RuleAction::MoveToDepartment(department_id));
        }
        actions
    }

    pub fn is_empty(&self) -> bool {
        self.to_list().is_empty()
    }
}

/// An ordered, independently evaluated remediation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRule {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub trigger: TriggerType,
    pub conditions: RuleConditions,
    pub actions: RuleActions,
    /// Ascending evaluation order; ties break on name, then id.
    pub order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EscalationRule {
    /// Sort key used everywhere rules are evaluated.
    pub fn sort_key(&self) -> (i32, String, Uuid) {
        (self.order, self.name.clone(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions_accept_single_or_list() {
        let single: RuleConditions =
            serde_json::from_value(serde_json::json!({"status": "open"})).unwrap();
        let list: RuleConditions =
            serde_json::from_value(serde_json::json!({"status": ["open", "reopened"]})).unwrap();

        let status = single.status.unwrap();
        assert!(status.contains(&TicketStatus::Open));
        assert!(!status.contains(&TicketStatus::Reopened));

        let status = list.status.unwrap();
        assert!(status.contains(&TicketStatus::Reopened));
        assert!(!status.contains(&TicketStatus::Closed));
    }

    #[test]
    fn test_legacy_action_map_round_trip() {
        let wire = serde_json::json!({
            "set_priority": "urgent",
            "escalate": true,
            "assign_to_id": "8f5e3e6a-7f4f-4a15-9f57-2f2f6ff3f111"
        });
        let actions: RuleActions = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(serde_json::to_value(&actions).unwrap(), wire);

        let list = actions.to_list();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0], RuleAction::SetPriority(TicketPriority::Urgent));
        assert_eq!(list[1], RuleAction::Escalate);
    }

    #[test]
    fn test_escalate_false_is_not_an_action() {
        let actions: RuleActions =
            serde_json::from_value(serde_json::json!({"escalate": false})).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_empty_conditions_deserialize() {
        let conditions: RuleConditions = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(conditions, RuleConditions::default());
    }
}
