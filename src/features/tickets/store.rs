use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::tickets::models::{
    ActivityType, EscalationRule, SlaPolicy, Ticket, TicketActivity,
};

/// Persistence boundary for tickets, policies, rules and the activity log.
///
/// The engines only ever do single-ticket read-mutate-write cycles plus
/// activity appends through this trait; batch jobs iterate
/// `list_open_tickets` sequentially.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Ticket>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Ticket>>;

    async fn insert(&self, ticket: &Ticket) -> Result<()>;

    async fn save(&self, ticket: &Ticket) -> Result<()>;

    /// Append an immutable audit entry. Entries are never updated or removed.
    async fn append_activity(
        &self,
        ticket_id: Uuid,
        activity_type: ActivityType,
        properties: serde_json::Value,
        causer_id: Option<Uuid>,
    ) -> Result<()>;

    async fn list_activities(&self, ticket_id: Uuid) -> Result<Vec<TicketActivity>>;

    /// All tickets in an open status, oldest first.
    async fn list_open_tickets(&self) -> Result<Vec<Ticket>>;

    /// Resolved tickets whose `resolved_at` is before the given instant.
    async fn list_resolved_before(&self, instant: DateTime<Utc>) -> Result<Vec<Ticket>>;

    async fn get_policy(&self, id: Uuid) -> Result<Option<SlaPolicy>>;

    /// The active default policy, if one exists.
    async fn default_policy(&self) -> Result<Option<SlaPolicy>>;

    /// Active escalation rules sorted by (order, name, id) ascending.
    async fn list_active_rules(&self) -> Result<Vec<EscalationRule>>;
}

/// A resolved agent reference.
#[derive(Debug, Clone)]
pub struct AgentRef {
    pub id: Uuid,
    pub name: String,
}

/// A resolved department reference.
#[derive(Debug, Clone)]
pub struct DepartmentRef {
    pub id: Uuid,
    pub name: String,
}

/// Identity resolution boundary. An unresolvable id is `None`, not an error:
/// escalation actions referencing stale ids are skipped, never fatal.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn resolve_agent(&self, id: Uuid) -> Result<Option<AgentRef>>;

    async fn resolve_department(&self, id: Uuid) -> Result<Option<DepartmentRef>>;
}
