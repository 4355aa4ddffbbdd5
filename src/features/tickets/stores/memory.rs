use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::tickets::models::{
    ActivityType, EscalationRule, SlaPolicy, Ticket, TicketActivity,
};
use crate::features::tickets::store::{AgentRef, DepartmentRef, Directory, TicketStore};

/// In-memory ticket store. Backs the test suite and embedders that bring
/// their own persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    tickets: HashMap<Uuid, Ticket>,
    activities: Vec<TicketActivity>,
    policies: HashMap<Uuid, SlaPolicy>,
    rules: Vec<EscalationRule>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_policy(&self, policy: SlaPolicy) {
        self.lock().policies.insert(policy.id, policy);
    }

    pub fn add_rule(&self, rule: EscalationRule) {
        self.lock().rules.push(rule);
    }

    /// Activity log for a ticket, oldest first.
    pub fn activities_for(&self, ticket_id: Uuid) -> Vec<TicketActivity> {
        self.lock()
            .activities
            .iter()
            .filter(|a| a.ticket_id == ticket_id)
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store poisoned")
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Ticket> {
        self.lock()
            .tickets
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Ticket '{}' not found", id)))
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Ticket>> {
        Ok(self
            .lock()
            .tickets
            .values()
            .find(|t| t.reference == reference)
            .cloned())
    }

    async fn insert(&self, ticket: &Ticket) -> Result<()> {
        self.lock().tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn save(&self, ticket: &Ticket) -> Result<()> {
        let mut inner = self.lock();
        if !inner.tickets.contains_key(&ticket.id) {
            return Err(AppError::NotFound(format!(
                "Ticket '{}' not found",
                ticket.id
            )));
        }
        inner.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn append_activity(
        &self,
        ticket_id: Uuid,
        activity_type: ActivityType,
        properties: serde_json::Value,
        causer_id: Option<Uuid>,
    ) -> Result<()> {
        self.lock().activities.push(TicketActivity {
            id: Uuid::new_v4(),
            ticket_id,
            activity_type,
            properties,
            causer_id,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_activities(&self, ticket_id: Uuid) -> Result<Vec<TicketActivity>> {
        Ok(self.activities_for(ticket_id))
    }

    async fn list_open_tickets(&self) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .lock()
            .tickets
            .values()
            .filter(|t| t.is_open())
            .cloned()
            .collect();
        tickets.sort_by_key(|t| t.created_at);
        Ok(tickets)
    }

    async fn list_resolved_before(&self, instant: DateTime<Utc>) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .lock()
            .tickets
            .values()
            .filter(|t| t.is_resolved() && t.resolved_at.map(|at| at < instant).unwrap_or(false))
            .cloned()
            .collect();
        tickets.sort_by_key(|t| t.created_at);
        Ok(tickets)
    }

    async fn get_policy(&self, id: Uuid) -> Result<Option<SlaPolicy>> {
        Ok(self.lock().policies.get(&id).cloned())
    }

    async fn default_policy(&self) -> Result<Option<SlaPolicy>> {
        Ok(self
            .lock()
            .policies
            .values()
            .find(|p| p.is_default && p.is_active)
            .cloned())
    }

    async fn list_active_rules(&self) -> Result<Vec<EscalationRule>> {
        let mut rules: Vec<EscalationRule> = self
            .lock()
            .rules
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.sort_key());
        Ok(rules)
    }
}

/// In-memory identity resolver to pair with `MemoryStore`.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    agents: Mutex<HashMap<Uuid, AgentRef>>,
    departments: Mutex<HashMap<Uuid, DepartmentRef>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_agent(&self, id: Uuid, name: &str) {
        self.agents.lock().expect("directory poisoned").insert(
            id,
            AgentRef {
                id,
                name: name.to_string(),
            },
        );
    }

    pub fn add_department(&self, id: Uuid, name: &str) {
        self.departments
            .lock()
            .expect("directory poisoned")
            .insert(
                id,
                DepartmentRef {
                    id,
                    name: name.to_string(),
                },
            );
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn resolve_agent(&self, id: Uuid) -> Result<Option<AgentRef>> {
        Ok(self
            .agents
            .lock()
            .expect("directory poisoned")
            .get(&id)
            .cloned())
    }

    async fn resolve_department(&self, id: Uuid) -> Result<Option<DepartmentRef>> {
        Ok(self
            .departments
            .lock()
            .expect("directory poisoned")
            .get(&id)
            .cloned())
    }
}
