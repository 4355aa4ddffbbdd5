use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::tickets::events::{EventSink, TicketEvent, TicketEventKind};
use crate::features::tickets::models::{
    ActivityType, EscalationRule, RuleAction, Ticket, TicketStatus, TriggerType,
};
use crate::features::tickets::services::business_hours::hours_duration;
use crate::features::tickets::store::{Directory, TicketStore};

const DEFAULT_NO_RESPONSE_HOURS: f64 = 24.0;
const DEFAULT_HOURS_SINCE_CREATION: f64 = 48.0;

/// Evaluates escalation rules against tickets and performs configured
/// actions.
pub struct EscalationEngine {
    store: Arc<dyn TicketStore>,
    directory: Arc<dyn Directory>,
    events: Arc<dyn EventSink>,
}

impl EscalationEngine {
    pub fn new(
        store: Arc<dyn TicketStore>,
        directory: Arc<dyn Directory>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            directory,
            events,
        }
    }

    /// Evaluate every active rule against one ticket, in rule order. After
    /// a rule acts the ticket is re-read so later rules see its effects.
    /// Returns how many rules acted.
    pub async fn evaluate_ticket(&self, ticket_id: Uuid) -> Result<u64> {
        let rules = self.store.list_active_rules().await?;
        let mut ticket = self.store.get(ticket_id).await?;
        let mut actions_taken = 0;

        for rule in &rules {
            if !Self::matches(&ticket, rule, Utc::now()) {
                continue;
            }
            match self.execute(&mut ticket, rule).await {
                Ok(true) => {
                    actions_taken += 1;
                    ticket = self.store.get(ticket_id).await?;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        reference = %ticket.reference,
                        rule = %rule.name,
                        error = %e,
                        "Escalation rule execution failed, continuing"
                    );
                }
            }
        }

        Ok(actions_taken)
    }

    /// Evaluate all active rules against all open tickets: rules outer (in
    /// order), tickets inner. Returns the total number of (rule, ticket)
    /// pairs that acted. One failing pair is logged and never aborts the
    /// batch.
    pub async fn evaluate_all(&self) -> Result<u64> {
        let rules = self.store.list_active_rules().await?;
        let mut tickets = self.store.list_open_tickets().await?;
        let mut actions_taken = 0;

        for rule in &rules {
            for ticket in tickets.iter_mut() {
                if !Self::matches(ticket, rule, Utc::now()) {
                    continue;
                }
                match self.execute(ticket, rule).await {
                    Ok(true) => actions_taken += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(
                            reference = %ticket.reference,
                            rule = %rule.name,
                            error = %e,
                            "Escalation rule execution failed, continuing"
                        );
                    }
                }
            }
        }

        Ok(actions_taken)
    }

    /// Whether a ticket matches a rule: the trigger-type predicate first,
    /// then the generic conditions, all of which must hold.
    pub fn matches(ticket: &Ticket, rule: &EscalationRule, now: DateTime<Utc>) -> bool {
        if !rule.is_active {
            return false;
        }

        let conditions = &rule.conditions;

        match rule.trigger {
            TriggerType::SlaBreach => {
                if !(ticket.sla_first_response_breached || ticket.sla_resolution_breached) {
                    return false;
                }
            }
            TriggerType::NoResponse => {
                let hours = conditions
                    .no_response_hours
                    .unwrap_or(DEFAULT_NO_RESPONSE_HOURS);
                if ticket.created_at > now - hours_duration(hours) {
                    return false;
                }
                if ticket.first_response_at.is_some() {
                    return false;
                }
            }
            TriggerType::TimeBased => {
                let hours = conditions
                    .hours_since_creation
                    .unwrap_or(DEFAULT_HOURS_SINCE_CREATION);
                if ticket.created_at > now - hours_duration(hours) {
                    return false;
                }
            }
            // Checks present state, not a transition: the rule fires while
            // the ticket's current priority matches the condition.
            TriggerType::PriorityChange => {
                if let Some(priority) = &conditions.priority {
                    if !priority.contains(&ticket.priority) {
                        return false;
                    }
                }
            }
            // Driven externally by the reply event; no built-in predicate.
            TriggerType::CustomerReply => {}
        }

        if let Some(statuses) = &conditions.status {
            if !statuses.contains(&ticket.status) {
                return false;
            }
        }
        if let Some(priorities) = &conditions.priority {
            if !priorities.contains(&ticket.priority) {
                return false;
            }
        }
        if let Some(department_id) = conditions.department_id {
            if ticket.department_id != Some(department_id) {
                return false;
            }
        }
        if conditions.unassigned_only.unwrap_or(false) && ticket.assigned_to.is_some() {
            return false;
        }

        true
    }

    /// Apply the rule's actions to the ticket as one mutation batch. Each
    /// action is independent; an unresolvable agent or department is logged
    /// and skipped. Persists once, with a single escalation activity, when
    /// anything actually changed. Returns whether anything did.
    async fn execute(&self, ticket: &mut Ticket, rule: &EscalationRule) -> Result<bool> {
        let mut acted = false;

        for action in rule.actions.to_list() {
            match action {
                RuleAction::SetPriority(new_priority) => {
                    if ticket.priority != new_priority {
                        let old_priority = ticket.priority;
                        ticket.priority = new_priority;
                        acted = true;
                        tracing::info!(
                            rule = %rule.name,
                            reference = %ticket.reference,
                            old_priority = %old_priority,
                            new_priority = %new_priority,
                            "Escalation rule changed priority"
                        );
                    }
                }
                RuleAction::Escalate => {
                    if ticket.status != TicketStatus::Escalated {
                        ticket.status = TicketStatus::Escalated;
                        acted = true;
                        self.events.publish(TicketEvent {
                            ticket_id: ticket.id,
                            reference: ticket.reference.clone(),
                            actor: None,
                            kind: TicketEventKind::Escalated {
                                reason: format!("Escalation rule: {}", rule.name),
                            },
                        });
                    }
                }
                RuleAction::AssignTo(agent_id) => {
                    match self.directory.resolve_agent(agent_id).await? {
                        Some(agent) => {
                            if ticket.assigned_to != Some(agent.id) {
                                ticket.assigned_to = Some(agent.id);
                                acted = true;
                                tracing::info!(
                                    rule = %rule.name,
                                    reference = %ticket.reference,
                                    agent = %agent.name,
                                    "Escalation rule assigned ticket"
                                );
                            }
                        }
                        None => {
                            tracing::warn!(
                                rule = %rule.name,
                                agent_id = %agent_id,
                                "Escalation rule references unknown agent, skipping action"
                            );
                        }
                    }
                }
                RuleAction::MoveToDepartment(department_id) => {
                    match self.directory.resolve_department(department_id).await? {
                        Some(department) => {
                            if ticket.department_id != Some(department.id) {
                                ticket.department_id = Some(department.id);
                                acted = true;
                            }
                        }
                        None => {
                            tracing::warn!(
                                rule = %rule.name,
                                department_id = %department_id,
                                "Escalation rule references unknown department, skipping action"
                            );
                        }
                    }
                }
            }
        }

        if acted {
            ticket.updated_at = Utc::now();
            self.store.save(ticket).await?;
            self.store
                .append_activity(
                    ticket.id,
                    ActivityType::Escalated,
                    serde_json::json!({
                        "rule_id": rule.id,
                        "rule_name": rule.name,
                        "actions": rule.actions,
                    }),
                    None,
                )
                .await?;
        }

        Ok(acted)
    }
}
