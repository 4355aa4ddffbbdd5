use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::tickets::models::{
    ActivityType, EscalationRule, RuleActions, RuleConditions, SlaPolicy, Ticket, TicketActivity,
};
use crate::features::tickets::store::{AgentRef, DepartmentRef, Directory, TicketStore};

const TICKET_COLUMNS: &str = "id, reference, subject, description, requester_id, assigned_to, \
     department_id, sla_policy_id, status, priority, channel, tags, \
     first_response_at, first_response_due_at, resolution_due_at, \
     sla_first_response_breached, sla_resolution_breached, \
     resolved_at, closed_at, created_at, updated_at";

/// Postgres-backed ticket store over the `escalated_*` schema
/// (`migrations/0001_escalated.sql`). Uses runtime queries so the crate
/// builds without a live database.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TicketRow {
    id: Uuid,
    reference: String,
    subject: String,
    description: String,
    requester_id: Option<Uuid>,
    assigned_to: Option<Uuid>,
    department_id: Option<Uuid>,
    sla_policy_id: Option<Uuid>,
    status: String,
    priority: String,
    channel: String,
    tags: Vec<String>,
    first_response_at: Option<DateTime<Utc>>,
    first_response_due_at: Option<DateTime<Utc>>,
    resolution_due_at: Option<DateTime<Utc>>,
    sla_first_response_breached: bool,
    sla_resolution_breached: bool,
    resolved_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = AppError;

    fn try_from(row: TicketRow) -> Result<Self> {
        Ok(Ticket {
            id: row.id,
            reference: row.reference,
            subject: row.subject,
            description: row.description,
            requester_id: row.requester_id,
            assigned_to: row.assigned_to,
            department_id: row.department_id,
            sla_policy_id: row.sla_policy_id,
            status: row.status.parse().map_err(AppError::Internal)?,
            priority: row.priority.parse().map_err(AppError::Internal)?,
            channel: row.channel,
            tags: row.tags,
            first_response_at: row.first_response_at,
            first_response_due_at: row.first_response_due_at,
            resolution_due_at: row.resolution_due_at,
            sla_first_response_breached: row.sla_first_response_breached,
            sla_resolution_breached: row.sla_resolution_breached,
            resolved_at: row.resolved_at,
            closed_at: row.closed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PolicyRow {
    id: Uuid,
    name: String,
    description: String,
    is_default: bool,
    first_response_hours: Json<HashMap<crate::features::tickets::models::TicketPriority, f64>>,
    resolution_hours: Json<HashMap<crate::features::tickets::models::TicketPriority, f64>>,
    business_hours_only: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PolicyRow> for SlaPolicy {
    fn from(row: PolicyRow) -> Self {
        SlaPolicy {
            id: row.id,
            name: row.name,
            description: row.description,
            is_default: row.is_default,
            first_response_hours: row.first_response_hours.0,
            resolution_hours: row.resolution_hours.0,
            business_hours_only: row.business_hours_only,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RuleRow {
    id: Uuid,
    name: String,
    description: String,
    trigger_type: String,
    conditions: Json<RuleConditions>,
    actions: Json<RuleActions>,
    order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RuleRow> for EscalationRule {
    type Error = AppError;

    fn try_from(row: RuleRow) -> Result<Self> {
        Ok(EscalationRule {
            id: row.id,
            name: row.name,
            description: row.description,
            trigger: row.trigger_type.parse().map_err(AppError::Internal)?,
            conditions: row.conditions.0,
            actions: row.actions.0,
            order: row.order,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ActivityRow {
    id: Uuid,
    ticket_id: Uuid,
    activity_type: String,
    properties: serde_json::Value,
    causer_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for TicketActivity {
    type Error = AppError;

    fn try_from(row: ActivityRow) -> Result<Self> {
        Ok(TicketActivity {
            id: row.id,
            ticket_id: row.ticket_id,
            activity_type: row.activity_type.parse().map_err(AppError::Internal)?,
            properties: row.properties,
            causer_id: row.causer_id,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl TicketStore for PgStore {
    async fn get(&self, id: Uuid) -> Result<Ticket> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {} FROM escalated_tickets WHERE id = $1",
            TICKET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Ticket::try_from)
            .transpose()?
            .ok_or_else(|| AppError::NotFound(format!("Ticket '{}' not found", id)))
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {} FROM escalated_tickets WHERE reference = $1",
            TICKET_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Ticket::try_from).transpose()
    }

    async fn insert(&self, ticket: &Ticket) -> Result<()> {
        sqlx::query(
            "INSERT INTO escalated_tickets (
                id, reference, subject, description, requester_id, assigned_to,
                department_id, sla_policy_id, status, priority, channel, tags,
                first_response_at, first_response_due_at, resolution_due_at,
                sla_first_response_breached, sla_resolution_breached,
                resolved_at, closed_at, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21
            )",
        )
        .bind(ticket.id)
        .bind(&ticket.reference)
        .bind(&ticket.subject)
        .bind(&ticket.description)
        .bind(ticket.requester_id)
        .bind(ticket.assigned_to)
        .bind(ticket.department_id)
        .bind(ticket.sla_policy_id)
        .bind(ticket.status.as_str())
        .bind(ticket.priority.as_str())
        .bind(&ticket.channel)
        .bind(&ticket.tags)
        .bind(ticket.first_response_at)
        .bind(ticket.first_response_due_at)
        .bind(ticket.resolution_due_at)
        .bind(ticket.sla_first_response_breached)
        .bind(ticket.sla_resolution_breached)
        .bind(ticket.resolved_at)
        .bind(ticket.closed_at)
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save(&self, ticket: &Ticket) -> Result<()> {
        let result = sqlx::query(
            "UPDATE escalated_tickets SET
                subject = $2, description = $3, requester_id = $4,
                assigned_to = $5, department_id = $6, sla_policy_id = $7,
                status = $8, priority = $9, channel = $10, tags = $11,
                first_response_at = $12, first_response_due_at = $13,
                resolution_due_at = $14, sla_first_response_breached = $15,
                sla_resolution_breached = $16, resolved_at = $17,
                closed_at = $18, updated_at = $19
            WHERE id = $1",
        )
        .bind(ticket.id)
        .bind(&ticket.subject)
        .bind(&ticket.description)
        .bind(ticket.requester_id)
        .bind(ticket.assigned_to)
        .bind(ticket.department_id)
        .bind(ticket.sla_policy_id)
        .bind(ticket.status.as_str())
        .bind(ticket.priority.as_str())
        .bind(&ticket.channel)
        .bind(&ticket.tags)
        .bind(ticket.first_response_at)
        .bind(ticket.first_response_due_at)
        .bind(ticket.resolution_due_at)
        .bind(ticket.sla_first_response_breached)
        .bind(ticket.sla_resolution_breached)
        .bind(ticket.resolved_at)
        .bind(ticket.closed_at)
        .bind(ticket.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Ticket '{}' not found",
                ticket.id
            )));
        }

        Ok(())
    }

    async fn append_activity(
        &self,
        ticket_id: Uuid,
        activity_type: ActivityType,
        properties: serde_json::Value,
        causer_id: Option<Uuid>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO escalated_activities (
                id, ticket_id, activity_type, properties, causer_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(ticket_id)
        .bind(activity_type.as_str())
        .bind(properties)
        .bind(causer_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_activities(&self, ticket_id: Uuid) -> Result<Vec<TicketActivity>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            "SELECT id, ticket_id, activity_type, properties, causer_id, created_at
             FROM escalated_activities
             WHERE ticket_id = $1
             ORDER BY created_at ASC",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TicketActivity::try_from).collect()
    }

    async fn list_open_tickets(&self) -> Result<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {} FROM escalated_tickets
             WHERE status IN (
                 'open', 'in_progress', 'waiting_on_customer',
                 'waiting_on_agent', 'escalated', 'reopened'
             )
             ORDER BY created_at ASC",
            TICKET_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Ticket::try_from).collect()
    }

    async fn list_resolved_before(&self, instant: DateTime<Utc>) -> Result<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {} FROM escalated_tickets
             WHERE status = 'resolved'
               AND resolved_at IS NOT NULL
               AND resolved_at < $1
             ORDER BY created_at ASC",
            TICKET_COLUMNS
        ))
        .bind(instant)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Ticket::try_from).collect()
    }

    async fn get_policy(&self, id: Uuid) -> Result<Option<SlaPolicy>> {
        let row = sqlx::query_as::<_, PolicyRow>(
            "SELECT id, name, description, is_default, first_response_hours,
                    resolution_hours, business_hours_only, is_active,
                    created_at, updated_at
             FROM escalated_sla_policies
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SlaPolicy::from))
    }

    async fn default_policy(&self) -> Result<Option<SlaPolicy>> {
        let row = sqlx::query_as::<_, PolicyRow>(
            "SELECT id, name, description, is_default, first_response_hours,
                    resolution_hours, business_hours_only, is_active,
                    created_at, updated_at
             FROM escalated_sla_policies
             WHERE is_default = TRUE AND is_active = TRUE
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SlaPolicy::from))
    }

    async fn list_active_rules(&self) -> Result<Vec<EscalationRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(
            "SELECT id, name, description, trigger_type, conditions, actions,
                    \"order\", is_active, created_at, updated_at
             FROM escalated_escalation_rules
             WHERE is_active = TRUE
             ORDER BY \"order\" ASC, name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EscalationRule::try_from).collect()
    }
}

/// Directory backed by the `escalated_agents` / `escalated_departments`
/// tables.
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct NamedRow {
    id: Uuid,
    name: String,
}

#[async_trait]
impl Directory for PgDirectory {
    async fn resolve_agent(&self, id: Uuid) -> Result<Option<AgentRef>> {
        let row = sqlx::query_as::<_, NamedRow>(
            "SELECT id, name FROM escalated_agents WHERE id = $1 AND is_active = TRUE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AgentRef {
            id: r.id,
            name: r.name,
        }))
    }

    async fn resolve_department(&self, id: Uuid) -> Result<Option<DepartmentRef>> {
        let row = sqlx::query_as::<_, NamedRow>(
            "SELECT id, name FROM escalated_departments WHERE id = $1 AND is_active = TRUE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| DepartmentRef {
            id: r.id,
            name: r.name,
        }))
    }
}
