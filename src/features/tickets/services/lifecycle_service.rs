use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::core::config::TicketConfig;
use crate::core::error::Result;
use crate::features::tickets::events::{EventSink, TicketEvent, TicketEventKind};
use crate::features::tickets::models::{
    ActivityType, NewTicket, Ticket, TicketPriority, TicketStatus,
};
use crate::features::tickets::services::business_hours::BusinessCalendar;
use crate::features::tickets::services::sla_service::compute_deadlines;
use crate::features::tickets::store::{AgentRef, DepartmentRef, TicketStore};

/// Lifecycle settings, parsed once from the raw env config.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub reference_prefix: String,
    pub default_priority: TicketPriority,
    pub auto_close_resolved_after_days: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            reference_prefix: "ESC".to_string(),
            default_priority: TicketPriority::Medium,
            auto_close_resolved_after_days: 7,
        }
    }
}

impl LifecycleConfig {
    pub fn from_config(config: &TicketConfig) -> Self {
        Self {
            reference_prefix: config.reference_prefix.clone(),
            default_priority: config
                .default_priority
                .parse()
                .unwrap_or(TicketPriority::Medium),
            auto_close_resolved_after_days: config.auto_close_resolved_after_days,
        }
    }
}

/// The ticket state machine. Owns transition legality (permissive: any
/// status may follow any other) and timestamp side effects; every mutation
/// appends an activity entry and emits a domain event, and every operation
/// is an idempotent no-op when the target state already holds.
pub struct LifecycleService {
    store: Arc<dyn TicketStore>,
    events: Arc<dyn EventSink>,
    config: LifecycleConfig,
    calendar: BusinessCalendar,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn TicketStore>,
        events: Arc<dyn EventSink>,
        config: LifecycleConfig,
        calendar: BusinessCalendar,
    ) -> Self {
        Self {
            store,
            events,
            config,
            calendar,
        }
    }

    /// Create an Open ticket: generates the reference, attaches the explicit
    /// or default SLA policy and derives its deadlines immediately.
    pub async fn create(&self, new: NewTicket, actor: Option<Uuid>) -> Result<Ticket> {
        let now = Utc::now();

        let policy = match new.sla_policy_id {
            Some(id) => self.store.get_policy(id).await?,
            None => self.store.default_policy().await?,
        };

        let mut ticket = Ticket {
            id: Uuid::new_v4(),
            reference: self.generate_reference().await?,
            subject: new.subject,
            description: new.description,
            requester_id: new.requester_id,
            assigned_to: None,
            department_id: new.department_id,
            sla_policy_id: policy.as_ref().map(|p| p.id),
            status: TicketStatus::Open,
            priority: new.priority.unwrap_or(self.config.default_priority),
            channel: new.channel.unwrap_or_else(|| "web".to_string()),
            tags: new.tags,
            first_response_at: None,
            first_response_due_at: None,
            resolution_due_at: None,
            sla_first_response_breached: false,
            sla_resolution_breached: false,
            resolved_at: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        };

        if let Some(policy) = &policy {
            compute_deadlines(&mut ticket, policy, &self.calendar, now);
        }

        self.store.insert(&ticket).await?;
        self.store
            .append_activity(
                ticket.id,
                ActivityType::Created,
                serde_json::json!({
                    "subject": ticket.subject,
                    "priority": ticket.priority,
                }),
                actor,
            )
            .await?;
        self.publish(&ticket, actor, TicketEventKind::Created);

        tracing::info!(reference = %ticket.reference, "Ticket created");
        Ok(ticket)
    }

    /// Edit subject/description. No-op when nothing actually changes.
    pub async fn update_details(
        &self,
        ticket: &mut Ticket,
        actor: Option<Uuid>,
        subject: Option<String>,
        description: Option<String>,
    ) -> Result<()> {
        let mut changes = serde_json::Map::new();

        if let Some(subject) = subject {
            if subject != ticket.subject {
                changes.insert(
                    "subject".to_string(),
                    serde_json::json!({ "old": ticket.subject, "new": subject }),
                );
                ticket.subject = subject;
            }
        }
        if let Some(description) = description {
            if description != ticket.description {
                changes.insert(
                    "description".to_string(),
                    serde_json::json!({ "old": ticket.description, "new": description }),
                );
                ticket.description = description;
            }
        }

        if changes.is_empty() {
            return Ok(());
        }

        ticket.updated_at = Utc::now();
        self.store.save(ticket).await?;
        self.publish(
            ticket,
            actor,
            TicketEventKind::Updated {
                changes: serde_json::Value::Object(changes),
            },
        );
        Ok(())
    }

    /// Move a ticket to a new status. No-op when the status is unchanged.
    ///
    /// Side effects: Resolved stamps `resolved_at`, Closed stamps
    /// `closed_at`, Reopened clears both. Due dates and breach flags are
    /// deliberately left untouched on reopen (a reopened ticket can still
    /// read as breached against its stale deadline).
    pub async fn transition_status(
        &self,
        ticket: &mut Ticket,
        actor: Option<Uuid>,
        new_status: TicketStatus,
    ) -> Result<()> {
        let old_status = ticket.status;
        if old_status == new_status {
            return Ok(());
        }

        let now = Utc::now();
        ticket.status = new_status;
        match new_status {
            TicketStatus::Resolved => ticket.resolved_at = Some(now),
            TicketStatus::Closed => ticket.closed_at = Some(now),
            TicketStatus::Reopened => {
                ticket.resolved_at = None;
                ticket.closed_at = None;
            }
            _ => {}
        }
        ticket.updated_at = now;
        self.store.save(ticket).await?;

        self.store
            .append_activity(
                ticket.id,
                ActivityType::StatusChanged,
                serde_json::json!({
                    "old_status": old_status,
                    "new_status": new_status,
                }),
                actor,
            )
            .await?;
        self.publish(
            ticket,
            actor,
            TicketEventKind::StatusChanged {
                old_status,
                new_status,
            },
        );

        match new_status {
            TicketStatus::Resolved => self.publish(ticket, actor, TicketEventKind::Resolved),
            TicketStatus::Closed => self.publish(ticket, actor, TicketEventKind::Closed),
            TicketStatus::Reopened => self.publish(ticket, actor, TicketEventKind::Reopened),
            TicketStatus::Escalated => self.publish(
                ticket,
                actor,
                TicketEventKind::Escalated {
                    reason: "Manual escalation".to_string(),
                },
            ),
            _ => {}
        }

        tracing::info!(
            reference = %ticket.reference,
            old_status = %old_status,
            new_status = %new_status,
            "Ticket status changed"
        );
        Ok(())
    }

    /// Assign an agent. An Open ticket is bumped to InProgress as a single
    /// implicit transition (no separate status-changed activity or event).
    pub async fn assign(
        &self,
        ticket: &mut Ticket,
        actor: Option<Uuid>,
        agent: &AgentRef,
    ) -> Result<()> {
        ticket.assigned_to = Some(agent.id);
        if ticket.status == TicketStatus::Open {
            ticket.status = TicketStatus::InProgress;
        }
        ticket.updated_at = Utc::now();
        self.store.save(ticket).await?;

        self.store
            .append_activity(
                ticket.id,
                ActivityType::Assigned,
                serde_json::json!({
                    "agent_id": agent.id,
                    "agent_name": agent.name,
                }),
                actor,
            )
            .await?;
        self.publish(
            ticket,
            actor,
            TicketEventKind::Assigned { agent_id: agent.id },
        );

        tracing::info!(reference = %ticket.reference, agent = %agent.name, "Ticket assigned");
        Ok(())
    }

    /// Clear the assignee, recording who was previously assigned.
    pub async fn unassign(&self, ticket: &mut Ticket, actor: Option<Uuid>) -> Result<()> {
        let previous_agent_id = ticket.assigned_to.take();
        ticket.updated_at = Utc::now();
        self.store.save(ticket).await?;

        self.store
            .append_activity(
                ticket.id,
                ActivityType::Unassigned,
                serde_json::json!({ "previous_agent_id": previous_agent_id }),
                actor,
            )
            .await?;
        self.publish(
            ticket,
            actor,
            TicketEventKind::Unassigned { previous_agent_id },
        );
        Ok(())
    }

    /// Record a reply and apply the waiting-on ping-pong:
    /// - requester reply while WaitingOnCustomer -> WaitingOnAgent
    /// - staff reply while Open/WaitingOnAgent/Reopened -> WaitingOnCustomer
    /// - guest (anonymous) reply while WaitingOnCustomer -> Open
    ///
    /// Internal notes never touch status or SLA. The first non-internal
    /// reply authored by the currently assigned agent stamps
    /// `first_response_at`, exactly once.
    pub async fn record_reply(
        &self,
        ticket: &mut Ticket,
        author: Option<Uuid>,
        is_internal_note: bool,
    ) -> Result<()> {
        if is_internal_note {
            self.store
                .append_activity(
                    ticket.id,
                    ActivityType::NoteAdded,
                    serde_json::json!({ "is_internal": true }),
                    author,
                )
                .await?;
            self.publish(ticket, author, TicketEventKind::InternalNoteAdded);
            return Ok(());
        }

        let is_requester = author.is_some() && author == ticket.requester_id;

        match author {
            Some(_) if is_requester => {
                if ticket.status == TicketStatus::WaitingOnCustomer {
                    self.transition_status(ticket, author, TicketStatus::WaitingOnAgent)
                        .await?;
                }
            }
            Some(_) => {
                if matches!(
                    ticket.status,
                    TicketStatus::Open | TicketStatus::WaitingOnAgent | TicketStatus::Reopened
                ) {
                    self.transition_status(ticket, author, TicketStatus::WaitingOnCustomer)
                        .await?;
                }
            }
            None => {
                if ticket.status == TicketStatus::WaitingOnCustomer {
                    self.transition_status(ticket, None, TicketStatus::Open)
                        .await?;
                }
            }
        }

        if ticket.first_response_at.is_none()
            && author.is_some()
            && ticket.assigned_to == author
        {
            ticket.first_response_at = Some(Utc::now());
            ticket.updated_at = Utc::now();
            self.store.save(ticket).await?;
        }

        self.store
            .append_activity(
                ticket.id,
                ActivityType::ReplyAdded,
                serde_json::json!({ "is_internal": false }),
                author,
            )
            .await?;
        self.publish(ticket, author, TicketEventKind::ReplyRecorded);
        Ok(())
    }

    /// Change priority. No-op when unchanged.
    pub async fn change_priority(
        &self,
        ticket: &mut Ticket,
        actor: Option<Uuid>,
        new_priority: TicketPriority,
    ) -> Result<()> {
        let old_priority = ticket.priority;
        if old_priority == new_priority {
            return Ok(());
        }

        ticket.priority = new_priority;
        ticket.updated_at = Utc::now();
        self.store.save(ticket).await?;

        self.store
            .append_activity(
                ticket.id,
                ActivityType::PriorityChanged,
                serde_json::json!({
                    "old_priority": old_priority,
                    "new_priority": new_priority,
                }),
                actor,
            )
            .await?;
        self.publish(
            ticket,
            actor,
            TicketEventKind::PriorityChanged {
                old_priority,
                new_priority,
            },
        );
        Ok(())
    }

    /// Move the ticket to a department.
    pub async fn change_department(
        &self,
        ticket: &mut Ticket,
        actor: Option<Uuid>,
        department: &DepartmentRef,
    ) -> Result<()> {
        let old_department_id = ticket.department_id;
        ticket.department_id = Some(department.id);
        ticket.updated_at = Utc::now();
        self.store.save(ticket).await?;

        self.store
            .append_activity(
                ticket.id,
                ActivityType::DepartmentChanged,
                serde_json::json!({
                    "old_department_id": old_department_id,
                    "new_department_id": department.id,
                    "new_department_name": department.name,
                }),
                actor,
            )
            .await?;
        self.publish(
            ticket,
            actor,
            TicketEventKind::DepartmentChanged {
                old_department_id,
                new_department_id: department.id,
            },
        );
        Ok(())
    }

    /// Attach a tag. No-op when the ticket already carries it.
    pub async fn add_tag(&self, ticket: &mut Ticket, actor: Option<Uuid>, tag: &str) -> Result<()> {
        if ticket.tags.iter().any(|t| t == tag) {
            return Ok(());
        }

        ticket.tags.push(tag.to_string());
        ticket.updated_at = Utc::now();
        self.store.save(ticket).await?;

        self.store
            .append_activity(
                ticket.id,
                ActivityType::TagAdded,
                serde_json::json!({ "tag": tag }),
                actor,
            )
            .await?;
        self.publish(
            ticket,
            actor,
            TicketEventKind::TagAdded {
                tag: tag.to_string(),
            },
        );
        Ok(())
    }

    /// Remove a tag. No-op when the ticket does not carry it.
    pub async fn remove_tag(
        &self,
        ticket: &mut Ticket,
        actor: Option<Uuid>,
        tag: &str,
    ) -> Result<()> {
        let before = ticket.tags.len();
        ticket.tags.retain(|t| t != tag);
        if ticket.tags.len() == before {
            return Ok(());
        }

        ticket.updated_at = Utc::now();
        self.store.save(ticket).await?;

        self.store
            .append_activity(
                ticket.id,
                ActivityType::TagRemoved,
                serde_json::json!({ "tag": tag }),
                actor,
            )
            .await?;
        self.publish(
            ticket,
            actor,
            TicketEventKind::TagRemoved {
                tag: tag.to_string(),
            },
        );
        Ok(())
    }

    /// Auto-close tickets that have sat in Resolved longer than `days`.
    /// Goes through the state machine so Closed stamps and events fire.
    /// Returns how many tickets were closed; one bad ticket is logged and
    /// skipped.
    pub async fn close_resolved(&self, days: i64) -> Result<u64> {
        let threshold = Utc::now() - Duration::days(days);
        let stale = self.store.list_resolved_before(threshold).await?;
        let mut closed = 0;

        for mut ticket in stale {
            match self
                .transition_status(&mut ticket, None, TicketStatus::Closed)
                .await
            {
                Ok(()) => closed += 1,
                Err(e) => {
                    tracing::error!(
                        reference = %ticket.reference,
                        error = %e,
                        "Auto-close failed, skipping ticket"
                    );
                }
            }
        }

        Ok(closed)
    }

    async fn generate_reference(&self) -> Result<String> {
        loop {
            let candidate = format!(
                "{}-{}",
                self.config.reference_prefix,
                Uuid::new_v4().simple().to_string()[..6].to_uppercase()
            );
            if self.store.find_by_reference(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
    }

    fn publish(&self, ticket: &Ticket, actor: Option<Uuid>, kind: TicketEventKind) {
        self.events.publish(TicketEvent {
            ticket_id: ticket.id,
            reference: ticket.reference.clone(),
            actor,
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::features::tickets::events::RecordingEventSink;
    use crate::features::tickets::stores::MemoryStore;
    use crate::shared::test_helpers::{nine_to_five_calendar, open_ticket, policy_with_hours};

    fn service() -> (Arc<MemoryStore>, Arc<RecordingEventSink>, LifecycleService) {
        let store = Arc::new(MemoryStore::new());
        let events = Arc::new(RecordingEventSink::new());
        let service = LifecycleService::new(
            store.clone(),
            events.clone(),
            LifecycleConfig::default(),
            nine_to_five_calendar(),
        );
        (store, events, service)
    }

    async fn seeded(store: &MemoryStore) -> Ticket {
        let ticket = open_ticket();
        store.insert(&ticket).await.unwrap();
        ticket
    }

    #[tokio::test]
    async fn test_create_attaches_default_policy_and_deadlines() {
        let (store, events, service) = service();
        let policy = policy_with_hours(
            &[(TicketPriority::Medium, 4.0)],
            &[(TicketPriority::Medium, 24.0)],
            false,
        );
        let policy_id = policy.id;
        store.add_policy(policy);

        let ticket = service
            .create(
                NewTicket {
                    subject: "VPN down".to_string(),
                    description: "Cannot connect since this morning.".to_string(),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.priority, TicketPriority::Medium);
        assert_eq!(ticket.sla_policy_id, Some(policy_id));
        assert!(ticket.first_response_due_at.is_some());
        assert!(ticket.resolution_due_at.is_some());
        assert!(ticket.reference.starts_with("ESC-"));

        let activities = store.activities_for(ticket.id);
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].activity_type, ActivityType::Created);

        let recorded = events.take();
        assert_eq!(recorded.len(), 1);
        assert!(matches!(recorded[0].kind, TicketEventKind::Created));
    }

    #[tokio::test]
    async fn test_create_without_policy_leaves_deadlines_unset() {
        let (_store, _events, service) = service();

        let ticket = service.create(NewTicket::default(), None).await.unwrap();

        assert!(ticket.sla_policy_id.is_none());
        assert!(ticket.first_response_due_at.is_none());
        assert!(ticket.resolution_due_at.is_none());
    }

    #[tokio::test]
    async fn test_same_status_transition_is_silent() {
        let (store, events, service) = service();
        let mut ticket = seeded(&store).await;

        service
            .transition_status(&mut ticket, None, TicketStatus::Open)
            .await
            .unwrap();

        assert!(store.activities_for(ticket.id).is_empty());
        assert!(events.take().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_stamps_and_reopen_clears_but_keeps_sla_state() {
        let (store, events, service) = service();
        let mut ticket = seeded(&store).await;
        ticket.first_response_due_at = Some(Utc::now() - Duration::hours(1));
        ticket.sla_first_response_breached = true;

        service
            .transition_status(&mut ticket, None, TicketStatus::Resolved)
            .await
            .unwrap();
        assert!(ticket.resolved_at.is_some());

        service
            .transition_status(&mut ticket, None, TicketStatus::Closed)
            .await
            .unwrap();
        assert!(ticket.closed_at.is_some());

        service
            .transition_status(&mut ticket, None, TicketStatus::Reopened)
            .await
            .unwrap();

        assert!(ticket.resolved_at.is_none());
        assert!(ticket.closed_at.is_none());
        // Breach history and stale deadlines survive a reopen
        assert!(ticket.sla_first_response_breached);
        assert!(ticket.first_response_due_at.is_some());

        let kinds: Vec<_> = events.take().into_iter().map(|e| e.kind).collect();
        assert!(kinds.iter().any(|k| matches!(k, TicketEventKind::Resolved)));
        assert!(kinds.iter().any(|k| matches!(k, TicketEventKind::Closed)));
        assert!(kinds.iter().any(|k| matches!(k, TicketEventKind::Reopened)));
    }

    #[tokio::test]
    async fn test_assign_bumps_open_to_in_progress_without_status_activity() {
        let (store, _events, service) = service();
        let mut ticket = seeded(&store).await;
        let agent = AgentRef {
            id: Uuid::new_v4(),
            name: "Dewi".to_string(),
        };

        service.assign(&mut ticket, None, &agent).await.unwrap();

        assert_eq!(ticket.assigned_to, Some(agent.id));
        assert_eq!(ticket.status, TicketStatus::InProgress);

        let activities = store.activities_for(ticket.id);
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].activity_type, ActivityType::Assigned);
    }

    #[tokio::test]
    async fn test_assign_leaves_non_open_status_alone() {
        let (store, _events, service) = service();
        let mut ticket = open_ticket();
        ticket.status = TicketStatus::InProgress;
        store.insert(&ticket).await.unwrap();
        let agent = AgentRef {
            id: Uuid::new_v4(),
            name: "Dewi".to_string(),
        };

        service.assign(&mut ticket, None, &agent).await.unwrap();

        assert_eq!(ticket.status, TicketStatus::InProgress);
    }

    #[tokio::test]
    async fn test_requester_reply_flips_waiting_on_customer() {
        let (store, _events, service) = service();
        let mut ticket = open_ticket();
        ticket.status = TicketStatus::WaitingOnCustomer;
        store.insert(&ticket).await.unwrap();

        let requester_id = ticket.requester_id;
        service
            .record_reply(&mut ticket, requester_id, false)
            .await
            .unwrap();

        assert_eq!(ticket.status, TicketStatus::WaitingOnAgent);
    }

    #[tokio::test]
    async fn test_requester_reply_elsewhere_leaves_status() {
        let (store, _events, service) = service();
        let mut ticket = open_ticket();
        ticket.status = TicketStatus::InProgress;
        store.insert(&ticket).await.unwrap();

        let requester_id = ticket.requester_id;
        service
            .record_reply(&mut ticket, requester_id, false)
            .await
            .unwrap();

        assert_eq!(ticket.status, TicketStatus::InProgress);
    }

    #[tokio::test]
    async fn test_staff_reply_moves_to_waiting_on_customer() {
        for status in [
            TicketStatus::Open,
            TicketStatus::WaitingOnAgent,
            TicketStatus::Reopened,
        ] {
            let (store, _events, service) = service();
            let mut ticket = open_ticket();
            ticket.status = status;
            store.insert(&ticket).await.unwrap();

            service
                .record_reply(&mut ticket, Some(Uuid::new_v4()), false)
                .await
                .unwrap();

            assert_eq!(ticket.status, TicketStatus::WaitingOnCustomer);
        }
    }

    #[tokio::test]
    async fn test_staff_reply_while_waiting_on_customer_is_inert() {
        let (store, _events, service) = service();
        let mut ticket = open_ticket();
        ticket.status = TicketStatus::WaitingOnCustomer;
        store.insert(&ticket).await.unwrap();

        service
            .record_reply(&mut ticket, Some(Uuid::new_v4()), false)
            .await
            .unwrap();

        assert_eq!(ticket.status, TicketStatus::WaitingOnCustomer);
    }

    #[tokio::test]
    async fn test_anonymous_reply_reopens_waiting_on_customer() {
        let (store, _events, service) = service();
        let mut ticket = open_ticket();
        ticket.status = TicketStatus::WaitingOnCustomer;
        store.insert(&ticket).await.unwrap();

        service.record_reply(&mut ticket, None, false).await.unwrap();

        assert_eq!(ticket.status, TicketStatus::Open);
    }

    #[tokio::test]
    async fn test_internal_note_never_touches_status_or_sla() {
        let (store, events, service) = service();
        let agent_id = Uuid::new_v4();
        let mut ticket = open_ticket();
        ticket.assigned_to = Some(agent_id);
        store.insert(&ticket).await.unwrap();

        service
            .record_reply(&mut ticket, Some(agent_id), true)
            .await
            .unwrap();

        assert_eq!(ticket.status, TicketStatus::Open);
        assert!(ticket.first_response_at.is_none());

        let activities = store.activities_for(ticket.id);
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].activity_type, ActivityType::NoteAdded);

        let recorded = events.take();
        assert_eq!(recorded.len(), 1);
        assert!(matches!(
            recorded[0].kind,
            TicketEventKind::InternalNoteAdded
        ));
    }

    #[tokio::test]
    async fn test_first_response_stamped_once_by_assigned_agent() {
        let (store, _events, service) = service();
        let agent_id = Uuid::new_v4();
        let mut ticket = open_ticket();
        ticket.assigned_to = Some(agent_id);
        store.insert(&ticket).await.unwrap();

        service
            .record_reply(&mut ticket, Some(agent_id), false)
            .await
            .unwrap();
        let stamped = ticket.first_response_at;
        assert!(stamped.is_some());

        service
            .record_reply(&mut ticket, Some(agent_id), false)
            .await
            .unwrap();
        assert_eq!(ticket.first_response_at, stamped);
    }

    #[tokio::test]
    async fn test_unassigned_staff_reply_does_not_stamp_first_response() {
        let (store, _events, service) = service();
        let mut ticket = open_ticket();
        ticket.assigned_to = Some(Uuid::new_v4());
        store.insert(&ticket).await.unwrap();

        service
            .record_reply(&mut ticket, Some(Uuid::new_v4()), false)
            .await
            .unwrap();

        assert!(ticket.first_response_at.is_none());
    }

    #[tokio::test]
    async fn test_change_priority_noop_when_equal() {
        let (store, events, service) = service();
        let mut ticket = seeded(&store).await;

        service
            .change_priority(&mut ticket, None, TicketPriority::Medium)
            .await
            .unwrap();

        assert!(store.activities_for(ticket.id).is_empty());
        assert!(events.take().is_empty());

        service
            .change_priority(&mut ticket, None, TicketPriority::Urgent)
            .await
            .unwrap();

        assert_eq!(ticket.priority, TicketPriority::Urgent);
        assert_eq!(store.activities_for(ticket.id).len(), 1);
    }

    #[tokio::test]
    async fn test_tag_operations_are_idempotent() {
        let (store, _events, service) = service();
        let mut ticket = seeded(&store).await;

        service.add_tag(&mut ticket, None, "billing").await.unwrap();
        service.add_tag(&mut ticket, None, "billing").await.unwrap();
        assert_eq!(ticket.tags, vec!["billing".to_string()]);
        assert_eq!(store.activities_for(ticket.id).len(), 1);

        service
            .remove_tag(&mut ticket, None, "billing")
            .await
            .unwrap();
        service
            .remove_tag(&mut ticket, None, "billing")
            .await
            .unwrap();
        assert!(ticket.tags.is_empty());
        assert_eq!(store.activities_for(ticket.id).len(), 2);
    }

    #[tokio::test]
    async fn test_update_details_records_changes_only() {
        let (store, events, service) = service();
        let mut ticket = seeded(&store).await;
        let original_subject = ticket.subject.clone();

        service
            .update_details(&mut ticket, None, Some(original_subject), None)
            .await
            .unwrap();
        assert!(events.take().is_empty());

        service
            .update_details(&mut ticket, None, Some("New subject".to_string()), None)
            .await
            .unwrap();

        assert_eq!(ticket.subject, "New subject");
        // Detail edits emit an event but no activity entry
        assert!(store.activities_for(ticket.id).is_empty());
        let recorded = events.take();
        assert_eq!(recorded.len(), 1);
        assert!(matches!(recorded[0].kind, TicketEventKind::Updated { .. }));
    }

    #[tokio::test]
    async fn test_close_resolved_only_touches_stale_tickets() {
        let (store, _events, service) = service();

        let mut stale = open_ticket();
        stale.status = TicketStatus::Resolved;
        stale.resolved_at = Some(Utc::now() - Duration::days(10));
        store.insert(&stale).await.unwrap();

        let mut fresh = open_ticket();
        fresh.status = TicketStatus::Resolved;
        fresh.resolved_at = Some(Utc::now() - Duration::days(1));
        store.insert(&fresh).await.unwrap();

        let closed = service.close_resolved(7).await.unwrap();
        assert_eq!(closed, 1);

        assert_eq!(store.get(stale.id).await.unwrap().status, TicketStatus::Closed);
        assert_eq!(store.get(fresh.id).await.unwrap().status, TicketStatus::Resolved);
    }

    #[tokio::test]
    async fn test_generated_references_are_unique() {
        let (_store, _events, service) = service();

        let a = service.create(NewTicket::default(), None).await.unwrap();
        let b = service.create(NewTicket::default(), None).await.unwrap();

        assert_ne!(a.reference, b.reference);
    }
}
