use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::core::error::Result;
use crate::features::tickets::events::{BreachKind, EventSink, TicketEvent, TicketEventKind};
use crate::features::tickets::models::{ActivityType, SlaPolicy, Ticket};
use crate::features::tickets::services::business_hours::{
    add_business_hours, hours_duration, BusinessCalendar,
};
use crate::features::tickets::store::TicketStore;

/// Result of one SLA sweep over the open ticket population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub breached: u64,
    pub warned: u64,
}

/// SLA policy enforcement: deadline calculation, breach detection, and
/// approaching-deadline warnings.
pub struct SlaEngine {
    store: Arc<dyn TicketStore>,
    events: Arc<dyn EventSink>,
    calendar: BusinessCalendar,
}

impl SlaEngine {
    pub fn new(
        store: Arc<dyn TicketStore>,
        events: Arc<dyn EventSink>,
        calendar: BusinessCalendar,
    ) -> Self {
        Self {
            store,
            events,
            calendar,
        }
    }

    /// Write both due-date fields from the ticket's attached policy.
    /// Mutates in place; the caller is responsible for saving. No-op when no
    /// policy is attached or the policy has no hours entry for the ticket's
    /// priority.
    pub async fn apply_deadlines(&self, ticket: &mut Ticket) -> Result<()> {
        let Some(policy_id) = ticket.sla_policy_id else {
            return Ok(());
        };
        let Some(policy) = self.store.get_policy(policy_id).await? else {
            return Ok(());
        };

        compute_deadlines(ticket, &policy, &self.calendar, Utc::now());
        Ok(())
    }

    /// Flag newly passed deadlines on one ticket. Monotonic: flags only go
    /// false -> true, and a re-run never re-flags. Persists (and logs an
    /// activity and emits an event per breach) only when something changed.
    /// Returns whether any breach was newly detected.
    pub async fn check_breach(&self, ticket: &mut Ticket) -> Result<bool> {
        if !ticket.is_open() {
            return Ok(false);
        }

        let now = Utc::now();
        let mut newly_breached = Vec::new();

        if let Some(due) = ticket.first_response_due_at {
            if ticket.first_response_at.is_none()
                && !ticket.sla_first_response_breached
                && now > due
            {
                ticket.sla_first_response_breached = true;
                newly_breached.push(BreachKind::FirstResponse);
            }
        }

        if let Some(due) = ticket.resolution_due_at {
            if ticket.resolved_at.is_none() && !ticket.sla_resolution_breached && now > due {
                ticket.sla_resolution_breached = true;
                newly_breached.push(BreachKind::Resolution);
            }
        }

        if newly_breached.is_empty() {
            return Ok(false);
        }

        ticket.updated_at = now;
        self.store.save(ticket).await?;

        for kind in &newly_breached {
            tracing::warn!(
                reference = %ticket.reference,
                breach_type = %kind,
                "SLA breached"
            );
            self.store
                .append_activity(
                    ticket.id,
                    ActivityType::SlaBreached,
                    serde_json::json!({ "breach_type": kind.as_str() }),
                    None,
                )
                .await?;
            self.events.publish(TicketEvent {
                ticket_id: ticket.id,
                reference: ticket.reference.clone(),
                actor: None,
                kind: TicketEventKind::SlaBreached { kind: *kind },
            });
        }

        Ok(true)
    }

    /// Emit a warning event for each deadline that is unsatisfied, not yet
    /// breached, and due within the threshold. No state is persisted, so
    /// successive sweeps may warn again for the same deadline.
    pub async fn check_warning(&self, ticket: &Ticket, threshold_minutes: i64) -> Result<bool> {
        if !ticket.is_open() {
            return Ok(false);
        }

        let now = Utc::now();
        let threshold = Duration::minutes(threshold_minutes);
        let mut warned = false;

        if let Some(due) = ticket.first_response_due_at {
            if ticket.first_response_at.is_none() && !ticket.sla_first_response_breached {
                warned |= self.warn_if_close(ticket, BreachKind::FirstResponse, due, now, threshold);
            }
        }

        if let Some(due) = ticket.resolution_due_at {
            if ticket.resolved_at.is_none() && !ticket.sla_resolution_breached {
                warned |= self.warn_if_close(ticket, BreachKind::Resolution, due, now, threshold);
            }
        }

        Ok(warned)
    }

    fn warn_if_close(
        &self,
        ticket: &Ticket,
        kind: BreachKind,
        due: DateTime<Utc>,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> bool {
        let remaining = due - now;
        if remaining > Duration::zero() && remaining <= threshold {
            self.events.publish(TicketEvent {
                ticket_id: ticket.id,
                reference: ticket.reference.clone(),
                actor: None,
                kind: TicketEventKind::SlaWarning { kind, remaining },
            });
            return true;
        }
        false
    }

    /// Check breaches and warnings for every open ticket with a policy
    /// attached. One bad ticket is logged and skipped, never aborts the
    /// sweep. This is the unit of work a periodic scheduler invokes.
    pub async fn sweep_all(&self, warning_threshold_minutes: i64) -> Result<SweepOutcome> {
        let tickets = self.store.list_open_tickets().await?;
        let mut outcome = SweepOutcome::default();

        for mut ticket in tickets {
            if ticket.sla_policy_id.is_none() {
                continue;
            }

            match self.check_breach(&mut ticket).await {
                Ok(true) => outcome.breached += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        reference = %ticket.reference,
                        error = %e,
                        "SLA breach check failed, skipping ticket"
                    );
                    continue;
                }
            }

            match self.check_warning(&ticket, warning_threshold_minutes).await {
                Ok(true) => outcome.warned += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        reference = %ticket.reference,
                        error = %e,
                        "SLA warning check failed, skipping ticket"
                    );
                }
            }
        }

        Ok(outcome)
    }
}

/// Deadline arithmetic shared with ticket creation: due dates from the
/// policy's per-priority hour budgets, via the business calendar when the
/// policy demands it.
pub fn compute_deadlines(
    ticket: &mut Ticket,
    policy: &SlaPolicy,
    calendar: &BusinessCalendar,
    now: DateTime<Utc>,
) {
    if let Some(hours) = policy.first_response_hours(ticket.priority) {
        ticket.first_response_due_at = Some(if policy.business_hours_only {
            add_business_hours(now, hours, calendar)
        } else {
            now + hours_duration(hours)
        });
    }

    if let Some(hours) = policy.resolution_hours(ticket.priority) {
        ticket.resolution_due_at = Some(if policy.business_hours_only {
            add_business_hours(now, hours, calendar)
        } else {
            now + hours_duration(hours)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::features::tickets::events::RecordingEventSink;
    use crate::features::tickets::models::{TicketPriority, TicketStatus};
    use crate::features::tickets::stores::MemoryStore;
    use crate::shared::test_helpers::{nine_to_five_calendar, open_ticket, policy_with_hours};

    fn engine() -> (Arc<MemoryStore>, Arc<RecordingEventSink>, SlaEngine) {
        let store = Arc::new(MemoryStore::new());
        let events = Arc::new(RecordingEventSink::new());
        let engine = SlaEngine::new(store.clone(), events.clone(), nine_to_five_calendar());
        (store, events, engine)
    }

    #[tokio::test]
    async fn test_apply_deadlines_without_policy_is_noop() {
        let (_store, _events, engine) = engine();
        let mut ticket = open_ticket();

        engine.apply_deadlines(&mut ticket).await.unwrap();

        assert!(ticket.first_response_due_at.is_none());
        assert!(ticket.resolution_due_at.is_none());
    }

    #[tokio::test]
    async fn test_apply_deadlines_skips_priorities_without_hours() {
        let (store, _events, engine) = engine();
        // Policy only budgets High; the ticket is Medium
        let policy = policy_with_hours(
            &[(TicketPriority::High, 4.0)],
            &[(TicketPriority::High, 8.0)],
            false,
        );
        let mut ticket = open_ticket();
        ticket.sla_policy_id = Some(policy.id);
        store.add_policy(policy);

        engine.apply_deadlines(&mut ticket).await.unwrap();

        assert!(ticket.first_response_due_at.is_none());
        assert!(ticket.resolution_due_at.is_none());
    }

    #[test]
    fn test_calendar_arithmetic_is_exact_without_business_hours() {
        let policy = policy_with_hours(
            &[(TicketPriority::Medium, 4.0)],
            &[(TicketPriority::Medium, 24.0)],
            false,
        );
        let mut ticket = open_ticket();
        ticket.sla_policy_id = Some(policy.id);
        let now = Utc::now();

        compute_deadlines(&mut ticket, &policy, &nine_to_five_calendar(), now);

        assert_eq!(ticket.first_response_due_at, Some(now + Duration::hours(4)));
        assert_eq!(ticket.resolution_due_at, Some(now + Duration::hours(24)));
    }

    #[test]
    fn test_fractional_hours_without_business_hours() {
        let policy = policy_with_hours(&[(TicketPriority::Medium, 0.5)], &[], false);
        let mut ticket = open_ticket();
        let now = Utc::now();

        compute_deadlines(&mut ticket, &policy, &nine_to_five_calendar(), now);

        assert_eq!(
            ticket.first_response_due_at,
            Some(now + Duration::minutes(30))
        );
        assert!(ticket.resolution_due_at.is_none());
    }

    #[tokio::test]
    async fn test_check_breach_flags_once() {
        let (store, events, engine) = engine();
        let mut ticket = open_ticket();
        ticket.sla_policy_id = Some(uuid::Uuid::new_v4());
        ticket.first_response_due_at = Some(Utc::now() - Duration::hours(1));
        store.insert(&ticket).await.unwrap();

        assert!(engine.check_breach(&mut ticket).await.unwrap());
        assert!(ticket.sla_first_response_breached);

        // Re-running on the already-flagged ticket detects nothing new
        assert!(!engine.check_breach(&mut ticket).await.unwrap());

        let breaches: Vec<_> = store
            .activities_for(ticket.id)
            .into_iter()
            .filter(|a| a.activity_type == ActivityType::SlaBreached)
            .collect();
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].properties["breach_type"], "first_response");

        let breach_events = events
            .take()
            .into_iter()
            .filter(|e| matches!(e.kind, TicketEventKind::SlaBreached { .. }))
            .count();
        assert_eq!(breach_events, 1);
    }

    #[tokio::test]
    async fn test_check_breach_ignores_non_open_tickets() {
        let (store, _events, engine) = engine();
        let mut ticket = open_ticket();
        ticket.status = TicketStatus::Closed;
        ticket.first_response_due_at = Some(Utc::now() - Duration::hours(2));
        store.insert(&ticket).await.unwrap();

        assert!(!engine.check_breach(&mut ticket).await.unwrap());
        assert!(!ticket.sla_first_response_breached);
    }

    #[tokio::test]
    async fn test_resolution_breach_requires_unresolved_ticket() {
        let (store, _events, engine) = engine();
        let mut ticket = open_ticket();
        ticket.resolution_due_at = Some(Utc::now() - Duration::hours(1));
        ticket.resolved_at = Some(Utc::now() - Duration::hours(2));
        store.insert(&ticket).await.unwrap();

        assert!(!engine.check_breach(&mut ticket).await.unwrap());
        assert!(!ticket.sla_resolution_breached);
    }

    #[tokio::test]
    async fn test_check_warning_fires_inside_threshold_and_repeats() {
        let (store, events, engine) = engine();
        let mut ticket = open_ticket();
        ticket.first_response_due_at = Some(Utc::now() + Duration::minutes(10));
        store.insert(&ticket).await.unwrap();

        assert!(engine.check_warning(&ticket, 30).await.unwrap());
        // No state is persisted, so the next sweep warns again
        assert!(engine.check_warning(&ticket, 30).await.unwrap());

        let warnings = events
            .take()
            .into_iter()
            .filter(|e| matches!(e.kind, TicketEventKind::SlaWarning { .. }))
            .count();
        assert_eq!(warnings, 2);
    }

    #[tokio::test]
    async fn test_check_warning_respects_threshold_and_breach_flag() {
        let (_store, events, engine) = engine();
        let mut ticket = open_ticket();
        ticket.first_response_due_at = Some(Utc::now() + Duration::hours(5));

        assert!(!engine.check_warning(&ticket, 30).await.unwrap());

        ticket.first_response_due_at = Some(Utc::now() + Duration::minutes(5));
        ticket.sla_first_response_breached = true;
        assert!(!engine.check_warning(&ticket, 30).await.unwrap());

        assert!(events.take().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_all_counts_and_skips_policyless_tickets() {
        let (store, _events, engine) = engine();

        let mut breached = open_ticket();
        breached.sla_policy_id = Some(uuid::Uuid::new_v4());
        breached.first_response_due_at = Some(Utc::now() - Duration::hours(1));
        store.insert(&breached).await.unwrap();

        let mut warned = open_ticket();
        warned.sla_policy_id = Some(uuid::Uuid::new_v4());
        warned.resolution_due_at = Some(Utc::now() + Duration::minutes(10));
        store.insert(&warned).await.unwrap();

        // Past due but no policy attached: the sweep never looks at it
        let mut policyless = open_ticket();
        policyless.first_response_due_at = Some(Utc::now() - Duration::hours(1));
        store.insert(&policyless).await.unwrap();

        let outcome = engine.sweep_all(30).await.unwrap();
        assert_eq!(outcome, SweepOutcome { breached: 1, warned: 1 });

        let refreshed = store.get(policyless.id).await.unwrap();
        assert!(!refreshed.sla_first_response_breached);
    }
}
