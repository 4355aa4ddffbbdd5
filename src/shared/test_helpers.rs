#[cfg(test)]
use std::collections::HashMap;

#[cfg(test)]
use chrono::{NaiveTime, Utc, Weekday};
#[cfg(test)]
use uuid::Uuid;

#[cfg(test)]
use crate::features::tickets::models::{
    EscalationRule, RuleActions, RuleConditions, SlaPolicy, Ticket, TicketPriority, TicketStatus,
    TriggerType,
};
#[cfg(test)]
use crate::features::tickets::services::business_hours::BusinessCalendar;

#[cfg(test)]
pub fn open_ticket() -> Ticket {
    let now = Utc::now();
    let id = Uuid::new_v4();
    Ticket {
        id,
        reference: format!("ESC-{}", &id.simple().to_string()[..6].to_uppercase()),
        subject: "Printer on fire".to_string(),
        description: "It started as a paper jam.".to_string(),
        requester_id: Some(Uuid::new_v4()),
        assigned_to: None,
        department_id: None,
        sla_policy_id: None,
        status: TicketStatus::Open,
        priority: TicketPriority::Medium,
        channel: "web".to_string(),
        tags: Vec::new(),
        first_response_at: None,
        first_response_due_at: None,
        resolution_due_at: None,
        sla_first_response_breached: false,
        sla_resolution_breached: false,
        resolved_at: None,
        closed_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
pub fn policy_with_hours(
    first_response: &[(TicketPriority, f64)],
    resolution: &[(TicketPriority, f64)],
    business_hours_only: bool,
) -> SlaPolicy {
    let now = Utc::now();
    SlaPolicy {
        id: Uuid::new_v4(),
        name: "Standard".to_string(),
        description: String::new(),
        is_default: true,
        first_response_hours: first_response.iter().copied().collect::<HashMap<_, _>>(),
        resolution_hours: resolution.iter().copied().collect::<HashMap<_, _>>(),
        business_hours_only,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
pub fn rule(
    name: &str,
    trigger: TriggerType,
    conditions: RuleConditions,
    actions: RuleActions,
    order: i32,
) -> EscalationRule {
    let now = Utc::now();
    EscalationRule {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: String::new(),
        trigger,
        conditions,
        actions,
        order,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
pub fn nine_to_five_calendar() -> BusinessCalendar {
    BusinessCalendar::new(
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ],
    )
}
