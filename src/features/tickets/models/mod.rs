mod activity;
mod escalation_rule;
mod sla_policy;
mod ticket;

pub use activity::{ActivityType, TicketActivity};
pub use escalation_rule::{
    EscalationRule, OneOrMany, RuleAction, RuleActions, RuleConditions, TriggerType,
};
pub use sla_policy::SlaPolicy;
pub use ticket::{NewTicket, Ticket, TicketPriority, TicketStatus};
