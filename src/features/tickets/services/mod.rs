pub mod business_hours;
pub mod escalation_service;
pub mod lifecycle_service;
pub mod sla_service;

pub use business_hours::{add_business_hours, BusinessCalendar};
pub use escalation_service::EscalationEngine;
pub use lifecycle_service::{LifecycleConfig, LifecycleService};
pub use sla_service::{SlaEngine, SweepOutcome};
