use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::tickets::models::TicketPriority;

/// Named SLA template: per-priority response/resolution budgets in hours.
/// Fractional hours are allowed (e.g. 0.5 for critical first response).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaPolicy {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// At most one policy is default at a time; whoever flips this is
    /// responsible for clearing the previous default.
    pub is_default: bool,
    pub first_response_hours: HashMap<TicketPriority, f64>,
    pub resolution_hours: HashMap<TicketPriority, f64>,
    /// When true, deadline arithmetic only counts time inside the configured
    /// business calendar.
    pub business_hours_only: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlaPolicy {
    pub fn first_response_hours(&self, priority: TicketPriority) -> Option<f64> {
        self.first_response_hours.get(&priority).copied()
    }

    pub fn resolution_hours(&self, priority: TicketPriority) -> Option<f64> {
        self.resolution_hours.get(&priority).copied()
    }
}
