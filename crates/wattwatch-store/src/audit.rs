//! Audit event types

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use wattwatch_api::{Metric, Period, RuleFields, Target};
use wattwatch_util::RuleId;

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    RuleCreated { rule_id: RuleId, fields: RuleFields },

    RuleUpdated { rule_id: RuleId, fields: RuleFields },

    RuleDeleted { rule_id: RuleId },

    /// A sample from a new day arrived
    DayRolledOver {
        start_of_today: i64,
        /// Total Wh carried into "yesterday"
        yesterday_total_wh: f64,
    },

    MonthRolledOver { start_of_month: i64 },

    /// A new top alert was selected
    AlertRaised {
        target: Target,
        period: Period,
        metric: Metric,
        actual: f64,
        message: String,
    },

    /// Daily streak evaluation
    StreakUpdated { date: NaiveDate, count: u32 },

    /// Bulk read or subscription failure
    SourceFailed { message: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: wattwatch_util::now(),
            event,
        }
    }
}
