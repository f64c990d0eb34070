//! Event types for wattwatchd -> presentation streaming

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{
    API_VERSION, Alert, Baselines, DashboardSnapshot, PeriodAggregate, SentryTrip, StreakState,
};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: wattwatch_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Full snapshot, recomputed after every ingest or mutation
    StateChanged(DashboardSnapshot),

    /// The top alert changed. None means the alert cleared.
    AlertChanged {
        alert: Option<Alert>,
    },

    /// A sample from a new calendar day arrived
    DayRolledOver {
        /// Aggregate carried into "yesterday"
        yesterday: PeriodAggregate,
        baselines: Baselines,
    },

    /// A sample from a new calendar month arrived
    MonthRolledOver {
        baselines: Baselines,
    },

    /// The daily streak was evaluated
    StreakUpdated {
        streak: StreakState,
        badge: String,
    },

    /// Reading the sample source failed; aggregates were left untouched
    SourceError {
        message: String,
    },

    /// An appliance drew power while the vacation sentry was armed
    SentryTripped(SentryTrip),

    /// Service is shutting down
    Shutdown,
}
