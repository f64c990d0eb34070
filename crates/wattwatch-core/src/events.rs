//! Core events emitted by the engine

use wattwatch_api::{Alert, Baselines, PeriodAggregate, SentryTrip, StreakState};

/// Events emitted by the core engine
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// A new calendar day started
    DayRolledOver {
        yesterday: PeriodAggregate,
        baselines: Baselines,
    },

    /// A new calendar month started
    MonthRolledOver {
        baselines: Baselines,
    },

    /// The top alert changed or cleared
    AlertChanged {
        alert: Option<Alert>,
    },

    /// The A+ streak was evaluated for a new day
    StreakUpdated {
        streak: StreakState,
    },

    /// An appliance ran while the vacation sentry was armed
    SentryTripped(SentryTrip),
}
