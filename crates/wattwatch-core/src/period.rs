//! Calendar period boundaries and rollover detection
//!
//! Boundaries are second timestamps of local midnights. A rollover is only
//! ever detected going forward: a sample whose own day or month starts later
//! than the tracked one advances the baselines, anything else leaves them be.

use wattwatch_api::Baselines;
use wattwatch_util::{start_of_day, start_of_month, start_of_previous_day};

/// Baseline changes implied by one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloverEvent {
    /// New start of month, when the sample opened a new month
    pub month_start: Option<i64>,
    /// New start of today, when the sample opened a new day
    pub day_start: Option<i64>,
}

impl RolloverEvent {
    pub fn is_month(&self) -> bool {
        self.month_start.is_some()
    }

    pub fn is_day(&self) -> bool {
        self.day_start.is_some()
    }
}

/// Baselines for the local calendar day containing `now`
pub fn compute_initial_baselines(now: i64) -> Baselines {
    Baselines {
        start_of_month: start_of_month(now),
        start_of_today: start_of_day(now),
        start_of_yesterday: start_of_previous_day(now),
    }
}

/// Compare a sample's own day and month starts with the tracked baselines
pub fn detect_rollover(sample_ts: i64, baselines: &Baselines) -> Option<RolloverEvent> {
    let sample_month = start_of_month(sample_ts);
    let sample_day = start_of_day(sample_ts);

    let event = RolloverEvent {
        month_start: (sample_month > baselines.start_of_month).then_some(sample_month),
        day_start: (sample_day > baselines.start_of_today).then_some(sample_day),
    };

    (event.is_month() || event.is_day()).then_some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap().timestamp()
    }

    #[test]
    fn test_initial_baselines() {
        let b = compute_initial_baselines(ts(2025, 6, 15, 13, 45));
        assert_eq!(b.start_of_month, ts(2025, 6, 1, 0, 0));
        assert_eq!(b.start_of_today, ts(2025, 6, 15, 0, 0));
        assert_eq!(b.start_of_yesterday, ts(2025, 6, 14, 0, 0));
        assert!(b.start_of_yesterday < b.start_of_today);
        assert!(b.start_of_today >= b.start_of_month);
    }

    #[test]
    fn test_first_of_month_coincides() {
        let b = compute_initial_baselines(ts(2025, 7, 1, 9, 0));
        assert_eq!(b.start_of_today, b.start_of_month);
        assert_eq!(b.start_of_yesterday, ts(2025, 6, 30, 0, 0));
    }

    #[test]
    fn test_no_rollover_within_day() {
        let b = compute_initial_baselines(ts(2025, 6, 15, 8, 0));
        assert_eq!(detect_rollover(ts(2025, 6, 15, 23, 59), &b), None);
        // Older samples never roll anything back
        assert_eq!(detect_rollover(ts(2025, 6, 13, 12, 0), &b), None);
    }

    #[test]
    fn test_day_rollover() {
        let b = compute_initial_baselines(ts(2025, 6, 15, 8, 0));
        let event = detect_rollover(ts(2025, 6, 16, 0, 1), &b).unwrap();
        assert_eq!(event.day_start, Some(ts(2025, 6, 16, 0, 0)));
        assert!(!event.is_month());
    }

    #[test]
    fn test_month_rollover_is_also_day_rollover() {
        let b = compute_initial_baselines(ts(2025, 6, 30, 22, 0));
        let event = detect_rollover(ts(2025, 7, 1, 0, 5), &b).unwrap();
        assert_eq!(event.month_start, Some(ts(2025, 7, 1, 0, 0)));
        assert_eq!(event.day_start, Some(ts(2025, 7, 1, 0, 0)));
    }
}
