//! Rolling per-period energy sums

use tracing::{debug, info};
use wattwatch_api::{Aggregates, Baselines, PeriodAggregate, Sample};

use crate::{RolloverEvent, compute_initial_baselines, detect_rollover};

/// Owns the today/yesterday/month aggregates and their baselines.
///
/// Samples must be ingested at most once each. The aggregator does not
/// remember keys, so feeding the same sample twice counts it twice.
///
/// A sample older than the start of yesterday contributes to nothing, and a
/// late sample from a day that has already rolled out of "today" only lands
/// in "yesterday" if it still falls inside that window. Nothing is corrected
/// retroactively.
#[derive(Debug, Clone)]
pub struct RollingAggregator {
    aggregates: Aggregates,
    baselines: Baselines,
}

impl RollingAggregator {
    /// Start with empty aggregates and the given baselines
    pub fn new(baselines: Baselines) -> Self {
        Self {
            aggregates: Aggregates::default(),
            baselines,
        }
    }

    /// Start with empty aggregates for the calendar day containing `now`
    pub fn starting_at(now: i64) -> Self {
        Self::new(compute_initial_baselines(now))
    }

    /// Add one sample, applying any rollover it implies first
    pub fn ingest(&mut self, sample: &Sample) -> Option<RolloverEvent> {
        let rollover = self.roll_to(sample.timestamp);

        let delta = sample.energy_delta();
        let ts = sample.timestamp;
        let b = &self.baselines;

        if ts >= b.start_of_month {
            self.aggregates.month.add(&delta);
        }
        if ts >= b.start_of_today {
            self.aggregates.today.add(&delta);
        } else if ts >= b.start_of_yesterday {
            self.aggregates.yesterday.add(&delta);
        } else {
            debug!(
                timestamp = ts,
                start_of_yesterday = b.start_of_yesterday,
                "Sample predates tracked periods, dropped"
            );
        }

        rollover
    }

    /// Advance baselines to the calendar day containing `ts` without adding
    /// energy. Lets "today" reset at midnight even when no sample arrives.
    pub fn roll_to(&mut self, ts: i64) -> Option<RolloverEvent> {
        let event = detect_rollover(ts, &self.baselines)?;
        self.apply(&event);
        Some(event)
    }

    fn apply(&mut self, event: &RolloverEvent) {
        if let Some(month_start) = event.month_start {
            self.aggregates.month = PeriodAggregate::default();
            self.baselines.start_of_month = month_start;
            info!(start_of_month = month_start, "Month rolled over");
        }

        if let Some(day_start) = event.day_start {
            self.aggregates.yesterday = self.aggregates.today;
            self.aggregates.today = PeriodAggregate::default();
            self.baselines.start_of_yesterday = self.baselines.start_of_today;
            self.baselines.start_of_today = day_start;
            info!(
                start_of_today = day_start,
                yesterday_total_wh = self.aggregates.yesterday.total,
                "Day rolled over"
            );
        }
    }

    /// Current aggregates, by value
    pub fn snapshot(&self) -> Aggregates {
        self.aggregates
    }

    pub fn baselines(&self) -> Baselines {
        self.baselines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use wattwatch_api::Reading;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap().timestamp()
    }

    fn reading(energy: f64) -> Option<Reading> {
        Some(Reading {
            energy,
            ..Default::default()
        })
    }

    fn sample(timestamp: i64, e1: f64, e2: f64, e3: f64) -> Sample {
        Sample {
            timestamp,
            load1: reading(e1),
            load2: reading(e2),
            load3: reading(e3),
        }
    }

    fn assert_consistent(agg: &PeriodAggregate) {
        let parts = agg.load1 + agg.load2 + agg.load3;
        assert!(
            (agg.total - parts).abs() < 1e-9,
            "total {} != parts {}",
            agg.total,
            parts
        );
    }

    #[test]
    fn test_ingest_within_day() {
        let mut agg = RollingAggregator::starting_at(ts(2025, 6, 15, 0, 0));
        agg.ingest(&sample(ts(2025, 6, 15, 9, 0), 10.0, 20.0, 5.0));
        agg.ingest(&sample(ts(2025, 6, 15, 9, 1), 1.5, 0.0, 0.25));

        let snap = agg.snapshot();
        assert_eq!(snap.today.load1, 11.5);
        assert_eq!(snap.today.total, 36.75);
        assert_eq!(snap.month, snap.today);
        assert_eq!(snap.yesterday, PeriodAggregate::default());
    }

    #[test]
    fn test_totals_stay_consistent() {
        let mut agg = RollingAggregator::starting_at(ts(2025, 6, 14, 0, 0));
        let mut t = ts(2025, 6, 14, 20, 0);
        for i in 0..500 {
            let f = i as f64;
            agg.ingest(&sample(t, 0.1 * f, 0.37, 1.0 / (f + 3.0)));
            t += 61;

            let snap = agg.snapshot();
            assert_consistent(&snap.today);
            assert_consistent(&snap.yesterday);
            assert_consistent(&snap.month);
        }
    }

    #[test]
    fn test_day_rollover_moves_today_to_yesterday() {
        let mut agg = RollingAggregator::starting_at(ts(2025, 6, 15, 0, 0));
        agg.ingest(&sample(ts(2025, 6, 15, 22, 0), 100.0, 0.0, 0.0));
        agg.ingest(&sample(ts(2025, 6, 15, 23, 59), 50.0, 25.0, 0.0));
        let before = agg.snapshot().today;

        let event = agg.ingest(&sample(ts(2025, 6, 16, 0, 0), 3.0, 0.0, 0.0));
        assert!(event.unwrap().is_day());

        let snap = agg.snapshot();
        assert_eq!(snap.yesterday, before);
        assert_eq!(snap.today.total, 3.0);
        assert_eq!(snap.month.total, 178.0);
        assert_eq!(agg.baselines().start_of_today, ts(2025, 6, 16, 0, 0));
        assert_eq!(agg.baselines().start_of_yesterday, ts(2025, 6, 15, 0, 0));
    }

    #[test]
    fn test_month_rollover_resets_month() {
        let mut agg = RollingAggregator::starting_at(ts(2025, 6, 30, 0, 0));
        agg.ingest(&sample(ts(2025, 6, 30, 12, 0), 400.0, 0.0, 0.0));

        let event = agg.ingest(&sample(ts(2025, 7, 1, 0, 30), 0.0, 8.0, 0.0)).unwrap();
        assert!(event.is_month() && event.is_day());

        let snap = agg.snapshot();
        assert_eq!(snap.month.total, 8.0);
        assert_eq!(snap.today.total, 8.0);
        assert_eq!(snap.yesterday.total, 400.0);
        assert_eq!(agg.baselines().start_of_month, ts(2025, 7, 1, 0, 0));
    }

    #[test]
    fn test_late_sample_lands_in_yesterday() {
        let mut agg = RollingAggregator::starting_at(ts(2025, 6, 16, 0, 0));
        agg.ingest(&sample(ts(2025, 6, 15, 23, 0), 7.0, 0.0, 0.0));

        let snap = agg.snapshot();
        assert_eq!(snap.yesterday.total, 7.0);
        assert_eq!(snap.today.total, 0.0);
        assert_eq!(snap.month.total, 7.0);
    }

    #[test]
    fn test_sample_before_yesterday_is_dropped() {
        let mut agg = RollingAggregator::starting_at(ts(2025, 6, 16, 0, 0));
        agg.ingest(&sample(ts(2025, 6, 14, 12, 0), 9.0, 9.0, 9.0));

        let snap = agg.snapshot();
        assert_eq!(snap.yesterday.total, 0.0);
        assert_eq!(snap.today.total, 0.0);
        // Still inside the month window
        assert_eq!(snap.month.total, 27.0);
    }

    #[test]
    fn test_reingest_doubles_contribution() {
        let mut agg = RollingAggregator::starting_at(ts(2025, 6, 15, 0, 0));
        let s = sample(ts(2025, 6, 15, 10, 0), 12.0, 3.0, 0.0);

        agg.ingest(&s);
        agg.ingest(&s);

        assert_eq!(agg.snapshot().today.total, 30.0);
        assert_eq!(agg.snapshot().today.load1, 24.0);
    }

    #[test]
    fn test_missing_loads_contribute_zero() {
        let mut agg = RollingAggregator::starting_at(ts(2025, 6, 15, 0, 0));
        agg.ingest(&Sample {
            timestamp: ts(2025, 6, 15, 10, 0),
            load1: None,
            load2: reading(4.0),
            load3: None,
        });

        let snap = agg.snapshot();
        assert_eq!(snap.today.load1, 0.0);
        assert_eq!(snap.today.total, 4.0);
    }

    #[test]
    fn test_roll_to_without_sample() {
        let mut agg = RollingAggregator::starting_at(ts(2025, 6, 15, 0, 0));
        agg.ingest(&sample(ts(2025, 6, 15, 18, 0), 5.0, 0.0, 0.0));

        assert!(agg.roll_to(ts(2025, 6, 15, 23, 0)).is_none());
        assert!(agg.roll_to(ts(2025, 6, 16, 0, 10)).is_some());

        let snap = agg.snapshot();
        assert_eq!(snap.yesterday.total, 5.0);
        assert_eq!(snap.today.total, 0.0);
    }
}
