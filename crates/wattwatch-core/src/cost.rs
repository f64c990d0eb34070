//! Energy and cost over an arbitrary time range

use chrono::{DateTime, Datelike, Days, Duration, Local, NaiveDate};
use wattwatch_api::{QuickRange, RangeCost, Sample, Tariff};
use wattwatch_util::{local_midnight, start_of_day, start_of_month, start_of_previous_day};

/// Sum per-load energy over `samples` and price it with `tariff`.
///
/// The caller selects the samples, normally through a closed key range on the
/// source. Costs are zero in solar mode.
pub fn range_cost<'a>(
    samples: impl IntoIterator<Item = &'a Sample>,
    tariff: &Tariff,
    solar_mode: bool,
) -> RangeCost {
    let mut wh = [0.0_f64; 3];
    let mut sample_count = 0;

    for sample in samples {
        let delta = sample.energy_delta();
        wh[0] += delta.load1;
        wh[1] += delta.load2;
        wh[2] += delta.load3;
        sample_count += 1;
    }

    let kwh = wh.map(|v| v / 1000.0);
    let rate = if solar_mode { 0.0 } else { tariff.rate };
    let cost = kwh.map(|v| v * rate);

    RangeCost {
        kwh_load1: kwh[0],
        kwh_load2: kwh[1],
        kwh_load3: kwh[2],
        kwh_total: kwh.iter().sum(),
        cost_load1: cost[0],
        cost_load2: cost[1],
        cost_load3: cost[2],
        cost_total: cost.iter().sum(),
        sample_count,
    }
}

/// Resolve a preset to an inclusive `[start, end]` pair of second timestamps.
///
/// Closed ranges (yesterday, last month) end on the last second of their final
/// day; the others end at `now`.
pub fn resolve_quick_range(range: QuickRange, now: DateTime<Local>) -> (i64, i64) {
    let now_ts = now.timestamp();

    match range {
        QuickRange::Last5Minutes => (now_ts - Duration::minutes(5).num_seconds(), now_ts),
        QuickRange::LastHour => (now_ts - Duration::hours(1).num_seconds(), now_ts),
        QuickRange::Last24Hours => (now_ts - Duration::hours(24).num_seconds(), now_ts),
        QuickRange::Today => (start_of_day(now_ts), now_ts),
        QuickRange::Yesterday => (start_of_previous_day(now_ts), start_of_day(now_ts) - 1),
        QuickRange::Last7Days => {
            // Calendar days, so a DST change keeps the wall-clock time
            let start = now
                .checked_sub_days(Days::new(7))
                .map(|dt| dt.timestamp())
                .unwrap_or(now_ts - Duration::days(7).num_seconds());
            (start, now_ts)
        }
        QuickRange::ThisMonth => (start_of_month(now_ts), now_ts),
        QuickRange::LastMonth => {
            let this_month = start_of_month(now_ts);
            (start_of_month(this_month - 1), this_month - 1)
        }
        QuickRange::ThisYear => {
            let start = NaiveDate::from_yo_opt(now.year(), 1)
                .map(local_midnight)
                .unwrap_or_else(|| start_of_month(now_ts));
            (start, now_ts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wattwatch_api::Reading;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn sample(e1: f64, e2: f64, e3: f64) -> Sample {
        let reading = |energy| {
            Some(Reading {
                energy,
                ..Default::default()
            })
        };
        Sample {
            timestamp: 0,
            load1: reading(e1),
            load2: reading(e2),
            load3: reading(e3),
        }
    }

    #[test]
    fn test_range_cost_sums_and_prices() {
        let samples = vec![sample(1000.0, 500.0, 0.0), sample(500.0, 0.0, 250.0)];
        let tariff = Tariff {
            rate: 4.0,
            ..Tariff::default()
        };

        let cost = range_cost(&samples, &tariff, false);
        assert_eq!(cost.sample_count, 2);
        assert_eq!(cost.kwh_load1, 1.5);
        assert_eq!(cost.kwh_load2, 0.5);
        assert_eq!(cost.kwh_load3, 0.25);
        assert_eq!(cost.kwh_total, 2.25);
        assert_eq!(cost.cost_load1, 6.0);
        assert_eq!(cost.cost_total, cost.cost_load1 + cost.cost_load2 + cost.cost_load3);
        assert_eq!(cost.cost_total, 9.0);
    }

    #[test]
    fn test_range_cost_free_in_solar_mode() {
        let samples = vec![sample(2000.0, 0.0, 0.0)];
        let cost = range_cost(&samples, &Tariff::default(), true);
        assert_eq!(cost.kwh_total, 2.0);
        assert_eq!(cost.cost_total, 0.0);
    }

    #[test]
    fn test_empty_range() {
        let cost = range_cost(&[], &Tariff::default(), false);
        assert_eq!(cost.sample_count, 0);
        assert_eq!(cost.kwh_total, 0.0);
    }

    #[test]
    fn test_relative_ranges() {
        let now = at(2025, 6, 15, 14, 30, 0);
        let ts = now.timestamp();

        assert_eq!(resolve_quick_range(QuickRange::Last5Minutes, now), (ts - 300, ts));
        assert_eq!(resolve_quick_range(QuickRange::LastHour, now), (ts - 3600, ts));
        assert_eq!(resolve_quick_range(QuickRange::Last24Hours, now), (ts - 86_400, ts));
        assert_eq!(
            resolve_quick_range(QuickRange::Last7Days, now),
            (at(2025, 6, 8, 14, 30, 0).timestamp(), ts)
        );
    }

    #[test]
    fn test_calendar_ranges() {
        let now = at(2025, 3, 10, 9, 0, 0);
        let ts = now.timestamp();

        assert_eq!(
            resolve_quick_range(QuickRange::Today, now),
            (at(2025, 3, 10, 0, 0, 0).timestamp(), ts)
        );
        assert_eq!(
            resolve_quick_range(QuickRange::Yesterday, now),
            (
                at(2025, 3, 9, 0, 0, 0).timestamp(),
                at(2025, 3, 9, 23, 59, 59).timestamp()
            )
        );
        assert_eq!(
            resolve_quick_range(QuickRange::ThisMonth, now),
            (at(2025, 3, 1, 0, 0, 0).timestamp(), ts)
        );
        assert_eq!(
            resolve_quick_range(QuickRange::LastMonth, now),
            (
                at(2025, 2, 1, 0, 0, 0).timestamp(),
                at(2025, 2, 28, 23, 59, 59).timestamp()
            )
        );
        assert_eq!(
            resolve_quick_range(QuickRange::ThisYear, now),
            (at(2025, 1, 1, 0, 0, 0).timestamp(), ts)
        );
    }

    #[test]
    fn test_last_month_across_year() {
        let now = at(2025, 1, 20, 12, 0, 0);
        assert_eq!(
            resolve_quick_range(QuickRange::LastMonth, now),
            (
                at(2024, 12, 1, 0, 0, 0).timestamp(),
                at(2024, 12, 31, 23, 59, 59).timestamp()
            )
        );
    }
}
