//! Time utilities for wattwatch
//!
//! Sample keys are integer seconds since the Unix epoch. Every period boundary
//! (start of day, start of month) is computed on the local calendar, so all
//! conversions in this module go through `chrono::Local`.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `WATTWATCH_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is useful
//! for exercising day and month rollovers without waiting for midnight.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-31 23:59:30`)
//!
//! Example:
//! ```bash
//! WATTWATCH_MOCK_TIME="2025-12-31 23:59:30" cargo run -p wattwatchd
//! ```

use chrono::offset::LocalResult;
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone};
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "WATTWATCH_MOCK_TIME";

#[cfg(debug_assertions)]
const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

/// Parse a `WATTWATCH_MOCK_TIME` value, tolerating surrounding whitespace
#[cfg(debug_assertions)]
fn parse_mock_time(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), MOCK_TIME_FORMAT).ok()
}

/// Initialize the mock time offset based on the environment variable.
/// Returns the offset between mock time and real time at process start.
#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                if let Some(naive_dt) = parse_mock_time(&mock_time_str) {
                    if let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() {
                        let real_now = chrono::Local::now();
                        let offset = mock_dt.signed_duration_since(real_now);
                        tracing::info!(
                            mock_time = %mock_time_str,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    } else {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        );
                    }
                } else {
                    tracing::warn!(
                        mock_time = %mock_time_str,
                        expected_format = MOCK_TIME_FORMAT,
                        "Invalid mock time format"
                    );
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// Convert a sample timestamp (seconds) to local time.
///
/// Out-of-range timestamps clamp to the Unix epoch.
pub fn local_datetime(ts: i64) -> DateTime<Local> {
    DateTime::from_timestamp(ts, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .with_timezone(&Local)
}

/// Timestamp (seconds) of the first instant of a local calendar day.
///
/// When DST makes midnight ambiguous the earlier instant wins; when midnight
/// does not exist the first valid local instant after it is used.
pub fn local_midnight(date: NaiveDate) -> i64 {
    let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    first_valid_instant(naive)
}

fn first_valid_instant(naive: NaiveDateTime) -> i64 {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.timestamp(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp(),
        LocalResult::None => {
            // Skipped by a DST gap; gaps are at most a couple of hours
            let mut candidate = naive;
            for _ in 0..8 {
                candidate += chrono::Duration::minutes(15);
                if let Some(dt) = Local.from_local_datetime(&candidate).earliest() {
                    return dt.timestamp();
                }
            }
            naive.and_utc().timestamp()
        }
    }
}

/// First instant of the local calendar day containing `ts`.
pub fn start_of_day(ts: i64) -> i64 {
    local_midnight(local_datetime(ts).date_naive())
}

/// First instant of the local calendar day before the one containing `ts`.
pub fn start_of_previous_day(ts: i64) -> i64 {
    let date = local_datetime(ts).date_naive();
    local_midnight(date.pred_opt().unwrap_or(date))
}

/// First instant of the local calendar month containing `ts`.
pub fn start_of_month(ts: i64) -> i64 {
    let date = local_datetime(ts).date_naive();
    local_midnight(date.with_day(1).unwrap_or(date))
}

/// Number of days in the month of `date`.
pub fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}
