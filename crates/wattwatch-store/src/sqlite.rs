//! SQLite-based store implementation

use chrono::{DateTime, Local, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use wattwatch_api::{Aggregates, PeriodAggregate, Rule, StreakState, Tariff};

use crate::{AuditEvent, AuditEventType, Store, StoreError, StoreResult};

const TARIFF_KEY: &str = "tariff";
const SOLAR_MODE_KEY: &str = "solar_mode";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Budget rules, in insertion order
            CREATE TABLE IF NOT EXISTS rules (
                position INTEGER PRIMARY KEY,
                rule_id TEXT NOT NULL UNIQUE,
                rule_json TEXT NOT NULL
            );

            -- Small JSON-valued settings (tariff, solar mode)
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL
            );

            -- Streak (single row)
            CREATE TABLE IF NOT EXISTS streak (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                count INTEGER NOT NULL,
                last_evaluated TEXT
            );

            -- Last aggregate snapshot, one row per period
            CREATE TABLE IF NOT EXISTS aggregates (
                period TEXT PRIMARY KEY,
                load1 REAL NOT NULL,
                load2 REAL NOT NULL,
                load3 REAL NOT NULL,
                total REAL NOT NULL,
                saved_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    fn load_setting<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let conn = self.lock()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(json.and_then(|s| match serde_json::from_str(&s) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Stored setting is corrupt, ignoring");
                None
            }
        }))
    }

    fn save_setting<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let conn = self.lock()?;
        let json = serde_json::to_string(value)?;

        conn.execute(
            r#"
            INSERT INTO settings (key, value_json)
            VALUES (?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value_json = excluded.value_json
            "#,
            params![key, json],
        )?;

        debug!(key, "Setting saved");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn load_rules(&self) -> StoreResult<Vec<Rule>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT rule_json FROM rules ORDER BY position ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut rules = Vec::new();
        for row in rows {
            let json = row?;
            match serde_json::from_str::<Rule>(&json) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    // A partial rule set could silently drop a budget; start clean
                    warn!(error = %e, "Stored rules are corrupt, treating as empty");
                    return Ok(Vec::new());
                }
            }
        }

        Ok(rules)
    }

    fn save_rules(&self, rules: &[Rule]) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM rules", [])?;
        for (position, rule) in rules.iter().enumerate() {
            let json = serde_json::to_string(rule)?;
            tx.execute(
                "INSERT INTO rules (position, rule_id, rule_json) VALUES (?, ?, ?)",
                params![position as i64, rule.id.to_string(), json],
            )?;
        }
        tx.commit()?;

        debug!(count = rules.len(), "Rules saved");
        Ok(())
    }

    fn load_tariff(&self) -> StoreResult<Option<Tariff>> {
        let tariff: Option<Tariff> = self.load_setting(TARIFF_KEY)?;
        Ok(tariff.filter(|t| match t.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Stored tariff is invalid, ignoring");
                false
            }
        }))
    }

    fn save_tariff(&self, tariff: &Tariff) -> StoreResult<()> {
        self.save_setting(TARIFF_KEY, tariff)
    }

    fn load_solar_mode(&self) -> StoreResult<Option<bool>> {
        self.load_setting(SOLAR_MODE_KEY)
    }

    fn save_solar_mode(&self, enabled: bool) -> StoreResult<()> {
        self.save_setting(SOLAR_MODE_KEY, &enabled)
    }

    fn load_streak(&self) -> StoreResult<Option<StreakState>> {
        let conn = self.lock()?;

        let row: Option<(i64, Option<String>)> = conn
            .query_row(
                "SELECT count, last_evaluated FROM streak WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((count, last_evaluated)) = row else {
            return Ok(None);
        };

        let Ok(count) = u32::try_from(count) else {
            warn!(count, "Stored streak count is out of range, ignoring");
            return Ok(None);
        };

        let last_evaluated = match last_evaluated {
            None => None,
            Some(s) => match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(e) => {
                    warn!(value = %s, error = %e, "Stored streak date is corrupt, ignoring");
                    return Ok(None);
                }
            },
        };

        Ok(Some(StreakState {
            count,
            last_evaluated,
        }))
    }

    fn save_streak(&self, streak: &StreakState) -> StoreResult<()> {
        let conn = self.lock()?;
        let date = streak
            .last_evaluated
            .map(|d| d.format("%Y-%m-%d").to_string());

        conn.execute(
            r#"
            INSERT INTO streak (id, count, last_evaluated)
            VALUES (1, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET count = excluded.count, last_evaluated = excluded.last_evaluated
            "#,
            params![streak.count as i64, date],
        )?;

        debug!(count = streak.count, "Streak saved");
        Ok(())
    }

    fn load_aggregates(&self) -> StoreResult<Option<Aggregates>> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT period, load1, load2, load3, total FROM aggregates")?;
        let rows = stmt.query_map([], |row| {
            let period: String = row.get(0)?;
            let aggregate = PeriodAggregate {
                load1: row.get(1)?,
                load2: row.get(2)?,
                load3: row.get(3)?,
                total: row.get(4)?,
            };
            Ok((period, aggregate))
        })?;

        let mut aggregates = Aggregates::default();
        let mut found = false;
        for row in rows {
            let (period, aggregate) = row?;
            match period.as_str() {
                "today" => aggregates.today = aggregate,
                "yesterday" => aggregates.yesterday = aggregate,
                "month" => aggregates.month = aggregate,
                other => {
                    warn!(period = other, "Unknown period in aggregate snapshot, ignoring");
                    continue;
                }
            }
            found = true;
        }

        Ok(found.then_some(aggregates))
    }

    fn save_aggregates(&self, aggregates: &Aggregates) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let saved_at = wattwatch_util::now().to_rfc3339();
        let tx = conn.transaction()?;

        for (period, aggregate) in [
            ("today", &aggregates.today),
            ("yesterday", &aggregates.yesterday),
            ("month", &aggregates.month),
        ] {
            tx.execute(
                r#"
                INSERT INTO aggregates (period, load1, load2, load3, total, saved_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(period)
                DO UPDATE SET load1 = excluded.load1, load2 = excluded.load2,
                              load3 = excluded.load3, total = excluded.total,
                              saved_at = excluded.saved_at
                "#,
                params![
                    period,
                    aggregate.load1,
                    aggregate.load2,
                    aggregate.load3,
                    aggregate.total,
                    saved_at
                ],
            )?;
        }
        tx.commit()?;

        debug!(month_total_wh = aggregates.month.total, "Aggregate snapshot saved");
        Ok(())
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.lock()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Local))
                .unwrap_or_else(|_| wattwatch_util::now());
            let event: AuditEventType = match serde_json::from_str(&event_json) {
                Ok(event) => event,
                Err(e) => {
                    warn!(event_id = id, error = %e, "Skipping unreadable audit event");
                    continue;
                }
            };

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
