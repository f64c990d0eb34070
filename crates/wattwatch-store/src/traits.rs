//! Store trait definitions

use wattwatch_api::{Aggregates, Rule, StreakState, Tariff};

use crate::{AuditEvent, StoreResult};

/// Repository for everything wattwatch keeps across restarts.
///
/// Loads never fail on corrupt content: a row that does not parse is logged
/// and reported as absent, so callers fall back to defaults.
pub trait Store: Send + Sync {
    // Rules

    /// Load rules in insertion order
    fn load_rules(&self) -> StoreResult<Vec<Rule>>;

    /// Replace the stored rule set
    fn save_rules(&self, rules: &[Rule]) -> StoreResult<()>;

    // Tariff and solar mode

    fn load_tariff(&self) -> StoreResult<Option<Tariff>>;

    fn save_tariff(&self, tariff: &Tariff) -> StoreResult<()>;

    fn load_solar_mode(&self) -> StoreResult<Option<bool>>;

    fn save_solar_mode(&self, enabled: bool) -> StoreResult<()>;

    // Streak

    fn load_streak(&self) -> StoreResult<Option<StreakState>>;

    fn save_streak(&self, streak: &StreakState) -> StoreResult<()>;

    // Aggregate snapshot

    /// Load the last saved aggregate snapshot
    fn load_aggregates(&self) -> StoreResult<Option<Aggregates>>;

    /// Save the aggregate snapshot
    fn save_aggregates(&self, aggregates: &Aggregates) -> StoreResult<()>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
