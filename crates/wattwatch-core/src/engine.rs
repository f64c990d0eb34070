//! Core energy engine

use chrono::{DateTime, Local, NaiveDate};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wattwatch_api::{
    Aggregates, Alert, Baselines, CarbonSummary, DashboardSnapshot, Insight, RangeCost, Rule,
    RuleFields, Sample, StreakState, Target, Tariff,
};
use wattwatch_config::Settings;
use wattwatch_store::{AuditEvent, AuditEventType, Store, StoreResult};
use wattwatch_util::{Result, RuleId, local_datetime};

use crate::{
    CoreEvent, InsightContext, RolloverEvent, RollingAggregator, RuleBook, Sentry,
    compute_grades, equivalencies, evaluate_streak, evaluator, generate_insights, range_cost,
    rule_progress, select_top_alert,
};

/// How far the startup history load has got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryLoad {
    /// Not finished yet, so yesterday may be incomplete
    Pending,
    /// The bulk read failed and the subscription is replaying the history
    Backfilling,
    Complete,
}

/// Owns all mutable energy state: aggregates, rules, tariff, streak, sentry.
///
/// Everything the presentation layer shows comes from [`CoreEngine::evaluate`],
/// which is a pure read of that state. Store failures never fail an operation;
/// they are logged and the in-memory state stays authoritative.
pub struct CoreEngine {
    store: Arc<dyn Store>,
    aggregator: RollingAggregator,
    rules: RuleBook,
    tariff: Tariff,
    solar_mode: bool,
    streak: StreakState,
    sentry: Sentry,
    top_alert: Option<Alert>,
    latest_key: Option<i64>,
    history: HistoryLoad,
}

impl CoreEngine {
    /// Create a new engine, rehydrating persisted state from `store`
    pub fn new(settings: &Settings, store: Arc<dyn Store>, now: DateTime<Local>) -> Self {
        let rules = load_rule_book(settings, store.as_ref());
        let tariff = load_or(store.load_tariff(), settings.tariff, "tariff");
        let solar_mode = load_or(store.load_solar_mode(), settings.solar_mode, "solar mode");
        let streak = load_or(store.load_streak(), StreakState::default(), "streak");

        info!(
            rule_count = rules.len(),
            solar_mode,
            streak = streak.count,
            "Core engine initialized"
        );

        Self {
            store,
            aggregator: RollingAggregator::starting_at(now.timestamp()),
            rules,
            tariff,
            solar_mode,
            streak,
            sentry: Sentry::new(),
            top_alert: None,
            latest_key: None,
            history: HistoryLoad::Pending,
        }
    }

    /// First key the bulk load must cover: the start of the month, or of
    /// yesterday when that falls in the previous month
    pub fn bulk_start(&self) -> i64 {
        let b = self.aggregator.baselines();
        b.start_of_month.min(b.start_of_yesterday)
    }

    /// Ingest one sample.
    ///
    /// Returns None when the sample's key is not above the highest key
    /// already ingested, so redelivered samples are never counted twice.
    pub fn ingest(&mut self, sample: &Sample) -> Option<Vec<CoreEvent>> {
        if let Some(latest) = self.latest_key
            && sample.timestamp <= latest
        {
            debug!(key = sample.timestamp, latest, "Sample already ingested, skipping");
            return None;
        }
        self.latest_key = Some(sample.timestamp);

        let mut events = match self.aggregator.ingest(sample) {
            Some(rollover) => self.handle_rollover(rollover),
            None => Vec::new(),
        };

        // A replayed sample from today means yesterday is fully replayed
        let start_of_today = self.aggregator.baselines().start_of_today;
        if self.history == HistoryLoad::Backfilling && sample.timestamp >= start_of_today {
            info!(key = sample.timestamp, "History backfilled by the subscription");
            self.history = HistoryLoad::Complete;
            let today = local_datetime(start_of_today).date_naive();
            events.extend(self.update_streak(today));
        }

        if let Some(trip) = self.sentry.check(sample) {
            events.push(CoreEvent::SentryTripped(trip));
        }

        Some(events)
    }

    /// Advance the calendar without a sample, so midnight resets "today"
    /// even when the appliances are idle
    pub fn tick(&mut self, now: DateTime<Local>) -> Vec<CoreEvent> {
        match self.aggregator.roll_to(now.timestamp()) {
            Some(rollover) => self.handle_rollover(rollover),
            None => Vec::new(),
        }
    }

    fn handle_rollover(&mut self, rollover: RolloverEvent) -> Vec<CoreEvent> {
        let baselines = self.aggregator.baselines();
        let mut events = Vec::new();

        if let Some(start_of_month) = rollover.month_start {
            self.audit(AuditEventType::MonthRolledOver { start_of_month });
            events.push(CoreEvent::MonthRolledOver { baselines });
        }

        if let Some(start_of_today) = rollover.day_start {
            let yesterday = self.aggregator.snapshot().yesterday;
            self.audit(AuditEventType::DayRolledOver {
                start_of_today,
                yesterday_total_wh: yesterday.total,
            });
            events.push(CoreEvent::DayRolledOver {
                yesterday,
                baselines,
            });

            let today = local_datetime(start_of_today).date_naive();
            events.extend(self.update_streak(today));
        }

        events
    }

    /// The bulk load delivered everything up to now. Evaluates the streak
    /// for `today`.
    pub fn history_loaded(&mut self, today: NaiveDate) -> Option<CoreEvent> {
        self.history = HistoryLoad::Complete;
        self.update_streak(today)
    }

    /// The bulk load failed. The streak is held back until the subscription
    /// replays a sample from today, so an empty yesterday is never graded.
    pub fn history_load_failed(&mut self, message: &str) {
        self.record_source_failure(message);
        self.history = HistoryLoad::Backfilling;
    }

    /// Evaluate the streak for `today` from yesterday's aggregate. A no-op
    /// when `today` was already evaluated or the history is incomplete.
    fn update_streak(&mut self, today: NaiveDate) -> Option<CoreEvent> {
        if self.history != HistoryLoad::Complete {
            debug!(date = %today, "History incomplete, streak not evaluated");
            return None;
        }

        let yesterday_wh = self.aggregator.snapshot().yesterday.total;
        let streak = evaluate_streak(&self.streak, today, yesterday_wh, self.solar_mode)?;

        if let Err(e) = self.store.save_streak(&streak) {
            warn!(error = %e, "Failed to persist streak");
        }
        self.audit(AuditEventType::StreakUpdated {
            date: today,
            count: streak.count,
        });

        self.streak = streak.clone();
        Some(CoreEvent::StreakUpdated { streak })
    }

    /// Full dashboard state computed from the current aggregates
    pub fn evaluate(&self, now: DateTime<Local>) -> DashboardSnapshot {
        let aggregates = self.aggregator.snapshot();
        let rules = self.rules.list();

        let mut breaches = evaluator::evaluate(rules, &aggregates, &self.tariff, self.solar_mode);
        let grades = compute_grades(&aggregates, &self.tariff, self.solar_mode);
        if let Some(eco) = &grades.eco_alert {
            breaches.push(eco.clone());
        }
        let top_alert = select_top_alert(&breaches);

        let progress = rules
            .iter()
            .map(|rule| rule_progress(rule, &aggregates, &self.tariff))
            .collect();

        DashboardSnapshot {
            generated_at: now,
            solar_mode: self.solar_mode,
            tariff: self.tariff,
            baselines: self.aggregator.baselines(),
            aggregates,
            rules: rules.to_vec(),
            breaches,
            top_alert,
            progress,
            carbon: CarbonSummary {
                co2_today_kg: grades.co2_today_kg,
                co2_month_kg: grades.co2_month_kg,
                grade_today: grades.today,
                grade_month: grades.month,
                equivalencies: equivalencies(grades.co2_month_kg, self.solar_mode),
            },
            streak: self.streak.clone(),
            streak_badge: self.streak.badge(),
        }
    }

    /// Remember the snapshot's top alert and report when it differs from the
    /// previous one. A changing actual value alone is not a change.
    pub fn track_alert(&mut self, snapshot: &DashboardSnapshot) -> Option<CoreEvent> {
        let current = snapshot.top_alert.clone();
        let changed = match (&self.top_alert, &current) {
            (None, None) => false,
            (Some(previous), Some(next)) => !same_alert(previous, next),
            _ => true,
        };
        self.top_alert = current.clone();

        if !changed {
            return None;
        }

        match &current {
            Some(alert) => {
                info!(message = %alert.message, "Top alert changed");
                self.audit(AuditEventType::AlertRaised {
                    target: alert.breach.target,
                    period: alert.breach.period,
                    metric: alert.breach.metric,
                    actual: alert.breach.actual,
                    message: alert.message.clone(),
                });
            }
            None => info!("Top alert cleared"),
        }

        Some(CoreEvent::AlertChanged { alert: current })
    }

    /// Evaluate, track the top alert and persist the aggregates. This is the
    /// pass run after every change that reaches the presentation layer.
    pub fn refresh(&mut self, now: DateTime<Local>) -> (DashboardSnapshot, Option<CoreEvent>) {
        let snapshot = self.evaluate(now);
        let alert_event = self.track_alert(&snapshot);
        self.save_snapshot();
        (snapshot, alert_event)
    }

    // Rules

    pub fn rules(&self) -> &[Rule] {
        self.rules.list()
    }

    pub fn create_rule(&mut self, fields: RuleFields) -> Result<Rule> {
        let rule = self.rules.create(fields)?;
        self.persist_rules();
        self.audit(AuditEventType::RuleCreated {
            rule_id: rule.id.clone(),
            fields,
        });
        Ok(rule)
    }

    pub fn update_rule(&mut self, id: &RuleId, fields: RuleFields) -> Result<Rule> {
        let rule = self.rules.update(id, fields)?;
        self.persist_rules();
        self.audit(AuditEventType::RuleUpdated {
            rule_id: id.clone(),
            fields,
        });
        Ok(rule)
    }

    pub fn delete_rule(&mut self, id: &RuleId) -> Result<Rule> {
        let rule = self.rules.delete(id)?;
        self.persist_rules();
        self.audit(AuditEventType::RuleDeleted {
            rule_id: id.clone(),
        });
        Ok(rule)
    }

    fn persist_rules(&self) {
        if let Err(e) = self.store.save_rules(self.rules.list()) {
            warn!(error = %e, "Failed to persist rules");
        }
    }

    // Tariff and solar mode

    pub fn tariff(&self) -> Tariff {
        self.tariff
    }

    pub fn set_tariff(&mut self, tariff: Tariff) -> Result<Tariff> {
        tariff.validate()?;

        if let Err(e) = self.store.save_tariff(&tariff) {
            warn!(error = %e, "Failed to persist tariff");
        }
        info!(
            rate = tariff.rate,
            fixed = tariff.fixed,
            solar = tariff.solar,
            "Tariff updated"
        );
        self.tariff = tariff;
        Ok(tariff)
    }

    pub fn solar_mode(&self) -> bool {
        self.solar_mode
    }

    pub fn set_solar_mode(&mut self, enabled: bool) {
        if let Err(e) = self.store.save_solar_mode(enabled) {
            warn!(error = %e, "Failed to persist solar mode");
        }
        info!(enabled, "Solar mode set");
        self.solar_mode = enabled;
    }

    // Vacation sentry

    pub fn sentry(&self) -> &Sentry {
        &self.sentry
    }

    pub fn arm_sentry(&mut self, whitelist: Vec<Target>) {
        self.sentry.arm(whitelist);
    }

    pub fn disarm_sentry(&mut self) {
        self.sentry.disarm();
    }

    // Derived views

    /// Up to three insights, chosen with `rng`
    pub fn insights<R: Rng + ?Sized>(&self, now: DateTime<Local>, rng: &mut R) -> Vec<Insight> {
        let aggregates = self.aggregator.snapshot();
        let ctx = InsightContext {
            aggregates: &aggregates,
            tariff: &self.tariff,
            solar_mode: self.solar_mode,
            now,
        };
        generate_insights(&ctx, rng)
    }

    /// Price samples fetched for an arbitrary range with the current tariff
    pub fn price_samples(&self, samples: &[Sample]) -> RangeCost {
        range_cost(samples, &self.tariff, self.solar_mode)
    }

    pub fn aggregates(&self) -> Aggregates {
        self.aggregator.snapshot()
    }

    pub fn baselines(&self) -> Baselines {
        self.aggregator.baselines()
    }

    pub fn streak(&self) -> &StreakState {
        &self.streak
    }

    pub fn top_alert(&self) -> Option<&Alert> {
        self.top_alert.as_ref()
    }

    /// Highest sample key ingested so far
    pub fn latest_key(&self) -> Option<i64> {
        self.latest_key
    }

    pub fn store_healthy(&self) -> bool {
        self.store.is_healthy()
    }

    // Snapshot persistence

    /// Persist the current aggregates
    pub fn save_snapshot(&self) {
        if let Err(e) = self.store.save_aggregates(&self.aggregator.snapshot()) {
            warn!(error = %e, "Failed to save aggregate snapshot");
        }
    }

    /// Log and audit a source failure. Aggregates are left untouched.
    pub fn record_source_failure(&self, message: &str) {
        warn!(error = message, "Sample source failed");
        self.audit(AuditEventType::SourceFailed {
            message: message.to_string(),
        });
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }
}

/// Stored rules, or the configured seed rules when the store holds none
fn load_rule_book(settings: &Settings, store: &dyn Store) -> RuleBook {
    let stored = match store.load_rules() {
        Ok(rules) => rules,
        Err(e) => {
            // Seeding now would overwrite rules we merely failed to read
            warn!(error = %e, "Failed to load rules, starting with none");
            return RuleBook::new();
        }
    };

    if !stored.is_empty() || settings.seed_rules.is_empty() {
        return RuleBook::from_rules(stored);
    }

    let mut book = RuleBook::new();
    for fields in &settings.seed_rules {
        if let Err(e) = book.create(*fields) {
            warn!(error = %e, "Seed rule rejected");
        }
    }
    if let Err(e) = store.save_rules(book.list()) {
        warn!(error = %e, "Failed to persist seed rules");
    }
    info!(count = book.len(), "Rules seeded from configuration");
    book
}

fn load_or<T>(result: StoreResult<Option<T>>, fallback: T, what: &str) -> T {
    match result {
        Ok(Some(value)) => value,
        Ok(None) => fallback,
        Err(e) => {
            warn!(error = %e, what, "Failed to load persisted value, using default");
            fallback
        }
    }
}

/// Same rule (or the same gamification alert with the same text)
fn same_alert(a: &Alert, b: &Alert) -> bool {
    a.breach.rule_id == b.breach.rule_id
        && a.breach.target == b.breach.target
        && a.breach.period == b.breach.period
        && a.breach.metric == b.breach.metric
        && a.breach.custom_message == b.breach.custom_message
}
