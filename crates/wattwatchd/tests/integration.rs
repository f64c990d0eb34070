//! Integration tests for wattwatchd
//!
//! These drive the core engine against a mock sample source and an in-memory
//! store, the same way the service loop does.

use chrono::{DateTime, Local, TimeZone};
use std::sync::Arc;
use wattwatch_api::{
    ErrorCode, ErrorInfo, Metric, Period, QuickRange, Reading, Request, RuleFields, Sample,
    StreakState, Target,
};
use wattwatch_config::parse_config;
use wattwatch_core::{CoreEngine, CoreEvent, resolve_quick_range};
use wattwatch_source::{MockSource, SampleSource, SourceEvent};
use wattwatch_store::{AuditEventType, SqliteStore, Store};

fn at(d: u32, h: u32, m: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 6, d, h, m, 0).unwrap()
}

fn reading(energy: f64) -> Option<Reading> {
    Some(Reading {
        energy,
        ..Default::default()
    })
}

fn sample(time: DateTime<Local>, e1: f64, e2: f64, e3: f64) -> Sample {
    Sample {
        timestamp: time.timestamp(),
        load1: reading(e1),
        load2: reading(e2),
        load3: reading(e3),
    }
}

fn make_engine(now: DateTime<Local>) -> (CoreEngine, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let settings = parse_config("config_version = 1").unwrap();
    let engine = CoreEngine::new(&settings, store.clone(), now);
    (engine, store)
}

/// Run the startup bulk load the way the service does
async fn bulk_load(
    engine: &mut CoreEngine,
    source: &MockSource,
    now: DateTime<Local>,
) -> Vec<CoreEvent> {
    let samples = source
        .range(engine.bulk_start(), now.timestamp())
        .await
        .unwrap();
    let mut events = Vec::new();
    for s in &samples {
        events.extend(engine.ingest(s).unwrap_or_default());
    }
    events.extend(engine.history_loaded(now.date_naive()));
    events
}

async fn next_sample(rx: &mut tokio::sync::mpsc::UnboundedReceiver<SourceEvent>) -> Sample {
    match rx.recv().await {
        Some(SourceEvent::Sample(s)) => s,
        other => panic!("Expected a sample, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bulk_load_covers_month_and_yesterday() {
    let source = MockSource::with_samples([
        // Previous month, outside every window
        Local.with_ymd_and_hms(2025, 5, 31, 12, 0, 0).unwrap().timestamp(),
        at(1, 8, 0).timestamp(),
        at(14, 20, 0).timestamp(),
        at(15, 9, 0).timestamp(),
        at(15, 11, 0).timestamp(),
    ]
    .map(|ts| Sample {
        timestamp: ts,
        load1: reading(100.0),
        ..Default::default()
    }));

    let now = at(15, 12, 0);
    let (mut engine, _) = make_engine(now);
    bulk_load(&mut engine, &source, now).await;

    let agg = engine.aggregates();
    assert_eq!(agg.month.total, 400.0);
    assert_eq!(agg.yesterday.total, 100.0);
    assert_eq!(agg.today.total, 200.0);
    assert_eq!(engine.latest_key(), Some(at(15, 11, 0).timestamp()));
}

#[tokio::test]
async fn test_subscription_backlog_not_double_counted() {
    let source = MockSource::with_samples([
        sample(at(15, 9, 0), 50.0, 0.0, 0.0),
        sample(at(15, 10, 0), 50.0, 0.0, 0.0),
    ]);

    let now = at(15, 10, 30);
    let (mut engine, _) = make_engine(now);
    bulk_load(&mut engine, &source, now).await;

    let mut rx = source.subscribe(engine.latest_key().unwrap());

    // The last bulk sample comes back as backlog and is skipped
    let backlog = next_sample(&mut rx).await;
    assert!(engine.ingest(&backlog).is_none());

    source.push(sample(at(15, 10, 45), 10.0, 5.0, 0.0));
    let live = next_sample(&mut rx).await;
    assert!(engine.ingest(&live).is_some());

    // A flaky transport delivering it twice changes nothing
    source.redeliver(live.clone());
    let again = next_sample(&mut rx).await;
    assert!(engine.ingest(&again).is_none());

    assert_eq!(engine.aggregates().today.total, 115.0);
}

#[tokio::test]
async fn test_bulk_failure_is_audited_and_leaves_aggregates_empty() {
    let source = MockSource::with_samples([sample(at(15, 9, 0), 50.0, 0.0, 0.0)]);
    source.set_fail_range(true);

    let now = at(15, 10, 0);
    let (mut engine, store) = make_engine(now);

    let err = source
        .range(engine.bulk_start(), now.timestamp())
        .await
        .unwrap_err();
    engine.history_load_failed(&err.to_string());

    assert_eq!(engine.aggregates().month.total, 0.0);
    assert!(!source.is_healthy());

    let audits = store.recent_audits(10).unwrap();
    assert!(
        audits
            .iter()
            .any(|a| matches!(a.event, AuditEventType::SourceFailed { .. }))
    );

    // The subscription from the bulk start still backfills the month
    let mut rx = source.subscribe(engine.bulk_start());
    let backfilled = next_sample(&mut rx).await;
    engine.ingest(&backfilled);
    assert_eq!(engine.aggregates().today.total, 50.0);
}

#[tokio::test]
async fn test_failed_bulk_load_grades_streak_after_backfill() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store
        .save_streak(&StreakState {
            count: 3,
            last_evaluated: Some(at(14, 0, 0).date_naive()),
        })
        .unwrap();

    // 10 kWh yesterday is 7.1 kg, far above the A+ line
    let source = MockSource::with_samples([sample(at(14, 18, 0), 10_000.0, 0.0, 0.0)]);
    source.set_fail_range(true);

    let now = at(15, 10, 0);
    let settings = parse_config("config_version = 1").unwrap();
    let mut engine = CoreEngine::new(&settings, store.clone(), now);

    let err = source
        .range(engine.bulk_start(), now.timestamp())
        .await
        .unwrap_err();
    engine.history_load_failed(&err.to_string());

    // Nothing graded against the empty yesterday
    assert_eq!(engine.streak().count, 3);
    assert_eq!(store.load_streak().unwrap().unwrap().count, 3);

    let mut rx = source.subscribe(engine.bulk_start());
    let replayed = next_sample(&mut rx).await;
    assert_eq!(engine.ingest(&replayed), Some(vec![]));
    assert_eq!(engine.aggregates().yesterday.total, 10_000.0);

    // The first sample from today settles the streak on the real yesterday
    source.push(sample(at(15, 10, 5), 1.0, 0.0, 0.0));
    let live = next_sample(&mut rx).await;
    let events = engine.ingest(&live).unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        CoreEvent::StreakUpdated { streak } if streak.count == 0
    )));

    let persisted = store.load_streak().unwrap().unwrap();
    assert_eq!(persisted.count, 0);
    assert_eq!(persisted.last_evaluated, Some(now.date_naive()));
}

#[tokio::test]
async fn test_aggregates_survive_unclean_exit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wattwatch.db");
    let source = MockSource::new();
    let now = at(15, 9, 0);

    {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let settings = parse_config("config_version = 1").unwrap();
        let mut engine = CoreEngine::new(&settings, store, now);
        bulk_load(&mut engine, &source, now).await;

        let mut rx = source.subscribe(engine.bulk_start());
        source.push(sample(at(15, 9, 30), 120.0, 30.0, 0.0));
        let s = next_sample(&mut rx).await;
        engine.ingest(&s);
        engine.refresh(at(15, 9, 30));
        // Dropped without the shutdown save
    }

    let store = SqliteStore::open(&path).unwrap();
    let saved = store.load_aggregates().unwrap().unwrap();
    assert_eq!(saved.today.total, 150.0);
    assert_eq!(saved.month.load2, 30.0);
}

#[tokio::test]
async fn test_live_day_rollover_updates_streak() {
    let source = MockSource::new();
    let now = at(15, 22, 0);
    let (mut engine, store) = make_engine(now);
    bulk_load(&mut engine, &source, now).await;

    let mut rx = source.subscribe(engine.bulk_start());
    source.push(sample(at(15, 23, 0), 500.0, 0.0, 0.0));
    source.push(sample(at(16, 0, 5), 10.0, 0.0, 0.0));

    let first = next_sample(&mut rx).await;
    assert_eq!(engine.ingest(&first), Some(vec![]));

    let second = next_sample(&mut rx).await;
    let events = engine.ingest(&second).unwrap();

    assert!(matches!(
        events.first(),
        Some(CoreEvent::DayRolledOver { yesterday, .. }) if yesterday.total == 500.0
    ));
    // Startup counted the empty 14th; 0.5 kWh on the 15th is also A+
    assert!(events.iter().any(|e| matches!(
        e,
        CoreEvent::StreakUpdated { streak } if streak.count == 2
    )));
    assert_eq!(store.load_streak().unwrap().unwrap().count, 2);
}

#[tokio::test]
async fn test_rule_breach_from_live_samples() {
    let source = MockSource::new();
    let now = at(15, 8, 0);
    let (mut engine, _) = make_engine(now);
    bulk_load(&mut engine, &source, now).await;

    engine
        .create_rule(RuleFields {
            target: Target::Load2,
            period: Period::Today,
            metric: Metric::Cost,
            limit: 2.0,
        })
        .unwrap();

    let mut rx = source.subscribe(engine.bulk_start());
    source.push(sample(at(15, 9, 0), 0.0, 300.0, 0.0));
    source.push(sample(at(15, 9, 1), 0.0, 200.0, 0.0));

    // 0.3 kWh at 5.33 is under the limit
    let s = next_sample(&mut rx).await;
    engine.ingest(&s);
    let snapshot = engine.evaluate(at(15, 9, 0));
    assert!(engine.track_alert(&snapshot).is_none());

    // 0.5 kWh costs 2.665
    let s = next_sample(&mut rx).await;
    engine.ingest(&s);
    let snapshot = engine.evaluate(at(15, 9, 1));
    let alert = snapshot.top_alert.clone().unwrap();
    assert_eq!(alert.breach.target, Target::Load2);
    assert!(alert.message.contains("Limit: ₹2"));
    assert!(matches!(
        engine.track_alert(&snapshot),
        Some(CoreEvent::AlertChanged { alert: Some(_) })
    ));
    assert_eq!(snapshot.progress[0].percent, 100.0);
}

#[test]
fn test_duplicate_rule_error_info() {
    let (mut engine, _) = make_engine(at(15, 9, 0));
    let fields = RuleFields {
        target: Target::Total,
        period: Period::Month,
        metric: Metric::Energy,
        limit: 100.0,
    };
    let first = engine.create_rule(fields).unwrap();

    let err = engine
        .create_rule(RuleFields {
            limit: 200.0,
            ..fields
        })
        .unwrap_err();
    let info = ErrorInfo::from(&err);

    assert_eq!(info.code, ErrorCode::DuplicateRule);
    assert_eq!(info.conflicting_rule, Some(first.id));
    assert_eq!(info.conflicting_index, Some(0));
}

#[test]
fn test_config_seed_rules_reach_engine() {
    let settings = parse_config(
        r#"
            config_version = 1

            [tariff]
            rate = 7.5
            fixed = 100.0

            [[rules]]
            target = "load1"
            period = "today"
            metric = "energy"
            limit = 3.0

            [[rules]]
            target = "total"
            period = "month"
            metric = "cost"
            limit = 1500.0
        "#,
    )
    .unwrap();

    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let engine = CoreEngine::new(&settings, store.clone(), at(15, 9, 0));

    assert_eq!(engine.tariff().rate, 7.5);
    let targets: Vec<Target> = engine.rules().iter().map(|r| r.fields.target).collect();
    assert_eq!(targets, vec![Target::Load1, Target::Total]);
    assert_eq!(store.load_rules().unwrap().len(), 2);
}

#[tokio::test]
async fn test_sentry_trips_on_live_sample() {
    let source = MockSource::new();
    let now = at(15, 8, 0);
    let (mut engine, _) = make_engine(now);
    bulk_load(&mut engine, &source, now).await;
    engine.arm_sentry(vec![Target::Load1]);

    let mut rx = source.subscribe(engine.bulk_start());
    source.push(Sample {
        timestamp: at(15, 9, 0).timestamp(),
        load1: Some(Reading {
            energy: 1.0,
            power: 60.0,
            current: 0.3,
        }),
        load3: Some(Reading {
            energy: 0.5,
            power: 0.0,
            current: 2.0,
        }),
        ..Default::default()
    });

    let s = next_sample(&mut rx).await;
    let events = engine.ingest(&s).unwrap();
    match events.as_slice() {
        [CoreEvent::SentryTripped(trip)] => {
            assert_eq!(trip.target, Target::Load3);
            assert_eq!(trip.power_watts, 460.0);
        }
        other => panic!("Expected a sentry trip, got {:?}", other),
    }
    assert!(engine.sentry().is_tripped());
}

#[tokio::test]
async fn test_quick_range_pricing_from_source() {
    let source = MockSource::with_samples([
        sample(at(14, 12, 0), 1000.0, 0.0, 0.0),
        sample(at(15, 1, 0), 0.0, 2000.0, 0.0),
        sample(at(15, 2, 0), 500.0, 0.0, 500.0),
    ]);
    let now = at(15, 12, 0);
    let (engine, _) = make_engine(now);

    let (start, end) = resolve_quick_range(QuickRange::Today, now);
    let samples = source.range(start, end).await.unwrap();
    let cost = engine.price_samples(&samples);

    assert_eq!(cost.sample_count, 2);
    assert!((cost.kwh_total - 3.0).abs() < 1e-9);
    assert!((cost.cost_total - 3.0 * 5.33).abs() < 1e-9);

    let (start, end) = resolve_quick_range(QuickRange::Yesterday, now);
    let cost = engine.price_samples(&source.range(start, end).await.unwrap());
    assert_eq!(cost.sample_count, 1);
    assert!((cost.kwh_load1 - 1.0).abs() < 1e-9);
}

#[test]
fn test_request_line_parses() {
    let line = r#"{"request_id":3,"api_version":1,"command":{"type":"quick_range_cost","range":"last_7_days"}}"#;
    let request: Request = serde_json::from_str(line).unwrap();
    assert_eq!(request.request_id, 3);

    let line = r#"{"request_id":4,"api_version":1,"command":{"type":"set_solar_mode","enabled":true}}"#;
    let request: Request = serde_json::from_str(line).unwrap();
    assert_eq!(request.request_id, 4);
}
