//! wattwatchd - The wattwatch background service
//!
//! This is the main entry point for the wattwatchd service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Core engine
//! - Sample source (bulk load, then live subscription)
//! - NDJSON commands on stdin, responses and events on stdout

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use wattwatch_api::{
    API_VERSION, Command, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus, Request,
    Response, ResponsePayload, Sample,
};
use wattwatch_config::{Settings, load_config};
use wattwatch_core::{CoreEngine, CoreEvent, resolve_quick_range};
use wattwatch_source::{HttpSource, HttpSourceConfig, SampleSource, SourceEvent};
use wattwatch_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use wattwatch_util::{DB_FILENAME, default_config_path, default_data_dir};

/// How often the calendar is checked for a midnight rollover
const CLOCK_INTERVAL: Duration = Duration::from_secs(30);

/// wattwatchd - Home energy watchdog service
#[derive(Parser, Debug)]
#[command(name = "wattwatchd")]
#[command(
    about = "Home energy watchdog: rolling aggregates, budget alerts and carbon grades",
    long_about = None
)]
struct Args {
    /// Configuration file path (default: ~/.config/wattwatch/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set WATTWATCH_DATA_DIR env var)
    #[arg(short, long, env = "WATTWATCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Realtime database URL override (or set WATTWATCH_SOURCE_URL env var)
    #[arg(short = 'u', long, env = "WATTWATCH_SOURCE_URL")]
    source_url: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// NDJSON writer for stdout. Responses are always written; events only
/// when enabled in the configuration.
struct Output {
    emit_events: bool,
}

impl Output {
    fn event(&self, payload: EventPayload) {
        if self.emit_events {
            self.write_line(&Event::new(payload));
        }
    }

    fn response(&self, response: &Response) {
        self.write_line(response);
    }

    fn write_line<T: Serialize>(&self, value: &T) {
        let mut stdout = std::io::stdout().lock();
        let result = serde_json::to_writer(&mut stdout, value)
            .map_err(std::io::Error::from)
            .and_then(|()| {
                stdout.write_all(b"\n")?;
                stdout.flush()
            });

        if let Err(e) = result {
            warn!(error = %e, "Failed to write to stdout");
        }
    }
}

/// Main service state
struct Service {
    engine: CoreEngine,
    source: Arc<dyn SampleSource>,
    store: Arc<dyn Store>,
    output: Output,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        // Load configuration
        let mut settings = if args.config.exists() {
            load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?
        } else {
            warn!(
                config_path = %args.config.display(),
                "Config file not found, using defaults"
            );
            Settings::default()
        };

        info!(
            config_path = %args.config.display(),
            seed_rules = settings.seed_rules.len(),
            "Configuration loaded"
        );

        if let Some(url) = &args.source_url {
            settings.source.base_url = Some(url.trim_end_matches('/').to_string());
        }

        // Determine paths
        let data_dir = args
            .data_dir
            .clone()
            .or_else(|| settings.service.data_dir.clone())
            .unwrap_or_else(default_data_dir);

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        // Initialize store
        let db_path = data_dir.join(DB_FILENAME);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        // Initialize sample source
        let base_url = settings
            .source
            .base_url
            .clone()
            .context("No source URL configured: set [source] base_url or --source-url")?;

        let source: Arc<dyn SampleSource> = Arc::new(
            HttpSource::new(HttpSourceConfig {
                base_url,
                path: settings.source.path.clone(),
                auth_token: settings.source.auth_token.clone(),
                poll_interval: settings.source.poll_interval,
                request_timeout: settings.source.request_timeout,
            })
            .context("Failed to create sample source")?,
        );

        // Initialize core engine
        let engine = CoreEngine::new(&settings, store.clone(), wattwatch_util::now());

        Ok(Self {
            engine,
            source,
            store,
            output: Output {
                emit_events: settings.service.emit_events,
            },
        })
    }

    async fn run(mut self) -> Result<()> {
        self.bulk_load().await;

        // Keys at or below the last ingested one are skipped by the engine
        let from_key = self
            .engine
            .latest_key()
            .unwrap_or_else(|| self.engine.bulk_start());
        let mut samples = self.source.subscribe(from_key);

        let (command_tx, mut commands) = mpsc::unbounded_channel();
        tokio::spawn(read_commands(command_tx));
        let mut commands_open = true;

        // Set up signal handlers
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

        let mut clock = tokio::time::interval(CLOCK_INTERVAL);
        clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(from_key, "Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // Midnight rollover while no samples arrive
                _ = clock.tick() => {
                    let events = self.engine.tick(wattwatch_util::now());
                    if !events.is_empty() {
                        self.publish(events);
                        self.publish_state();
                    }
                }

                event = samples.recv() => match event {
                    Some(SourceEvent::Sample(sample)) => self.ingest(&sample),
                    Some(SourceEvent::Error(message)) => self.source_failed(message),
                    None => {
                        error!("Sample subscription ended unexpectedly");
                        break;
                    }
                },

                line = commands.recv(), if commands_open => match line {
                    Some(line) => {
                        let response = self.handle_line(&line).await;
                        self.output.response(&response);
                    }
                    None => {
                        debug!("stdin closed, command channel disabled");
                        commands_open = false;
                    }
                },
            }
        }

        // Graceful shutdown
        info!("Shutting down wattwatchd");

        self.engine.save_snapshot();

        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        self.output.event(EventPayload::Shutdown);

        info!("Shutdown complete");
        Ok(())
    }

    /// Ingest the month so far, then settle the streak and publish. On
    /// failure the streak waits for the subscription to replay the history.
    async fn bulk_load(&mut self) {
        let now = wattwatch_util::now();
        let start = self.engine.bulk_start();

        match self.source.range(start, now.timestamp()).await {
            Ok(samples) => {
                for sample in &samples {
                    if let Some(events) = self.engine.ingest(sample) {
                        self.publish(events);
                    }
                }
                info!(
                    sample_count = samples.len(),
                    latest_key = ?self.engine.latest_key(),
                    "Bulk load complete"
                );

                if let Some(event) = self.engine.history_loaded(now.date_naive()) {
                    self.publish(vec![event]);
                }
            }
            Err(e) => {
                let message = e.to_string();
                self.engine.history_load_failed(&message);
                self.output.event(EventPayload::SourceError { message });
            }
        }

        self.publish_state();
    }

    fn ingest(&mut self, sample: &Sample) {
        if let Some(events) = self.engine.ingest(sample) {
            self.publish(events);
            self.publish_state();
        }
    }

    fn source_failed(&mut self, message: String) {
        self.engine.record_source_failure(&message);
        self.output.event(EventPayload::SourceError { message });
    }

    /// Refresh and emit the snapshot, preceded by an alert change if any
    fn publish_state(&mut self) {
        let (snapshot, alert_event) = self.engine.refresh(wattwatch_util::now());
        if let Some(event) = alert_event {
            self.publish(vec![event]);
        }
        self.output.event(EventPayload::StateChanged(snapshot));
    }

    fn publish(&self, events: Vec<CoreEvent>) {
        for event in events {
            let payload = match event {
                CoreEvent::DayRolledOver {
                    yesterday,
                    baselines,
                } => EventPayload::DayRolledOver {
                    yesterday,
                    baselines,
                },
                CoreEvent::MonthRolledOver { baselines } => {
                    EventPayload::MonthRolledOver { baselines }
                }
                CoreEvent::AlertChanged { alert } => EventPayload::AlertChanged { alert },
                CoreEvent::StreakUpdated { streak } => EventPayload::StreakUpdated {
                    badge: streak.badge(),
                    streak,
                },
                CoreEvent::SentryTripped(trip) => EventPayload::SentryTripped(trip),
            };
            self.output.event(payload);
        }
    }

    async fn handle_line(&mut self, line: &str) -> Response {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Malformed request");
                return Response::error(
                    0,
                    ErrorInfo::new(ErrorCode::InvalidRequest, format!("Malformed request: {e}")),
                );
            }
        };

        if request.api_version != API_VERSION {
            return Response::error(
                request.request_id,
                ErrorInfo::new(
                    ErrorCode::InvalidRequest,
                    format!(
                        "Unsupported API version {} (expected {})",
                        request.api_version, API_VERSION
                    ),
                ),
            );
        }

        self.handle_command(request.request_id, request.command).await
    }

    async fn handle_command(&mut self, request_id: u64, command: Command) -> Response {
        let now = wattwatch_util::now();

        // Mutations re-evaluate and publish a fresh snapshot on success
        let result = match command {
            Command::GetState => {
                let snapshot = self.engine.evaluate(now);
                return Response::success(request_id, ResponsePayload::State(Box::new(snapshot)));
            }

            Command::ListRules => {
                return Response::success(
                    request_id,
                    ResponsePayload::Rules {
                        rules: self.engine.rules().to_vec(),
                    },
                );
            }

            Command::CreateRule(fields) => self
                .engine
                .create_rule(fields)
                .map(ResponsePayload::RuleSaved),

            Command::UpdateRule { id, fields } => self
                .engine
                .update_rule(&id, fields)
                .map(ResponsePayload::RuleSaved),

            Command::DeleteRule { id } => self
                .engine
                .delete_rule(&id)
                .map(|rule| ResponsePayload::RuleDeleted { id: rule.id }),

            Command::SetTariff(tariff) => self
                .engine
                .set_tariff(tariff)
                .map(ResponsePayload::TariffUpdated),

            Command::SetSolarMode { enabled } => {
                self.engine.set_solar_mode(enabled);
                Ok(ResponsePayload::SolarModeSet { enabled })
            }

            Command::ArmSentry { whitelist } => {
                self.engine.arm_sentry(whitelist.clone());
                Ok(ResponsePayload::SentryArmed { whitelist })
            }

            Command::DisarmSentry => {
                self.engine.disarm_sentry();
                Ok(ResponsePayload::SentryDisarmed)
            }

            Command::RangeCost { start, end } => {
                return self.range_cost(request_id, start, end).await;
            }

            Command::QuickRangeCost { range } => {
                let (start, end) = resolve_quick_range(range, now);
                return self.range_cost(request_id, start, end).await;
            }

            Command::GetInsights => {
                let insights = self.engine.insights(now, &mut rand::rng());
                return Response::success(request_id, ResponsePayload::Insights { insights });
            }

            Command::GetHealth => {
                let health = HealthStatus {
                    live: true,
                    source_ok: self.source.is_healthy(),
                    store_ok: self.engine.store_healthy(),
                    latest_key: self.engine.latest_key(),
                };
                return Response::success(request_id, ResponsePayload::Health(health));
            }

            Command::Ping => return Response::success(request_id, ResponsePayload::Pong),
        };

        match result {
            Ok(payload) => {
                self.publish_state();
                Response::success(request_id, payload)
            }
            Err(e) => {
                debug!(error = %e, "Command rejected");
                Response::error(request_id, ErrorInfo::from(&e))
            }
        }
    }

    async fn range_cost(&self, request_id: u64, start: i64, end: i64) -> Response {
        if start > end {
            return Response::error(
                request_id,
                ErrorInfo::new(ErrorCode::InvalidRequest, "Range start is after its end"),
            );
        }

        match self.source.range(start, end).await {
            Ok(samples) => {
                let cost = self.engine.price_samples(&samples);
                Response::success(request_id, ResponsePayload::RangeCost { start, end, cost })
            }
            Err(e) => {
                warn!(error = %e, start, end, "Range query failed");
                Response::error(
                    request_id,
                    ErrorInfo::new(ErrorCode::SourceError, e.to_string()),
                )
            }
        }
    }
}

/// Forward non-empty stdin lines until EOF
async fn read_commands(tx: mpsc::UnboundedSender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if tx.send(line.to_string()).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout carries the NDJSON stream
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "wattwatchd starting");

    // Create and run the service
    let service = Service::new(&args).await?;
    service.run().await
}
