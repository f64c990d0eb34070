//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Realtime database connection
    #[serde(default)]
    pub source: RawSourceConfig,

    /// Default tariff, used until one is saved in the store
    #[serde(default)]
    pub tariff: RawTariffConfig,

    /// Seed rules, applied only when the store holds none
    #[serde(default)]
    pub rules: Vec<RawRule>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// Write NDJSON events to stdout (default: true)
    pub emit_events: Option<bool>,
}

/// Sample source settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSourceConfig {
    /// Realtime database root, e.g. https://example.firebaseio.com
    pub base_url: Option<String>,

    /// Path of the sample history node
    pub path: Option<String>,

    /// Database secret or ID token, sent as `?auth=`
    pub auth_token: Option<String>,

    /// Live subscription poll interval
    pub poll_interval_seconds: Option<u64>,

    pub request_timeout_seconds: Option<u64>,
}

/// Tariff defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTariffConfig {
    pub rate: Option<f64>,
    pub fixed: Option<f64>,
    pub solar: Option<f64>,
    pub solar_mode: Option<bool>,
}

/// Raw seed rule. Names stay strings so validation can report unknown ones.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawRule {
    pub target: String,
    pub period: String,
    pub metric: String,
    pub limit: f64,
}
