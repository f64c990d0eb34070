//! Validated settings structures

use crate::schema::{RawConfig, RawRule, RawServiceConfig, RawSourceConfig, RawTariffConfig};
use std::path::PathBuf;
use std::time::Duration;
use wattwatch_api::{RuleFields, Tariff};

/// Path of the sample history node written by the meter firmware
pub const DEFAULT_SOURCE_PATH: &str = "energyMonitoring/history";

/// Validated settings ready for use by the service
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceConfig,
    pub source: SourceConfig,

    /// Tariff used until one is saved in the store
    pub tariff: Tariff,

    pub solar_mode: bool,

    /// Rules applied when the store holds none, in file order
    pub seed_rules: Vec<RuleFields>,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let RawTariffConfig {
            rate,
            fixed,
            solar,
            solar_mode,
        } = raw.tariff;
        let defaults = Tariff::default();

        Self {
            service: ServiceConfig::from_raw(raw.service),
            source: SourceConfig::from_raw(raw.source),
            tariff: Tariff {
                rate: rate.unwrap_or(defaults.rate),
                fixed: fixed.unwrap_or(defaults.fixed),
                solar: solar.unwrap_or(defaults.solar),
            },
            solar_mode: solar_mode.unwrap_or(false),
            seed_rules: raw.rules.iter().filter_map(convert_rule).collect(),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// None means the platform default data directory
    pub data_dir: Option<PathBuf>,
    pub emit_events: bool,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw.data_dir,
            emit_events: raw.emit_events.unwrap_or(true),
        }
    }
}

/// Realtime database connection
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// None until set here or on the command line
    pub base_url: Option<String>,
    pub path: String,
    pub auth_token: Option<String>,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl SourceConfig {
    fn from_raw(raw: RawSourceConfig) -> Self {
        let defaults = Self::default();
        Self {
            base_url: raw.base_url.map(|u| u.trim_end_matches('/').to_string()),
            path: raw
                .path
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or(defaults.path),
            auth_token: raw.auth_token,
            poll_interval: raw
                .poll_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            request_timeout: raw
                .request_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            path: DEFAULT_SOURCE_PATH.to_string(),
            auth_token: None,
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

fn convert_rule(raw: &RawRule) -> Option<RuleFields> {
    Some(RuleFields {
        target: raw.target.parse().ok()?,
        period: raw.period.parse().ok()?,
        metric: raw.metric.parse().ok()?,
        limit: raw.limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattwatch_api::{Metric, Period, Target};

    #[test]
    fn test_defaults_fill_missing_values() {
        let raw: RawConfig = toml::from_str(
            r#"
            config_version = 1

            [tariff]
            rate = 6.0
            "#,
        )
        .unwrap();
        let settings = Settings::from_raw(raw);

        assert_eq!(settings.tariff.rate, 6.0);
        assert_eq!(settings.tariff.fixed, 135.0);
        assert_eq!(settings.tariff.solar, 0.0);
        assert!(!settings.solar_mode);
        assert!(settings.service.emit_events);
        assert_eq!(settings.source.path, DEFAULT_SOURCE_PATH);
        assert_eq!(settings.source.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_seed_rules_and_url_normalisation() {
        let raw: RawConfig = toml::from_str(
            r#"
            config_version = 1

            [source]
            base_url = "https://home-meter.firebaseio.com/"
            path = "/meters/history/"

            [[rules]]
            target = "load3"
            period = "today"
            metric = "cost"
            limit = 4.0
            "#,
        )
        .unwrap();
        let settings = Settings::from_raw(raw);

        assert_eq!(
            settings.source.base_url.as_deref(),
            Some("https://home-meter.firebaseio.com")
        );
        assert_eq!(settings.source.path, "meters/history");
        assert_eq!(
            settings.seed_rules,
            vec![RuleFields {
                target: Target::Load3,
                period: Period::Today,
                metric: Metric::Cost,
                limit: 4.0,
            }]
        );
    }
}
