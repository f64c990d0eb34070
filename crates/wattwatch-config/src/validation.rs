//! Configuration validation

use crate::schema::{RawConfig, RawRule, RawSourceConfig, RawTariffConfig};
use std::collections::HashMap;
use thiserror::Error;
use wattwatch_api::{Metric, Period, Target};

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Rule #{index}: {message}")]
    RuleError { index: usize, message: String },

    #[error("Rule #{index} duplicates rule #{existing} ({target}/{period}/{metric})")]
    DuplicateRule {
        index: usize,
        existing: usize,
        target: String,
        period: String,
        metric: String,
    },

    #[error("Tariff: {0}")]
    TariffError(String),

    #[error("Source: {0}")]
    SourceError(String),
}

/// Validate a raw configuration, collecting every error
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_source(&config.source));
    errors.extend(validate_tariff(&config.tariff));

    let mut seen = HashMap::new();
    for (index, rule) in config.rules.iter().enumerate() {
        let rule_errors = validate_rule(rule, index);
        if !rule_errors.is_empty() {
            errors.extend(rule_errors);
            continue;
        }

        let slot = (rule.target.as_str(), rule.period.as_str(), rule.metric.as_str());
        if let Some(&existing) = seen.get(&slot) {
            errors.push(ValidationError::DuplicateRule {
                index,
                existing,
                target: rule.target.clone(),
                period: rule.period.clone(),
                metric: rule.metric.clone(),
            });
        } else {
            seen.insert(slot, index);
        }
    }

    errors
}

fn validate_source(source: &RawSourceConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(url) = &source.base_url
        && url.trim().is_empty()
    {
        errors.push(ValidationError::SourceError("base_url cannot be empty".into()));
    }

    if let Some(path) = &source.path
        && path.trim_matches('/').is_empty()
    {
        errors.push(ValidationError::SourceError("path cannot be empty".into()));
    }

    if source.poll_interval_seconds == Some(0) {
        errors.push(ValidationError::SourceError(
            "poll_interval_seconds must be greater than zero".into(),
        ));
    }

    if source.request_timeout_seconds == Some(0) {
        errors.push(ValidationError::SourceError(
            "request_timeout_seconds must be greater than zero".into(),
        ));
    }

    errors
}

fn validate_tariff(tariff: &RawTariffConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(rate) = tariff.rate
        && (!rate.is_finite() || rate < 0.0)
    {
        errors.push(ValidationError::TariffError(format!(
            "rate must be a non-negative number, got {rate}"
        )));
    }

    if let Some(fixed) = tariff.fixed
        && (!fixed.is_finite() || fixed < 0.0)
    {
        errors.push(ValidationError::TariffError(format!(
            "fixed must be a non-negative number, got {fixed}"
        )));
    }

    if let Some(solar) = tariff.solar
        && (!solar.is_finite() || !(0.0..=100.0).contains(&solar))
    {
        errors.push(ValidationError::TariffError(format!(
            "solar must be between 0 and 100, got {solar}"
        )));
    }

    errors
}

fn validate_rule(rule: &RawRule, index: usize) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut push = |message: String| errors.push(ValidationError::RuleError { index, message });

    if let Err(e) = rule.target.parse::<Target>() {
        push(e);
    }
    if let Err(e) = rule.period.parse::<Period>() {
        push(e);
    }
    match rule.metric.parse::<Metric>() {
        Ok(metric) if !metric.is_rule_metric() => {
            push(format!("metric '{}' cannot be used in a rule", rule.metric));
        }
        Ok(_) => {}
        Err(e) => push(e),
    }
    if !rule.limit.is_finite() || rule.limit <= 0.0 {
        push(format!("limit must be a positive number, got {}", rule.limit));
    }

    errors
}
