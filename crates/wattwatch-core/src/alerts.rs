//! Picking the one alert worth showing

use wattwatch_api::{Alert, Breach, Period, Target};

/// 10 for the whole system plus 5 for monthly periods
pub fn derived_score(breach: &Breach) -> u32 {
    let target = if breach.target == Target::Total { 10 } else { 0 };
    let period = if breach.period == Period::Month { 5 } else { 0 };
    target + period
}

/// Sort key: any explicit score ranks above every derived one
fn rank(breach: &Breach) -> (bool, u32) {
    match breach.priority_score {
        Some(score) => (true, score),
        None => (false, derived_score(breach)),
    }
}

/// Highest-ranked breach, earliest first among equals
pub fn select_top_alert(breaches: &[Breach]) -> Option<Alert> {
    let mut ranked: Vec<&Breach> = breaches.iter().collect();
    // sort_by is stable, so ties keep their input order
    ranked.sort_by(|a, b| rank(b).cmp(&rank(a)));

    ranked.first().map(|breach| Alert {
        message: format_message(breach),
        breach: (*breach).clone(),
    })
}

/// The breach's custom message, or one generated from its fields
pub fn format_message(breach: &Breach) -> String {
    if let Some(message) = &breach.custom_message {
        return message.clone();
    }

    let unit = breach.metric.unit();
    let precision = breach.metric.precision();
    let limit = breach
        .limit
        .map(|l| format!("{unit}{l}"))
        .unwrap_or_else(|| "-".to_string());

    format!(
        "WARNING! {} {} {} breached! (Limit: {} | Current: {}{:.*})",
        breach.target.display_name(),
        breach.period.display_name(),
        breach.metric.label(),
        limit,
        unit,
        precision,
        breach.actual,
    )
}
