//! Shared types for the wattwatch API

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use wattwatch_util::{RuleId, WattwatchError};

/// What a rule (or an aggregate lookup) measures: one appliance or the whole system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Load1,
    Load2,
    Load3,
    Total,
}

impl Target {
    /// Human-readable appliance name
    pub fn display_name(&self) -> &'static str {
        match self {
            Target::Total => "Total System",
            Target::Load1 => "Iron",
            Target::Load2 => "Hair Dryer",
            Target::Load3 => "Bulb",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Load1 => "load1",
            Target::Load2 => "load2",
            Target::Load3 => "load3",
            Target::Total => "total",
        }
    }
}

impl std::str::FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "load1" => Ok(Target::Load1),
            "load2" => Ok(Target::Load2),
            "load3" => Ok(Target::Load3),
            "total" => Ok(Target::Total),
            other => Err(format!("unknown target: {other}")),
        }
    }
}

/// Rule period. Yesterday is tracked by the aggregator but cannot be budgeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Today,
    Month,
}

impl Period {
    pub fn display_name(&self) -> &'static str {
        match self {
            Period::Today => "Daily",
            Period::Month => "Monthly",
        }
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" => Ok(Period::Today),
            "month" => Ok(Period::Month),
            other => Err(format!("unknown period: {other}")),
        }
    }
}

/// Unit a rule limit is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// kWh
    Energy,
    /// kWh x tariff rate
    Cost,
    /// Carbon grade alert; only produced by gamification, never by a rule
    Eco,
}

impl Metric {
    pub fn is_rule_metric(&self) -> bool {
        matches!(self, Metric::Energy | Metric::Cost)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Energy => "Energy Usage",
            Metric::Cost => "Cost Limit",
            Metric::Eco => "Carbon Footprint",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Energy => "kWh",
            Metric::Cost => "₹",
            Metric::Eco => "kg",
        }
    }

    /// Decimal places used when showing an actual value
    pub fn precision(&self) -> usize {
        match self {
            Metric::Energy => 3,
            Metric::Cost | Metric::Eco => 2,
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "energy" => Ok(Metric::Energy),
            "cost" => Ok(Metric::Cost),
            "eco" => Ok(Metric::Eco),
            other => Err(format!("unknown metric: {other}")),
        }
    }
}

/// Parse a loosely-typed reading field.
///
/// Numbers pass through. Strings are read up to the end of their leading
/// number, so `"3.5kWh"` is 3.5. Anything else (missing, null, garbage, NaN,
/// infinities) becomes zero.
pub fn lenient_number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => numeric_prefix(s).unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() { parsed } else { 0.0 }
}

/// The decimal number at the start of `s`, ignoring leading whitespace and
/// whatever follows it
fn numeric_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - end - 1;
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return None;
    }

    // An exponent only counts when digits follow it
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

/// One appliance's reading within a sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Watt-hours consumed during the sample interval
    pub energy: f64,
    /// Instantaneous power draw in watts (0 when not reported)
    #[serde(default)]
    pub power: f64,
    /// Instantaneous current in amps (0 when not reported)
    #[serde(default)]
    pub current: f64,
}

impl Reading {
    pub fn from_value(value: &Value) -> Self {
        Self {
            energy: lenient_number(value.get("energy")),
            power: lenient_number(value.get("power")),
            current: lenient_number(value.get("current")),
        }
    }
}

/// One timestamped reading from the monitored appliances
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the Unix epoch; also the sample's key in the source
    pub timestamp: i64,
    pub load1: Option<Reading>,
    pub load2: Option<Reading>,
    pub load3: Option<Reading>,
}

impl Sample {
    /// Decode a sample from its source key and JSON value.
    ///
    /// Returns `None` when the key is not an integer timestamp. Malformed
    /// appliance entries degrade to zero readings.
    pub fn from_key_value(key: &str, value: &Value) -> Option<Self> {
        let timestamp = key.trim().parse::<i64>().ok()?;
        let reading = |name: &str| value.get(name).map(Reading::from_value);
        Some(Self {
            timestamp,
            load1: reading("load1"),
            load2: reading("load2"),
            load3: reading("load3"),
        })
    }

    pub fn reading(&self, target: Target) -> Option<&Reading> {
        match target {
            Target::Load1 => self.load1.as_ref(),
            Target::Load2 => self.load2.as_ref(),
            Target::Load3 => self.load3.as_ref(),
            Target::Total => None,
        }
    }

    /// Per-appliance energy deltas carried by this sample
    pub fn energy_delta(&self) -> EnergyDelta {
        let energy = |r: &Option<Reading>| r.map(|r| r.energy).unwrap_or(0.0);
        EnergyDelta {
            load1: energy(&self.load1),
            load2: energy(&self.load2),
            load3: energy(&self.load3),
        }
    }
}

/// Energy in Wh attributed to one sample, per appliance
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyDelta {
    pub load1: f64,
    pub load2: f64,
    pub load3: f64,
}

impl EnergyDelta {
    pub fn total(&self) -> f64 {
        self.load1 + self.load2 + self.load3
    }
}

/// Rolling sums for one period, in Wh
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodAggregate {
    pub load1: f64,
    pub load2: f64,
    pub load3: f64,
    pub total: f64,
}

impl PeriodAggregate {
    /// Add one sample's deltas. `total` grows by the same step sum so parts and
    /// whole never drift apart through independent rounding.
    pub fn add(&mut self, delta: &EnergyDelta) {
        self.load1 += delta.load1;
        self.load2 += delta.load2;
        self.load3 += delta.load3;
        self.total += delta.total();
    }

    pub fn get(&self, target: Target) -> f64 {
        match target {
            Target::Load1 => self.load1,
            Target::Load2 => self.load2,
            Target::Load3 => self.load3,
            Target::Total => self.total,
        }
    }
}

/// The three rolling windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub today: PeriodAggregate,
    pub yesterday: PeriodAggregate,
    pub month: PeriodAggregate,
}

impl Aggregates {
    pub fn for_period(&self, period: Period) -> &PeriodAggregate {
        match period {
            Period::Today => &self.today,
            Period::Month => &self.month,
        }
    }
}

/// Period boundary timestamps, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baselines {
    pub start_of_month: i64,
    pub start_of_today: i64,
    pub start_of_yesterday: i64,
}

/// User-editable part of a rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleFields {
    pub target: Target,
    pub period: Period,
    pub metric: Metric,
    pub limit: f64,
}

impl RuleFields {
    /// True when both describe the same {target, period, metric} slot
    pub fn same_slot(&self, other: &RuleFields) -> bool {
        self.target == other.target && self.period == other.period && self.metric == other.metric
    }
}

/// A budget rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    #[serde(flatten)]
    pub fields: RuleFields,
}

impl Rule {
    pub fn new(fields: RuleFields) -> Self {
        Self {
            id: RuleId::new(),
            fields,
        }
    }
}

/// A rule whose actual value exceeded its limit, or the synthetic eco alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breach {
    /// None for the gamification alert
    pub rule_id: Option<RuleId>,
    pub target: Target,
    pub period: Period,
    pub metric: Metric,
    pub limit: Option<f64>,
    pub actual: f64,
    /// Explicit ranking; set only on gamification alerts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<u32>,
    /// Literal message that replaces the generated one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_message: Option<String>,
}

impl Breach {
    pub fn from_rule(rule: &Rule, actual: f64) -> Self {
        Self {
            rule_id: Some(rule.id.clone()),
            target: rule.fields.target,
            period: rule.fields.period,
            metric: rule.fields.metric,
            limit: Some(rule.fields.limit),
            actual,
            priority_score: None,
            custom_message: None,
        }
    }
}

/// The single breach chosen for prominent display, with its message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub breach: Breach,
    pub message: String,
}

/// Fill level of a rule's budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleProgress {
    pub rule_id: RuleId,
    pub actual: f64,
    pub limit: f64,
    /// 0..=100
    pub percent: f64,
}

/// Carbon grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn label(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }

    pub fn color_class(&self) -> &'static str {
        match self {
            Grade::APlus => "grade-a-plus",
            Grade::A => "grade-a",
            Grade::B => "grade-b",
            Grade::C => "grade-c",
            Grade::D => "grade-d",
        }
    }

    pub fn status_text(&self) -> &'static str {
        match self {
            Grade::APlus => "Eco-Champion / Very Safe",
            Grade::A => "Good / Safe",
            Grade::B => "Average",
            Grade::C => "High Emission / Warning",
            Grade::D => "Critical / Extreme Usage",
        }
    }

    /// Only the poor grades raise an eco alert
    pub fn triggers_alert(&self) -> bool {
        matches!(self, Grade::C | Grade::D)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Grade plus its presentation hints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeState {
    pub grade: Grade,
    pub color_class: String,
    pub status: String,
}

/// Consecutive days at grade A+
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub count: u32,
    pub last_evaluated: Option<NaiveDate>,
}

impl StreakState {
    pub fn badge(&self) -> String {
        match self.count {
            0 => "🎯 Keep daily emissions under 2.3kg to start a streak!".to_string(),
            n if n >= 7 => format!("🏆 {n}-Day A+ Streak!"),
            n => format!("🔥 {n}-Day A+ Streak!"),
        }
    }
}

/// Electricity pricing and solar share
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    /// Currency per kWh
    pub rate: f64,
    /// Fixed monthly charge
    pub fixed: f64,
    /// Percent of consumption covered by solar, 0-100
    #[serde(default)]
    pub solar: f64,
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            rate: 5.33,
            fixed: 135.0,
            solar: 0.0,
        }
    }
}

impl Tariff {
    pub fn validate(&self) -> Result<(), WattwatchError> {
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(WattwatchError::invalid_tariff("rate must be a non-negative number"));
        }
        if !self.fixed.is_finite() || self.fixed < 0.0 {
            return Err(WattwatchError::invalid_tariff(
                "fixed charge must be a non-negative number",
            ));
        }
        if !self.solar.is_finite() || !(0.0..=100.0).contains(&self.solar) {
            return Err(WattwatchError::invalid_tariff("solar share must be between 0 and 100"));
        }
        Ok(())
    }
}

/// Everyday comparisons for a month's emissions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Equivalencies {
    pub km_driven: f64,
    pub trees_needed: u64,
    pub phone_charges: u64,
    /// Emissions were zeroed by solar mode
    pub solar: bool,
}

/// Carbon view of the current aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonSummary {
    pub co2_today_kg: f64,
    pub co2_month_kg: f64,
    pub grade_today: GradeState,
    pub grade_month: GradeState,
    pub equivalencies: Equivalencies,
}

/// Everything the presentation layer needs, recomputed on every pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Local>,
    pub solar_mode: bool,
    pub tariff: Tariff,
    pub baselines: Baselines,
    pub aggregates: Aggregates,
    pub rules: Vec<Rule>,
    pub breaches: Vec<Breach>,
    pub top_alert: Option<Alert>,
    pub progress: Vec<RuleProgress>,
    pub carbon: CarbonSummary,
    pub streak: StreakState,
    pub streak_badge: String,
}

/// Energy and cost over an arbitrary time range
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeCost {
    pub kwh_load1: f64,
    pub kwh_load2: f64,
    pub kwh_load3: f64,
    pub kwh_total: f64,
    pub cost_load1: f64,
    pub cost_load2: f64,
    pub cost_load3: f64,
    pub cost_total: f64,
    pub sample_count: usize,
}

/// Preset windows for the range cost calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickRange {
    #[serde(rename = "last_5_minutes")]
    Last5Minutes,
    LastHour,
    #[serde(rename = "last_24_hours")]
    Last24Hours,
    Today,
    Yesterday,
    #[serde(rename = "last_7_days")]
    Last7Days,
    ThisMonth,
    LastMonth,
    ThisYear,
}

/// Category of a generated usage insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    HeavyLifter,
    Savings,
    SlabProximity,
    VampireDrain,
    Solar,
    Projection,
    BuildingProfile,
    LowUse,
    EfficiencyWin,
}

/// A short piece of advice derived from the current aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub message: String,
}

/// Vacation-mode intrusion report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentryTrip {
    pub target: Target,
    pub power_watts: f64,
    pub message: String,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub source_ok: bool,
    pub store_ok: bool,
    /// Highest sample key ingested so far
    pub latest_key: Option<i64>,
}
