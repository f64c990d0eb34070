//! Command types for the wattwatchd protocol
//!
//! Requests arrive as newline-delimited JSON on stdin; each gets exactly one
//! `Response` line on stdout, interleaved with `Event` lines.

use serde::{Deserialize, Serialize};
use wattwatch_util::{RuleId, WattwatchError};

use crate::{
    API_VERSION, DashboardSnapshot, HealthStatus, Insight, QuickRange, RangeCost, Rule, RuleFields,
    Target, Tariff,
};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.result, ResponseResult::Ok(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    /// For duplicate rules: the rule the user should look at instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicting_rule: Option<RuleId>,
    /// Position of `conflicting_rule` in the rule list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicting_index: Option<usize>,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            conflicting_rule: None,
            conflicting_index: None,
        }
    }
}

impl From<&WattwatchError> for ErrorInfo {
    fn from(err: &WattwatchError) -> Self {
        let code = match err {
            WattwatchError::RuleNotFound(_) => ErrorCode::RuleNotFound,
            WattwatchError::DuplicateRule { .. } => ErrorCode::DuplicateRule,
            WattwatchError::InvalidRule(_) => ErrorCode::InvalidRule,
            WattwatchError::InvalidTariff(_) => ErrorCode::InvalidTariff,
        };
        let mut info = ErrorInfo::new(code, err.to_string());
        if let WattwatchError::DuplicateRule { existing, index } = err {
            info.conflicting_rule = Some(existing.clone());
            info.conflicting_index = Some(*index);
        }
        info
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidRule,
    DuplicateRule,
    RuleNotFound,
    InvalidTariff,
    SourceError,
}

/// All possible commands from the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Get the latest dashboard snapshot
    GetState,

    /// List rules in insertion order
    ListRules,

    /// Create a rule from user-supplied fields
    CreateRule(RuleFields),

    /// Replace a rule's fields, keeping its id
    UpdateRule { id: RuleId, fields: RuleFields },

    DeleteRule { id: RuleId },

    SetTariff(Tariff),

    SetSolarMode { enabled: bool },

    /// Arm the vacation sentry; whitelisted loads may draw power
    ArmSentry {
        #[serde(default)]
        whitelist: Vec<Target>,
    },

    DisarmSentry,

    /// Energy and cost between two sample keys, inclusive
    RangeCost { start: i64, end: i64 },

    /// Energy and cost over a preset window ending now
    QuickRangeCost { range: QuickRange },

    /// Up to three shuffled insights for the current aggregates
    GetInsights,

    /// Get health status
    GetHealth,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    State(Box<DashboardSnapshot>),
    Rules { rules: Vec<Rule> },
    RuleSaved(Rule),
    RuleDeleted { id: RuleId },
    TariffUpdated(Tariff),
    SolarModeSet { enabled: bool },
    SentryArmed { whitelist: Vec<Target> },
    SentryDisarmed,
    RangeCost {
        start: i64,
        end: i64,
        cost: RangeCost,
    },
    Insights { insights: Vec<Insight> },
    Health(HealthStatus),
    Pong,
}
