//! Error types for wattwatch

use thiserror::Error;

use crate::RuleId;

/// Core error type for wattwatch operations
#[derive(Debug, Error)]
pub enum WattwatchError {
    #[error("Rule not found: {0}")]
    RuleNotFound(RuleId),

    /// A rule with the same target, period and metric already exists.
    /// `index` is the position of the conflicting rule in the ordered rule list.
    #[error("Duplicate rule: conflicts with existing rule {existing} at position {index}")]
    DuplicateRule { existing: RuleId, index: usize },

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid tariff: {0}")]
    InvalidTariff(String),
}

impl WattwatchError {
    pub fn invalid_rule(msg: impl Into<String>) -> Self {
        Self::InvalidRule(msg.into())
    }

    pub fn invalid_tariff(msg: impl Into<String>) -> Self {
        Self::InvalidTariff(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, WattwatchError>;
