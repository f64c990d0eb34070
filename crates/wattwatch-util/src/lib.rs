//! Shared utilities for wattwatch
//!
//! This crate provides:
//! - ID types (RuleId)
//! - Calendar time utilities (day/month boundaries in local time, mock clock)
//! - Error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
