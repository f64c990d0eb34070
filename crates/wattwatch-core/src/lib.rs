//! Energy engine for wattwatchd
//!
//! This crate is the heart of wattwatchd, containing:
//! - Calendar period tracking and rollover detection
//! - Rolling today/yesterday/month aggregation
//! - The rule book and rule evaluation
//! - Carbon grades, the A+ streak and alert prioritization
//! - Insights, range costing and the vacation sentry

mod aggregator;
mod alerts;
mod cost;
mod engine;
mod evaluator;
mod events;
mod gamification;
mod insights;
mod period;
mod rules;
mod sentry;

pub use aggregator::*;
pub use alerts::*;
pub use cost::*;
pub use engine::*;
pub use evaluator::*;
pub use events::*;
pub use gamification::*;
pub use insights::*;
pub use period::*;
pub use rules::*;
pub use sentry::*;
