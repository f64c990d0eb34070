//! Data model and protocol types for wattwatch
//!
//! This crate defines the types shared by every wattwatch crate and the
//! stable API between wattwatchd and the presentation layer:
//! - Samples, aggregates, rules, breaches, grades
//! - Commands and responses
//! - Events (service -> presentation)
//! - Versioning

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
