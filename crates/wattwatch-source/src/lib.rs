//! Sample source interfaces for wattwatchd
//!
//! This crate defines the seam between the engine and the realtime data
//! store: an async `SampleSource` trait, JSON decoding, a REST implementation,
//! and an in-memory mock.

mod decode;
mod http;
mod mock;
mod traits;

pub use decode::*;
pub use http::*;
pub use mock::*;
pub use traits::*;
