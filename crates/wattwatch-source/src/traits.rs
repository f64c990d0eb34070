//! Sample source traits

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use wattwatch_api::Sample;

/// Errors from sample source operations
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Events delivered by a live subscription
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// A newly appended sample
    Sample(Sample),

    /// The subscription could not reach the source. It keeps trying.
    Error(String),
}

/// Sample source trait - an append-only log of timestamped readings, keyed by
/// integer seconds.
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// All samples with `start_key <= key <= end_key`, in increasing key order
    async fn range(&self, start_key: i64, end_key: i64) -> SourceResult<Vec<Sample>>;

    /// Subscribe to samples with key >= `from_key`, delivered in non-decreasing
    /// key order. The consumer is responsible for skipping keys it has already
    /// ingested.
    fn subscribe(&self, from_key: i64) -> mpsc::UnboundedReceiver<SourceEvent>;

    /// Optional: check if the source was reachable on its last request
    fn is_healthy(&self) -> bool {
        true
    }
}
