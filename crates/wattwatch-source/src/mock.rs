//! Mock sample source for testing

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use wattwatch_api::Sample;

use crate::{SampleSource, SourceError, SourceEvent, SourceResult};

/// In-memory sample log for unit/integration testing
pub struct MockSource {
    samples: Arc<Mutex<Vec<Sample>>>,
    subscribers: Arc<Mutex<Vec<(i64, mpsc::UnboundedSender<SourceEvent>)>>>,

    /// Configure range queries to fail
    pub fail_range: Arc<Mutex<bool>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            samples: Arc::new(Mutex::new(Vec::new())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            fail_range: Arc::new(Mutex::new(false)),
        }
    }

    /// Create a source pre-loaded with samples
    pub fn with_samples(samples: impl IntoIterator<Item = Sample>) -> Self {
        let source = Self::new();
        for sample in samples {
            source.push(sample);
        }
        source
    }

    /// Append a sample, delivering it to live subscribers whose start key it reaches
    pub fn push(&self, sample: Sample) {
        {
            let subscribers = self.subscribers.lock().unwrap();
            for (from_key, tx) in subscribers.iter() {
                if sample.timestamp >= *from_key {
                    let _ = tx.send(SourceEvent::Sample(sample.clone()));
                }
            }
        }

        let mut samples = self.samples.lock().unwrap();
        samples.push(sample);
        samples.sort_by_key(|s| s.timestamp);
    }

    /// Deliver the same sample again, as a flaky transport might
    pub fn redeliver(&self, sample: Sample) {
        let subscribers = self.subscribers.lock().unwrap();
        for (_, tx) in subscribers.iter() {
            let _ = tx.send(SourceEvent::Sample(sample.clone()));
        }
    }

    /// Simulate a subscription failure
    pub fn emit_error(&self, message: impl Into<String>) {
        let message = message.into();
        let subscribers = self.subscribers.lock().unwrap();
        for (_, tx) in subscribers.iter() {
            let _ = tx.send(SourceEvent::Error(message.clone()));
        }
    }

    pub fn set_fail_range(&self, fail: bool) {
        *self.fail_range.lock().unwrap() = fail;
    }

    pub fn sample_count(&self) -> usize {
        self.samples.lock().unwrap().len()
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SampleSource for MockSource {
    async fn range(&self, start_key: i64, end_key: i64) -> SourceResult<Vec<Sample>> {
        if *self.fail_range.lock().unwrap() {
            return Err(SourceError::Request("Mock range failure".into()));
        }

        Ok(self
            .samples
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.timestamp >= start_key && s.timestamp <= end_key)
            .cloned()
            .collect())
    }

    fn subscribe(&self, from_key: i64) -> mpsc::UnboundedReceiver<SourceEvent> {
        let (tx, rx) = mpsc::unbounded_channel();

        // Backlog first, then live pushes
        for sample in self.samples.lock().unwrap().iter() {
            if sample.timestamp >= from_key {
                let _ = tx.send(SourceEvent::Sample(sample.clone()));
            }
        }

        self.subscribers.lock().unwrap().push((from_key, tx));
        rx
    }

    fn is_healthy(&self) -> bool {
        !*self.fail_range.lock().unwrap()
    }
}
