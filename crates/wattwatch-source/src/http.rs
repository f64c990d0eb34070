//! Sample source over the realtime database REST API
//!
//! Range queries use `orderBy="$key"` with `startAt`/`endAt`. The live
//! subscription polls for keys at or after the last delivered one, because a
//! plain HTTP client has no push channel.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wattwatch_api::Sample;

use crate::{SampleSource, SourceError, SourceEvent, SourceResult, decode_samples, format_key};

/// Connection settings for [`HttpSource`]
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Database root, without a trailing slash
    pub base_url: String,
    /// Path of the history node, without leading or trailing slashes
    pub path: String,
    pub auth_token: Option<String>,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

struct Inner {
    client: Client,
    config: HttpSourceConfig,
    healthy: AtomicBool,
}

/// REST-backed sample source
#[derive(Clone)]
pub struct HttpSource {
    inner: Arc<Inner>,
}

impl HttpSource {
    pub fn new(config: HttpSourceConfig) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| SourceError::Internal(format!("failed to create HTTP client: {e}")))?;

        info!(
            base_url = %config.base_url,
            path = %config.path,
            poll_interval_secs = config.poll_interval.as_secs(),
            "HTTP sample source configured"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                config,
                healthy: AtomicBool::new(true),
            }),
        })
    }

    fn url(&self) -> String {
        self.inner.url()
    }
}

impl Inner {
    fn url(&self) -> String {
        format!("{}/{}.json", self.config.base_url, self.config.path)
    }

    /// Fetch samples with keys in `[start_key, end_key]`; an open end when None
    async fn fetch(&self, start_key: i64, end_key: Option<i64>) -> SourceResult<Vec<Sample>> {
        let mut query = vec![
            ("orderBy", "\"$key\"".to_string()),
            ("startAt", format!("\"{}\"", format_key(start_key))),
        ];
        if let Some(end) = end_key {
            query.push(("endAt", format!("\"{}\"", format_key(end))));
        }
        if let Some(token) = &self.config.auth_token {
            query.push(("auth", token.clone()));
        }

        let result = self.request(&query).await;
        self.healthy.store(result.is_ok(), Ordering::Relaxed);
        result
    }

    async fn request(&self, query: &[(&str, String)]) -> SourceResult<Vec<Sample>> {
        let url = self.url();
        debug!(url = %url, "Querying sample source");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::Decode(e.to_string())
            }
        })?;

        decode_samples(&body)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Request(e.to_string())
    }
}

#[async_trait]
impl SampleSource for HttpSource {
    async fn range(&self, start_key: i64, end_key: i64) -> SourceResult<Vec<Sample>> {
        let samples = self.inner.fetch(start_key, Some(end_key)).await?;
        debug!(
            start_key,
            end_key,
            count = samples.len(),
            url = %self.url(),
            "Range query complete"
        );
        Ok(samples)
    }

    fn subscribe(&self, from_key: i64) -> mpsc::UnboundedReceiver<SourceEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = self.inner.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(inner.config.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            // First poll includes from_key itself, later ones only newer keys
            let mut cursor = from_key;
            let mut delivered_any = false;

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = tx.closed() => {
                        debug!("Subscription receiver dropped, stopping poll");
                        break;
                    }
                }

                match inner.fetch(cursor, None).await {
                    Ok(samples) => {
                        for sample in samples {
                            if delivered_any && sample.timestamp <= cursor {
                                continue;
                            }
                            cursor = sample.timestamp;
                            delivered_any = true;
                            if tx.send(SourceEvent::Sample(sample)).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Subscription poll failed");
                        if tx.send(SourceEvent::Error(e.to_string())).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        rx
    }

    fn is_healthy(&self) -> bool {
        self.inner.healthy.load(Ordering::Relaxed)
    }
}
