/// Best-effort analytics sink.
///
/// Events are arbitrary JSON blobs delivered fire-and-forget; every sink
/// failure is swallowed after a local log line and never reaches a request.
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Deliver one event. Must not fail; implementations swallow and log.
    async fn record(&self, event: serde_json::Value);
}

/// Spawn a delivery without blocking the calling request.
pub fn emit(sink: Arc<dyn AnalyticsSink>, event: serde_json::Value) {
    tokio::spawn(async move {
        sink.record(event).await;
    });
}

/// POSTs events to a collector endpoint.
pub struct HttpAnalyticsSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnalyticsSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl AnalyticsSink for HttpAnalyticsSink {
    async fn record(&self, event: serde_json::Value) {
        match self.client.post(&self.endpoint).json(&event).send().await {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!(status = %resp.status(), "analytics collector rejected event");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "analytics delivery failed");
            }
        }
    }
}

/// Used when no collector endpoint is configured.
pub struct NoopSink;

#[async_trait]
impl AnalyticsSink for NoopSink {
    async fn record(&self, _event: serde_json::Value) {}
}
