//! Telemetry Reporter
//!
//! Wraps results in the `{deviceId, dataType, payload}` envelope and posts
//! each one once. Outcomes are only logged; there is no application-level
//! retry for telemetry.

use crate::config::CollectorConfig;
use agent_shared::{Payload, PayloadClass, TelemetryEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Delivers one telemetry envelope to the collector
#[async_trait]
pub trait CollectorTransport: Send + Sync {
    async fn post(&self, event: &TelemetryEvent) -> Result<()>;
}

/// HTTP collector with separate endpoints and timeouts per payload class
pub struct HttpCollector {
    client: reqwest::Client,
    submit_url: String,
    upload_url: String,
    small_timeout: Duration,
    large_timeout: Duration,
}

impl HttpCollector {
    pub fn new(client: reqwest::Client, config: &CollectorConfig) -> Self {
        Self {
            client,
            submit_url: config.submit_url.clone(),
            upload_url: config.upload_url.clone(),
            small_timeout: config.small_timeout(),
            large_timeout: config.large_timeout(),
        }
    }

    fn route(&self, class: PayloadClass) -> (&str, Duration) {
        match class {
            PayloadClass::Small => (&self.submit_url, self.small_timeout),
            PayloadClass::Large => (&self.upload_url, self.large_timeout),
        }
    }
}

#[async_trait]
impl CollectorTransport for HttpCollector {
    async fn post(&self, event: &TelemetryEvent) -> Result<()> {
        let (url, timeout) = self.route(event.class());

        self.client
            .post(url)
            .timeout(timeout)
            .json(event)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?
            .error_for_status()
            .context("Collector returned error status")?;

        Ok(())
    }
}

/// Submits telemetry for this device
#[derive(Clone)]
pub struct TelemetryReporter {
    device_id: Arc<str>,
    transport: Arc<dyn CollectorTransport>,
}

impl TelemetryReporter {
    pub fn new(device_id: impl Into<String>, transport: Arc<dyn CollectorTransport>) -> Self {
        Self {
            device_id: Arc::from(device_id.into()),
            transport,
        }
    }

    /// Submit a result payload
    pub async fn submit(&self, data_type: &str, payload: Payload) {
        self.submit_event(TelemetryEvent::new(&*self.device_id, data_type, payload))
            .await;
    }

    /// Submit a `<data_type>_error` event with a short diagnostic
    pub async fn submit_error(&self, data_type: &str, message: impl Into<String>) {
        self.submit_event(TelemetryEvent::error(&*self.device_id, data_type, message))
            .await;
    }

    pub async fn submit_event(&self, event: TelemetryEvent) {
        match self.transport.post(&event).await {
            Ok(()) => debug!(
                "[TELEMETRY] Submitted {} ({:?})",
                event.data_type,
                event.class()
            ),
            Err(e) => error!("[TELEMETRY] Failed to submit {}: {:#}", event.data_type, e),
        }
    }
}

/// Collector that keeps submitted events in memory
#[cfg(test)]
#[derive(Default)]
pub struct MemoryCollector {
    events: std::sync::Mutex<Vec<TelemetryEvent>>,
    fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MemoryCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn data_types(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.data_type).collect()
    }

    /// Record posts but report them as failed
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
#[async_trait]
impl CollectorTransport for MemoryCollector {
    async fn post(&self, event: &TelemetryEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("collector unreachable");
        }
        Ok(())
    }
}
