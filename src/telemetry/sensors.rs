//! One-shot sensor and location reads
//!
//! Each requested sensor yields exactly one event: `"Not available"` without
//! subscribing when the hardware is absent, otherwise the first reading of a
//! fresh subscription, which is dropped right after.

use super::TelemetryReporter;
use crate::capability::{
    guarded, guarded_sync, CapabilityError, LocationProvider, SensorFamily, SensorHub, SensorKind,
    SensorReading,
};
use agent_shared::{defaults, Payload};
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

const LOCATION: &str = "location";

/// Build the JSON payload for a reading of `kind`
pub fn reading_payload(kind: SensorKind, reading: &SensorReading) -> Result<Value, String> {
    let v = &reading.values;
    let need = match kind.family() {
        SensorFamily::Axis | SensorFamily::Quaternion => 3,
        SensorFamily::Scalar => 1,
    };
    if v.len() < need {
        return Err(format!(
            "{} reading has {} values, expected {}",
            kind.data_type(),
            v.len(),
            need
        ));
    }

    Ok(match kind.family() {
        SensorFamily::Axis => json!({ "x": v[0], "y": v[1], "z": v[2] }),
        SensorFamily::Scalar => json!({ "value": v[0] }),
        SensorFamily::Quaternion => {
            let mut obj = json!({ "x": v[0], "y": v[1], "z": v[2] });
            if let Some(w) = v.get(3) {
                obj["w"] = json!(w);
            }
            obj
        }
    })
}

#[derive(Clone)]
pub struct SensorEngine {
    hub: Arc<dyn SensorHub>,
    location: Arc<dyn LocationProvider>,
    reporter: TelemetryReporter,
}

impl SensorEngine {
    pub fn new(
        hub: Arc<dyn SensorHub>,
        location: Arc<dyn LocationProvider>,
        reporter: TelemetryReporter,
    ) -> Self {
        Self {
            hub,
            location,
            reporter,
        }
    }

    /// Read every kind once, concurrently. Duplicates are read once.
    pub async fn read_all(&self, kinds: &[SensorKind]) {
        let mut unique: Vec<SensorKind> = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if !unique.contains(kind) {
                unique.push(*kind);
            }
        }
        join_all(unique.into_iter().map(|kind| self.read_once(kind))).await;
    }

    /// Capture a single reading of `kind` and report it
    pub async fn read_once(&self, kind: SensorKind) {
        let data_type = kind.data_type();

        match guarded_sync(|| Ok(self.hub.is_available(kind))) {
            Ok(true) => {}
            Ok(false) => {
                debug!("[SENSOR] {} not present", data_type);
                self.reporter
                    .submit(data_type, Payload::text(defaults::NOT_AVAILABLE))
                    .await;
                return;
            }
            Err(e) => {
                warn!("[SENSOR] Availability check for {} failed: {}", data_type, e);
                self.reporter.submit_error(data_type, e.to_string()).await;
                return;
            }
        }

        let mut readings = match guarded_sync(|| self.hub.subscribe(kind)) {
            Ok(rx) => rx,
            Err(e) => {
                warn!("[SENSOR] Subscribe to {} failed: {}", data_type, e);
                self.reporter.submit_error(data_type, e.to_string()).await;
                return;
            }
        };

        let first = readings.recv().await;
        drop(readings);
        if let Err(e) = guarded_sync(|| {
            self.hub.unsubscribe(kind);
            Ok(())
        }) {
            warn!("[SENSOR] Unsubscribe from {} failed: {}", data_type, e);
        }

        match first.map(|r| reading_payload(kind, &r)) {
            Some(Ok(payload)) => self.reporter.submit(data_type, Payload::Json(payload)).await,
            Some(Err(msg)) => self.reporter.submit_error(data_type, msg).await,
            None => {
                self.reporter
                    .submit_error(data_type, "Sensor stream ended without a reading")
                    .await
            }
        }
    }

    /// Report the last known location
    pub async fn locate(&self) {
        let payload = match guarded(self.location.last_known()).await {
            Ok(Some(fix)) => Payload::Json(json!({
                "latitude": fix.latitude,
                "longitude": fix.longitude,
            })),
            Ok(None) => Payload::text(defaults::NOT_AVAILABLE),
            Err(CapabilityError::PermissionDenied(reason)) => {
                warn!("[SENSOR] Location denied: {}", reason);
                Payload::text(defaults::PERMISSION_DENIED)
            }
            Err(e) => {
                warn!("[SENSOR] Location failed: {}", e);
                self.reporter.submit_error(LOCATION, e.to_string()).await;
                return;
            }
        };
        self.reporter.submit(LOCATION, payload).await;
    }
}
