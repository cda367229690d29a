//! Telemetry reporting
//!
//! This module handles:
//! - Submitting result envelopes to the collector
//! - Transport policy per payload class (default vs extended timeout)
//! - One-shot sensor and location reads

mod reporter;
pub mod sensors;

pub use reporter::{CollectorTransport, HttpCollector, TelemetryReporter};
pub use sensors::SensorEngine;

#[cfg(test)]
pub use reporter::MemoryCollector;
