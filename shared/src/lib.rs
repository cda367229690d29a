//! Device Agent Shared Protocol Types
//!
//! This crate provides the message types exchanged between the on-device agent,
//! the controller's push channel and the telemetry collector, plus the framing
//! codec and the registration state machine.

pub mod codec;
pub mod state_machine;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Default parameters for the agent
pub mod defaults {
    /// First registration retry delay; doubles on every further failure
    pub const REGISTRATION_BASE_DELAY_MS: u64 = 5000;

    /// Registration retries after the initial attempt before giving up
    pub const REGISTRATION_MAX_RETRIES: u32 = 3;

    /// Request timeout for small JSON/text telemetry
    pub const SMALL_UPLOAD_TIMEOUT_MS: u64 = 10_000;

    /// Request timeout for base64 blob uploads (screenshots, photos, audio)
    pub const LARGE_UPLOAD_TIMEOUT_MS: u64 = 30_000;

    /// Payload sent when a sensor or location fix does not exist
    pub const NOT_AVAILABLE: &str = "Not available";

    /// Payload sent when the platform refuses access
    pub const PERMISSION_DENIED: &str = "Permission Denied";

    /// Foreground package reported before the first focus event arrives
    pub const UNKNOWN_FOREGROUND_APP: &str = "N/A";
}

/// Errors in a command message sent by the controller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message has no 'action' key")]
    MissingAction,

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("action '{action}' requires parameter '{param}'")]
    MissingParameter { action: String, param: String },
}

/// A parsed command message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Lower-cased action name
    pub action: String,
    /// Every other key of the message
    pub params: HashMap<String, String>,
}

impl Command {
    /// Parse the data fields of an inbound push message
    pub fn from_message(msg: &HashMap<String, String>) -> Result<Self, ProtocolError> {
        let action = msg
            .get("action")
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .ok_or(ProtocolError::MissingAction)?;

        let params = msg
            .iter()
            .filter(|(k, _)| k.as_str() != "action")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self { action, params })
    }

    /// Get a parameter, treating empty values as absent
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Parse an integer parameter, substituting `default` on absent or invalid input
    pub fn int_param(&self, name: &str, default: i32) -> i32 {
        self.param(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }
}

/// Transport policy class for a telemetry payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadClass {
    /// JSON or text, default timeout
    Small,
    /// Base64 blob, extended timeout
    Large,
}

/// Telemetry payload body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
    /// Base64-encoded binary data
    Blob(String),
}

impl Payload {
    pub fn class(&self) -> PayloadClass {
        match self {
            Payload::Blob(_) => PayloadClass::Large,
            Payload::Text(_) | Payload::Json(_) => PayloadClass::Small,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Payload::Text(value.into())
    }

    /// Returns the text body, if this is a text payload
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// One result or reading submitted to the collector
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub device_id: String,
    pub data_type: String,
    pub payload: Payload,
}

impl TelemetryEvent {
    pub fn new(device_id: impl Into<String>, data_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            device_id: device_id.into(),
            data_type: data_type.into(),
            payload,
        }
    }

    /// Build the `<type>_error` event for a failed capability call
    pub fn error(
        device_id: impl Into<String>,
        data_type: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            device_id,
            format!("{}_error", data_type),
            Payload::Text(message.into()),
        )
    }

    pub fn class(&self) -> PayloadClass {
        self.payload.class()
    }
}

/// Body of the registration POST
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub device_id: String,
    pub token: String,
}

/// A frame received on the push channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    /// Command data fields
    Command { data: HashMap<String, String> },
    /// New or refreshed channel token
    Token { token: String },
}
