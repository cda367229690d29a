//! Capability layer
//!
//! Boundary traits for the device facilities the agent drives. Every call is
//! fallible; handlers convert failures into telemetry or log lines and the
//! agent keeps running.

pub mod simulated;

use async_trait::async_trait;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

pub use simulated::SimulatedDevice;

/// Errors returned by capability providers
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// Global navigation gestures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    Back,
    Home,
    Recents,
}

/// Settings panels the agent can bring up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsPanel {
    Wifi,
    Bluetooth,
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryInfo {
    pub percentage: f32,
    pub is_charging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Shape of the values a sensor reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFamily {
    /// x, y, z
    Axis,
    /// single value
    Scalar,
    /// x, y, z and optional w
    Quaternion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    MagneticField,
    Light,
    Pressure,
    Proximity,
    RotationVector,
}

impl SensorKind {
    pub const ALL: [SensorKind; 7] = [
        SensorKind::Accelerometer,
        SensorKind::Gyroscope,
        SensorKind::MagneticField,
        SensorKind::Light,
        SensorKind::Pressure,
        SensorKind::Proximity,
        SensorKind::RotationVector,
    ];

    /// Telemetry data type and command-parameter name
    pub fn data_type(&self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "accelerometer",
            SensorKind::Gyroscope => "gyroscope",
            SensorKind::MagneticField => "magnetic_field",
            SensorKind::Light => "light",
            SensorKind::Pressure => "pressure",
            SensorKind::Proximity => "proximity",
            SensorKind::RotationVector => "rotation_vector",
        }
    }

    pub fn family(&self) -> SensorFamily {
        match self {
            SensorKind::Accelerometer | SensorKind::Gyroscope | SensorKind::MagneticField => {
                SensorFamily::Axis
            }
            SensorKind::Light | SensorKind::Pressure | SensorKind::Proximity => {
                SensorFamily::Scalar
            }
            SensorKind::RotationVector => SensorFamily::Quaternion,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.data_type() == name)
    }
}

/// One sample from a sensor stream
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub values: Vec<f32>,
}

/// Window-focus change reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFocusEvent {
    pub package: String,
}

#[async_trait]
pub trait DeviceControl: Send + Sync {
    async fn lock_screen(&self) -> CapabilityResult<()>;
    async fn open_power_menu(&self) -> CapabilityResult<()>;
    async fn wake_screen(&self) -> CapabilityResult<()>;
    async fn navigate(&self, action: NavAction) -> CapabilityResult<()>;
    async fn open_settings_panel(&self, panel: SettingsPanel) -> CapabilityResult<()>;
}

#[async_trait]
pub trait AppManager: Send + Sync {
    /// User-installed packages mapped to their display labels
    async fn installed_apps(&self) -> CapabilityResult<BTreeMap<String, String>>;
    async fn open_app(&self, package: &str) -> CapabilityResult<()>;
    async fn install_from(&self, url: &str) -> CapabilityResult<()>;
    async fn uninstall(&self, package: &str) -> CapabilityResult<()>;
}

#[async_trait]
pub trait DeviceStatus: Send + Sync {
    async fn battery(&self) -> CapabilityResult<BatteryInfo>;
    async fn screen_interactive(&self) -> CapabilityResult<bool>;
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Last known fix; `Ok(None)` when the platform has none.
    /// Authorisation failures must be `CapabilityError::PermissionDenied`.
    async fn last_known(&self) -> CapabilityResult<Option<Location>>;
}

pub trait SensorHub: Send + Sync {
    fn is_available(&self, kind: SensorKind) -> bool;
    fn subscribe(&self, kind: SensorKind) -> CapabilityResult<mpsc::Receiver<SensorReading>>;
    fn unsubscribe(&self, kind: SensorKind);
}

/// Out-of-process capture surfaces
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    async fn take_picture(&self, camera_id: i32) -> CapabilityResult<Vec<u8>>;
    async fn take_screenshot(&self) -> CapabilityResult<Vec<u8>>;
}

pub trait AudioRecorder: Send + Sync {
    /// Begin recording into `path`
    fn start(&self, path: &Path) -> CapabilityResult<()>;
    /// Finalise the file and release the recording resource
    fn stop(&self) -> CapabilityResult<()>;
}

#[async_trait]
pub trait MediaOutput: Send + Sync {
    async fn play_sound(&self, url: &str) -> CapabilityResult<()>;
    async fn show_image(&self, url: &str) -> CapabilityResult<()>;
    /// `percent` is within 0..=100
    async fn set_volume(&self, percent: u8) -> CapabilityResult<()>;
}

/// Every capability the agent uses
#[derive(Clone)]
pub struct Capabilities {
    pub device: Arc<dyn DeviceControl>,
    pub apps: Arc<dyn AppManager>,
    pub status: Arc<dyn DeviceStatus>,
    pub location: Arc<dyn LocationProvider>,
    pub sensors: Arc<dyn SensorHub>,
    pub capture: Arc<dyn CaptureProvider>,
    pub recorder: Arc<dyn AudioRecorder>,
    pub media: Arc<dyn MediaOutput>,
}

impl Capabilities {
    /// Use one provider for every capability
    pub fn from_provider<P>(provider: Arc<P>) -> Self
    where
        P: DeviceControl
            + AppManager
            + DeviceStatus
            + LocationProvider
            + SensorHub
            + CaptureProvider
            + AudioRecorder
            + MediaOutput
            + 'static,
    {
        Self {
            device: provider.clone(),
            apps: provider.clone(),
            status: provider.clone(),
            location: provider.clone(),
            sensors: provider.clone(),
            capture: provider.clone(),
            recorder: provider.clone(),
            media: provider,
        }
    }
}

/// Await a capability call, turning a panic into `CapabilityError::Failed`
pub async fn guarded<T, F>(call: F) -> CapabilityResult<T>
where
    F: Future<Output = CapabilityResult<T>>,
{
    AssertUnwindSafe(call)
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(CapabilityError::Failed("capability panicked".into())))
}

/// Synchronous counterpart of [`guarded`]
pub fn guarded_sync<T>(call: impl FnOnce() -> CapabilityResult<T>) -> CapabilityResult<T> {
    panic::catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|_| Err(CapabilityError::Failed("capability panicked".into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_names() {
        for kind in SensorKind::ALL {
            assert_eq!(SensorKind::from_name(kind.data_type()), Some(kind));
        }
        assert_eq!(SensorKind::from_name(" Light "), Some(SensorKind::Light));
        assert_eq!(SensorKind::from_name("thermometer"), None);
    }

    #[tokio::test]
    async fn test_guarded_catches_panic() {
        let result: CapabilityResult<()> = guarded(async { panic!("driver crashed") }).await;
        assert!(matches!(result, Err(CapabilityError::Failed(_))));

        let result = guarded(async { Ok(5) }).await;
        assert_eq!(result.unwrap(), 5);
    }

    #[test]
    fn test_guarded_sync_catches_panic() {
        let result: CapabilityResult<()> = guarded_sync(|| panic!("driver crashed"));
        assert!(matches!(result, Err(CapabilityError::Failed(_))));
    }
}
