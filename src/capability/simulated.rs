//! Simulated capability provider
//!
//! Stands in for the platform facilities when the agent runs off-device, and
//! backs the tests. Every call is recorded, and failures can be injected per
//! operation name.

use super::{
    AppManager, AudioRecorder, BatteryInfo, CapabilityError, CapabilityResult, CaptureProvider,
    DeviceControl, DeviceStatus, Location, LocationProvider, MediaOutput, NavAction, SensorHub,
    SensorKind, SensorReading, SettingsPanel, WindowFocusEvent,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info};

const LAUNCHER_PACKAGE: &str = "com.android.launcher";

#[derive(Debug, Clone, Copy, PartialEq)]
enum SimLocation {
    Fix(Location),
    NoFix,
    Denied,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory device used for development and tests
pub struct SimulatedDevice {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    battery: Mutex<BatteryInfo>,
    screen_on: Mutex<bool>,
    apps: Mutex<BTreeMap<String, String>>,
    location: Mutex<SimLocation>,
    /// Available sensors and the samples each subscription delivers
    sensors: Mutex<HashMap<SensorKind, Vec<Vec<f32>>>>,
    subscriptions: Mutex<HashMap<SensorKind, mpsc::Sender<SensorReading>>>,
    recording: Mutex<Option<PathBuf>>,
    volume: Mutex<Option<u8>>,
    focus_tx: Mutex<Option<mpsc::Sender<WindowFocusEvent>>>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        let mut apps = BTreeMap::new();
        apps.insert("com.example.notes".to_string(), "Notes".to_string());
        apps.insert("org.example.maps".to_string(), "Maps".to_string());

        let mut sensors = HashMap::new();
        sensors.insert(SensorKind::RotationVector, vec![vec![0.1, 0.2, 0.3, 0.9]]);
        sensors.insert(SensorKind::Accelerometer, vec![vec![0.0, 9.81, 0.0]]);
        sensors.insert(SensorKind::Light, vec![vec![320.0]]);

        Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
            battery: Mutex::new(BatteryInfo {
                percentage: 76.0,
                is_charging: false,
            }),
            screen_on: Mutex::new(true),
            apps: Mutex::new(apps),
            location: Mutex::new(SimLocation::Fix(Location {
                latitude: 47.4979,
                longitude: 19.0402,
            })),
            sensors: Mutex::new(sensors),
            subscriptions: Mutex::new(HashMap::new()),
            recording: Mutex::new(None),
            volume: Mutex::new(None),
            focus_tx: Mutex::new(None),
        }
    }

    /// Receiver for simulated window-focus changes
    pub fn focus_feed(&self) -> mpsc::Receiver<WindowFocusEvent> {
        let (tx, rx) = mpsc::channel(32);
        *lock(&self.focus_tx) = Some(tx);
        rx
    }

    /// Make `op` return an error from now on
    pub fn fail(&self, op: &str) {
        lock(&self.failing).insert(op.to_string());
    }

    /// Make `op` panic from now on
    pub fn panic_on(&self, op: &str) {
        lock(&self.panicking).insert(op.to_string());
    }

    pub fn set_battery(&self, percentage: f32, is_charging: bool) {
        *lock(&self.battery) = BatteryInfo {
            percentage,
            is_charging,
        };
    }

    pub fn set_screen_on(&self, on: bool) {
        *lock(&self.screen_on) = on;
    }

    pub fn set_location(&self, location: Option<Location>) {
        *lock(&self.location) = match location {
            Some(fix) => SimLocation::Fix(fix),
            None => SimLocation::NoFix,
        };
    }

    pub fn deny_location(&self) {
        *lock(&self.location) = SimLocation::Denied;
    }

    /// Make a sensor available, delivering `samples` on each subscription
    pub fn add_sensor(&self, kind: SensorKind, samples: Vec<Vec<f32>>) {
        lock(&self.sensors).insert(kind, samples);
    }

    pub fn remove_sensor(&self, kind: SensorKind) {
        lock(&self.sensors).remove(&kind);
    }

    /// Every recorded call, in order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Number of recorded calls whose name starts with `prefix`
    pub fn call_count(&self, prefix: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn active_subscriptions(&self) -> usize {
        lock(&self.subscriptions).len()
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.recording).is_some()
    }

    pub fn volume(&self) -> Option<u8> {
        *lock(&self.volume)
    }

    fn record(&self, op: &str, detail: Option<&str>) -> CapabilityResult<()> {
        let entry = match detail {
            Some(d) => format!("{}:{}", op, d),
            None => op.to_string(),
        };
        debug!("[SIM] {}", entry);
        lock(&self.calls).push(entry);

        if lock(&self.panicking).contains(op) {
            panic!("simulated panic in {}", op);
        }
        if lock(&self.failing).contains(op) {
            return Err(CapabilityError::Failed(format!("{} failed", op)));
        }
        Ok(())
    }

    fn focus(&self, package: &str) {
        if let Some(tx) = lock(&self.focus_tx).as_ref() {
            let _ = tx.try_send(WindowFocusEvent {
                package: package.to_string(),
            });
        }
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceControl for SimulatedDevice {
    async fn lock_screen(&self) -> CapabilityResult<()> {
        self.record("lock_screen", None)?;
        *lock(&self.screen_on) = false;
        Ok(())
    }

    async fn open_power_menu(&self) -> CapabilityResult<()> {
        self.record("open_power_menu", None)
    }

    async fn wake_screen(&self) -> CapabilityResult<()> {
        self.record("wake_screen", None)?;
        *lock(&self.screen_on) = true;
        Ok(())
    }

    async fn navigate(&self, action: NavAction) -> CapabilityResult<()> {
        self.record("navigate", Some(&format!("{:?}", action).to_lowercase()))?;
        if action == NavAction::Home {
            self.focus(LAUNCHER_PACKAGE);
        }
        Ok(())
    }

    async fn open_settings_panel(&self, panel: SettingsPanel) -> CapabilityResult<()> {
        self.record(
            "open_settings_panel",
            Some(&format!("{:?}", panel).to_lowercase()),
        )
    }
}

#[async_trait]
impl AppManager for SimulatedDevice {
    async fn installed_apps(&self) -> CapabilityResult<BTreeMap<String, String>> {
        self.record("installed_apps", None)?;
        Ok(lock(&self.apps).clone())
    }

    async fn open_app(&self, package: &str) -> CapabilityResult<()> {
        self.record("open_app", Some(package))?;
        if !lock(&self.apps).contains_key(package) {
            return Err(CapabilityError::Unavailable(format!(
                "no launch target for {}",
                package
            )));
        }
        self.focus(package);
        Ok(())
    }

    async fn install_from(&self, url: &str) -> CapabilityResult<()> {
        self.record("install_from", Some(url))
    }

    async fn uninstall(&self, package: &str) -> CapabilityResult<()> {
        self.record("uninstall", Some(package))
    }
}

#[async_trait]
impl DeviceStatus for SimulatedDevice {
    async fn battery(&self) -> CapabilityResult<BatteryInfo> {
        self.record("battery", None)?;
        Ok(*lock(&self.battery))
    }

    async fn screen_interactive(&self) -> CapabilityResult<bool> {
        self.record("screen_interactive", None)?;
        Ok(*lock(&self.screen_on))
    }
}

#[async_trait]
impl LocationProvider for SimulatedDevice {
    async fn last_known(&self) -> CapabilityResult<Option<Location>> {
        self.record("last_known", None)?;
        match *lock(&self.location) {
            SimLocation::Fix(fix) => Ok(Some(fix)),
            SimLocation::NoFix => Ok(None),
            SimLocation::Denied => Err(CapabilityError::PermissionDenied(
                "location access not granted".into(),
            )),
        }
    }
}

impl SensorHub for SimulatedDevice {
    fn is_available(&self, kind: SensorKind) -> bool {
        if lock(&self.panicking).contains("is_available") {
            panic!("simulated panic in is_available");
        }
        lock(&self.sensors).contains_key(&kind)
    }

    fn subscribe(&self, kind: SensorKind) -> CapabilityResult<mpsc::Receiver<SensorReading>> {
        self.record("subscribe", Some(kind.data_type()))?;

        let samples = lock(&self.sensors)
            .get(&kind)
            .cloned()
            .ok_or_else(|| CapabilityError::Unavailable(kind.data_type().into()))?;

        let (tx, rx) = mpsc::channel(samples.len().max(1));
        for values in samples {
            let _ = tx.try_send(SensorReading { values });
        }
        lock(&self.subscriptions).insert(kind, tx);
        Ok(rx)
    }

    fn unsubscribe(&self, kind: SensorKind) {
        let _ = self.record("unsubscribe", Some(kind.data_type()));
        lock(&self.subscriptions).remove(&kind);
    }
}

#[async_trait]
impl CaptureProvider for SimulatedDevice {
    async fn take_picture(&self, camera_id: i32) -> CapabilityResult<Vec<u8>> {
        self.record("take_picture", Some(&camera_id.to_string()))?;
        Ok(format!("jpeg:camera-{}", camera_id).into_bytes())
    }

    async fn take_screenshot(&self) -> CapabilityResult<Vec<u8>> {
        self.record("take_screenshot", None)?;
        Ok(b"png:screen".to_vec())
    }
}

impl AudioRecorder for SimulatedDevice {
    fn start(&self, path: &Path) -> CapabilityResult<()> {
        self.record("recorder.start", None)?;
        std::fs::write(path, b"simulated-aac-frames")?;
        *lock(&self.recording) = Some(path.to_path_buf());
        info!("[SIM] Recording to {}", path.display());
        Ok(())
    }

    fn stop(&self) -> CapabilityResult<()> {
        // Released even when the stop itself reports failure
        let released = lock(&self.recording).take();
        self.record("recorder.stop", None)?;
        if released.is_none() {
            return Err(CapabilityError::Failed("recorder not started".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaOutput for SimulatedDevice {
    async fn play_sound(&self, url: &str) -> CapabilityResult<()> {
        self.record("play_sound", Some(url))
    }

    async fn show_image(&self, url: &str) -> CapabilityResult<()> {
        self.record("show_image", Some(url))
    }

    async fn set_volume(&self, percent: u8) -> CapabilityResult<()> {
        self.record("set_volume", Some(&percent.to_string()))?;
        *lock(&self.volume) = Some(percent);
        Ok(())
    }
}
