//! Action catalogue
//!
//! The authoritative list of commands the agent understands. Built once at
//! startup; the router consults it before any handler runs.

use crate::capability::{NavAction, SettingsPanel};
use std::collections::HashMap;

/// Execution shape of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Invoke a capability, emit no telemetry
    FireAndForget,
    /// Invoke a capability off the router path, emit exactly one event
    SingleShotAsync,
    /// Start/stop pair with state between calls
    Session,
}

/// Handler selected by an action name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Lock,
    Shutdown,
    WakeDevice,
    Navigate(NavAction),
    SettingsPanel(SettingsPanel),
    OpenApp,
    Install,
    Uninstall,
    PlaySound,
    ShowImage,
    SetVolume,
    ListApps,
    CurrentApp,
    Location,
    Sensors,
    ScreenStatus,
    BatteryStatus,
    Screenshot,
    Picture,
    StartRecording,
    StopRecording,
}

/// Static metadata for one action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub action: Action,
    pub required_params: &'static [&'static str],
    pub shape: Shape,
}

const fn entry(
    name: &'static str,
    action: Action,
    required_params: &'static [&'static str],
    shape: Shape,
) -> ActionDescriptor {
    ActionDescriptor {
        name,
        action,
        required_params,
        shape,
    }
}

use Shape::{FireAndForget, Session, SingleShotAsync};

pub const CATALOGUE: &[ActionDescriptor] = &[
    entry("lock", Action::Lock, &[], FireAndForget),
    entry("shutdown", Action::Shutdown, &[], FireAndForget),
    entry("wake_device", Action::WakeDevice, &[], FireAndForget),
    entry("nav_back", Action::Navigate(NavAction::Back), &[], FireAndForget),
    entry("nav_home", Action::Navigate(NavAction::Home), &[], FireAndForget),
    entry("nav_recents", Action::Navigate(NavAction::Recents), &[], FireAndForget),
    entry("toggle_wifi", Action::SettingsPanel(SettingsPanel::Wifi), &[], FireAndForget),
    entry(
        "toggle_bluetooth",
        Action::SettingsPanel(SettingsPanel::Bluetooth),
        &[],
        FireAndForget,
    ),
    entry(
        "toggle_location",
        Action::SettingsPanel(SettingsPanel::Location),
        &[],
        FireAndForget,
    ),
    entry("open_app", Action::OpenApp, &["package_name"], FireAndForget),
    entry("install", Action::Install, &["url"], FireAndForget),
    entry("uninstall", Action::Uninstall, &["package_name"], FireAndForget),
    entry("play", Action::PlaySound, &["url"], FireAndForget),
    entry("show_image", Action::ShowImage, &["url"], FireAndForget),
    entry("set_volume", Action::SetVolume, &[], FireAndForget),
    entry("list_apps", Action::ListApps, &[], SingleShotAsync),
    entry("get_current_app", Action::CurrentApp, &[], SingleShotAsync),
    entry("get_location", Action::Location, &[], SingleShotAsync),
    entry("get_sensors", Action::Sensors, &[], SingleShotAsync),
    entry("get_screen_status", Action::ScreenStatus, &[], SingleShotAsync),
    entry("get_battery_status", Action::BatteryStatus, &[], SingleShotAsync),
    entry("screenshot", Action::Screenshot, &[], SingleShotAsync),
    entry("picture", Action::Picture, &[], SingleShotAsync),
    entry("start_rec", Action::StartRecording, &[], Session),
    entry("stop_rec", Action::StopRecording, &[], Session),
];

/// Alternate controller spellings and the canonical name they resolve to
pub const ALIASES: &[(&str, &str)] = &[
    ("take_screenshot", "screenshot"),
    ("take_picture", "picture"),
];

/// Name → descriptor lookup over [`CATALOGUE`]
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    entries: HashMap<&'static str, &'static ActionDescriptor>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        let mut entries: HashMap<&'static str, &'static ActionDescriptor> =
            CATALOGUE.iter().map(|d| (d.name, d)).collect();

        for &(alias, canonical) in ALIASES {
            if let Some(descriptor) = entries.get(canonical).copied() {
                entries.insert(alias, descriptor);
            }
        }

        Self { entries }
    }

    /// Case-insensitive lookup; aliases resolve to their canonical descriptor
    pub fn lookup(&self, name: &str) -> Option<&'static ActionDescriptor> {
        let name = name.trim().to_ascii_lowercase();
        self.entries.get(name.as_str()).copied()
    }

    /// Canonical descriptors, in catalogue order
    pub fn descriptors(&self) -> impl Iterator<Item = &'static ActionDescriptor> {
        CATALOGUE.iter()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let mut seen = HashSet::new();
        for d in CATALOGUE {
            assert!(seen.insert(d.name), "duplicate action {}", d.name);
        }
        for (alias, _) in ALIASES {
            assert!(!seen.contains(alias), "alias {} shadows an action", alias);
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = ActionRegistry::new();
        let d = registry.lookup("Get_Battery_Status").unwrap();
        assert_eq!(d.action, Action::BatteryStatus);
        assert_eq!(d.shape, Shape::SingleShotAsync);
        assert!(registry.lookup("self_destruct").is_none());
    }

    #[test]
    fn test_aliases_resolve_to_canonical() {
        let registry = ActionRegistry::new();
        assert_eq!(registry.lookup("take_screenshot").unwrap().name, "screenshot");
        assert_eq!(registry.lookup("TAKE_PICTURE").unwrap().name, "picture");
        assert_eq!(registry.descriptors().count(), CATALOGUE.len());
    }

    #[test]
    fn test_required_params() {
        let registry = ActionRegistry::new();
        assert_eq!(
            registry.lookup("open_app").unwrap().required_params,
            &["package_name"]
        );
        assert_eq!(registry.lookup("play").unwrap().required_params, &["url"]);
        assert!(registry.lookup("picture").unwrap().required_params.is_empty());
    }
}
