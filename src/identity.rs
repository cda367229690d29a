//! Stable device identity

use anyhow::{bail, Context, Result};
use std::path::Path;

pub const MACHINE_ID_PATH: &str = "/etc/machine-id";

/// Resolve the collector-facing device id: the configured override, else the
/// platform machine id.
pub fn resolve_device_id(configured: Option<&str>, machine_id_path: &Path) -> Result<String> {
    if let Some(id) = configured.map(str::trim).filter(|id| !id.is_empty()) {
        return Ok(id.to_string());
    }

    let raw = std::fs::read_to_string(machine_id_path).with_context(|| {
        format!(
            "No device_id configured and {} is unreadable",
            machine_id_path.display()
        )
    })?;

    let id = raw.trim();
    if id.is_empty() {
        bail!("{} is empty", machine_id_path.display());
    }
    Ok(id.to_string())
}
