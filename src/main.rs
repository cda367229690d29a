mod capability;
mod command;
mod config;
mod connection;
mod foreground;
mod identity;
mod registration;
mod session;
mod telemetry;

use anyhow::{Context, Result};
use capability::{Capabilities, SimulatedDevice};
use command::{CommandRouter, HandlerContext};
use config::{AgentConfig, CONFIG_ENV};
use connection::{ConnectionEvent, ConnectionManager};
use foreground::ForegroundAppState;
use registration::HttpRegistrar;
use session::AudioSession;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use telemetry::{HttpCollector, SensorEngine, TelemetryReporter};

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    let config = AgentConfig::load(config_path.as_deref())?;

    let device_id = identity::resolve_device_id(
        config.device_id.as_deref(),
        Path::new(identity::MACHINE_ID_PATH),
    )?;

    info!("Device agent starting: {}", device_id);
    info!("  Controller relay: {}", config.push.controller_addr);
    info!("  Collector: {}", config.collector.submit_url);

    // Capability providers
    let device = Arc::new(SimulatedDevice::new());
    let foreground = ForegroundAppState::new();
    let _focus_handle = foreground.track(device.focus_feed());
    let caps = Capabilities::from_provider(device);

    // Collector transport
    let http = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let collector = Arc::new(HttpCollector::new(http.clone(), &config.collector));
    let reporter = TelemetryReporter::new(device_id.clone(), collector);

    let sensors = SensorEngine::new(caps.sensors.clone(), caps.location.clone(), reporter.clone());
    let recording = Arc::new(AudioSession::new(
        caps.recorder.clone(),
        config.recordings_dir.clone(),
    ));

    // Registration runs on its own; tokens arrive over the push channel
    let registrar = Arc::new(HttpRegistrar::new(
        http,
        config.collector.register_url.clone(),
        config.collector.small_timeout(),
    ));
    let (registration_handle, _registration_task) =
        registration::spawn(device_id.clone(), &config.registration, registrar);

    let router = CommandRouter::new(HandlerContext {
        device_id,
        caps,
        reporter,
        sensors,
        recording,
        foreground,
    });

    let mut conn = ConnectionManager::new(config.push.connection_config());

    // Main event loop
    loop {
        match conn.recv().await {
            Some(ConnectionEvent::Connected { addr }) => {
                info!("[PUSH] Push channel up: {}", addr);
            }
            Some(ConnectionEvent::Disconnected { reason }) => {
                warn!("[PUSH] Push channel down: {}", reason);
            }
            Some(ConnectionEvent::ConnectionFailed { reason }) => {
                warn!("[PUSH] Connection failed: {}", reason);
            }
            Some(ConnectionEvent::TokenRefreshed(token)) => {
                info!(
                    "[PUSH] Channel token received (registration {:?})",
                    registration_handle.state().phase
                );
                registration_handle.refresh_token(token);
            }
            Some(ConnectionEvent::Command(data)) => {
                router.handle_message(&data).await;
            }
            None => {
                error!("Connection manager closed");
                break;
            }
        }
    }

    Ok(())
}
