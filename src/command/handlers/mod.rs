//! Command handlers for each action family

mod apps;
mod device;
mod media;
mod recording;
mod status;

use super::registry::Action;
use crate::capability::{guarded, CapabilityResult, Capabilities};
use crate::foreground::ForegroundAppState;
use crate::session::AudioSession;
use crate::telemetry::{SensorEngine, TelemetryReporter};
use agent_shared::{Command, Payload};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Everything a handler may touch
#[derive(Clone)]
pub struct HandlerContext {
    pub device_id: String,
    pub caps: Capabilities,
    pub reporter: TelemetryReporter,
    pub sensors: SensorEngine,
    pub recording: Arc<AudioSession>,
    pub foreground: ForegroundAppState,
}

/// Outcome of a handler's synchronous portion
#[derive(Debug)]
pub enum CommandResult {
    /// Capability call completed
    Completed { message: String },
    /// Capability call failed; logged only
    Failed { message: String },
    /// Parameter values unusable; capability not called
    Rejected { message: String },
    /// Idempotent no-op
    Ignored { message: String },
    /// Work continues in the background and reports to the collector
    Pending(JoinHandle<()>),
}

/// Run the handler for `action`
pub async fn dispatch(ctx: &HandlerContext, action: Action, command: &Command) -> CommandResult {
    match action {
        Action::Lock => device::lock(ctx).await,
        Action::Shutdown => device::power_menu(ctx).await,
        Action::WakeDevice => device::wake(ctx).await,
        Action::Navigate(nav) => device::navigate(ctx, nav).await,
        Action::SettingsPanel(panel) => device::settings_panel(ctx, panel).await,
        Action::OpenApp => apps::open_app(ctx, command).await,
        Action::Install => apps::install(ctx, command).await,
        Action::Uninstall => apps::uninstall(ctx, command).await,
        Action::ListApps => apps::list_apps(ctx),
        Action::CurrentApp => apps::current_app(ctx),
        Action::PlaySound => media::play_sound(ctx, command).await,
        Action::ShowImage => media::show_image(ctx, command).await,
        Action::SetVolume => media::set_volume(ctx, command).await,
        Action::Screenshot => media::screenshot(ctx),
        Action::Picture => media::picture(ctx, command),
        Action::Location => status::location(ctx),
        Action::Sensors => status::sensors(ctx, command),
        Action::ScreenStatus => status::screen_status(ctx),
        Action::BatteryStatus => status::battery_status(ctx),
        Action::StartRecording => recording::start(ctx),
        Action::StopRecording => recording::stop(ctx),
    }
}

/// Await a fire-and-forget capability call; failures are logged, never reported
async fn fire<F>(what: &str, call: F) -> CommandResult
where
    F: Future<Output = CapabilityResult<()>>,
{
    match guarded(call).await {
        Ok(()) => {
            info!("[ROUTER] {} done", what);
            CommandResult::Completed {
                message: format!("{} done", what),
            }
        }
        Err(e) => {
            warn!("[ROUTER] {} failed: {}", what, e);
            CommandResult::Failed {
                message: e.to_string(),
            }
        }
    }
}

/// Run `call` in the background and report its result, or its failure, exactly once
fn report_async<T, F, R>(ctx: &HandlerContext, data_type: &'static str, call: F, render: R) -> CommandResult
where
    T: Send + 'static,
    F: Future<Output = CapabilityResult<T>> + Send + 'static,
    R: FnOnce(T) -> Payload + Send + 'static,
{
    let reporter = ctx.reporter.clone();
    CommandResult::Pending(tokio::spawn(async move {
        match guarded(call).await {
            Ok(value) => reporter.submit(data_type, render(value)).await,
            Err(e) => {
                warn!("[ROUTER] {} failed: {}", data_type, e);
                reporter.submit_error(data_type, e.to_string()).await;
            }
        }
    }))
}

/// Run a background task that does its own reporting
fn spawn_task<F>(task: F) -> CommandResult
where
    F: Future<Output = ()> + Send + 'static,
{
    CommandResult::Pending(tokio::spawn(task))
}
