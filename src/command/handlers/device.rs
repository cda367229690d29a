//! Screen, power, navigation and settings-panel actions

use super::{fire, CommandResult, HandlerContext};
use crate::capability::{NavAction, SettingsPanel};

pub async fn lock(ctx: &HandlerContext) -> CommandResult {
    fire("lock_screen", ctx.caps.device.lock_screen()).await
}

/// Brings up the power menu; the user confirms the shutdown
pub async fn power_menu(ctx: &HandlerContext) -> CommandResult {
    fire("open_power_menu", ctx.caps.device.open_power_menu()).await
}

pub async fn wake(ctx: &HandlerContext) -> CommandResult {
    fire("wake_screen", ctx.caps.device.wake_screen()).await
}

pub async fn navigate(ctx: &HandlerContext, action: NavAction) -> CommandResult {
    fire(&format!("navigate {:?}", action), ctx.caps.device.navigate(action)).await
}

pub async fn settings_panel(ctx: &HandlerContext, panel: SettingsPanel) -> CommandResult {
    fire(
        &format!("open {:?} panel", panel),
        ctx.caps.device.open_settings_panel(panel),
    )
    .await
}
