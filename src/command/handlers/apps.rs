//! Package actions: launch, install, uninstall, inventory and foreground app

use super::{fire, report_async, spawn_task, CommandResult, HandlerContext};
use agent_shared::{Command, Payload};
use serde_json::{Map, Value};

const INSTALLED_APPS: &str = "installed_apps";
const CURRENT_APP: &str = "current_app";

// Required parameters are checked by the router; the empty fallback is never hit from there.

pub async fn open_app(ctx: &HandlerContext, command: &Command) -> CommandResult {
    let package = command.param("package_name").unwrap_or_default();
    fire(&format!("open_app {}", package), ctx.caps.apps.open_app(package)).await
}

pub async fn install(ctx: &HandlerContext, command: &Command) -> CommandResult {
    let url = command.param("url").unwrap_or_default();
    fire(&format!("install {}", url), ctx.caps.apps.install_from(url)).await
}

pub async fn uninstall(ctx: &HandlerContext, command: &Command) -> CommandResult {
    let package = command.param("package_name").unwrap_or_default();
    fire(&format!("uninstall {}", package), ctx.caps.apps.uninstall(package)).await
}

/// Report `{package: label}` for user-installed apps
pub fn list_apps(ctx: &HandlerContext) -> CommandResult {
    let apps = ctx.caps.apps.clone();
    report_async(
        ctx,
        INSTALLED_APPS,
        async move { apps.installed_apps().await },
        |installed| {
            let map: Map<String, Value> = installed
                .into_iter()
                .map(|(package, label)| (package, Value::String(label)))
                .collect();
            Payload::Json(Value::Object(map))
        },
    )
}

/// Report the last package seen by the focus feed
pub fn current_app(ctx: &HandlerContext) -> CommandResult {
    let foreground = ctx.foreground.clone();
    let reporter = ctx.reporter.clone();
    spawn_task(async move {
        let package = foreground.last_package().await;
        reporter.submit(CURRENT_APP, Payload::Text(package)).await;
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::{command, harness, settle};
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_open_app_passes_package() {
        let h = harness();
        let result = open_app(&h.ctx, &command("open_app", &[("package_name", "com.example.notes")])).await;

        assert!(matches!(result, CommandResult::Completed { .. }));
        assert_eq!(h.device.calls(), vec!["open_app:com.example.notes"]);
        assert!(h.collector.events().is_empty());
    }

    #[tokio::test]
    async fn test_open_unknown_app_emits_nothing() {
        let h = harness();
        let result = open_app(&h.ctx, &command("open_app", &[("package_name", "com.example")])).await;

        assert!(matches!(result, CommandResult::Failed { .. }));
        assert_eq!(h.device.calls(), vec!["open_app:com.example"]);
        assert!(h.collector.events().is_empty());
    }

    #[tokio::test]
    async fn test_list_apps() {
        let h = harness();
        settle(list_apps(&h.ctx)).await;

        let events = h.collector.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data_type, "installed_apps");
        assert_eq!(
            events[0].payload,
            Payload::Json(json!({
                "com.example.notes": "Notes",
                "org.example.maps": "Maps",
            }))
        );
    }

    #[tokio::test]
    async fn test_list_apps_failure_reports_error() {
        let h = harness();
        h.device.fail("installed_apps");
        settle(list_apps(&h.ctx)).await;

        assert_eq!(h.collector.data_types(), vec!["installed_apps_error"]);
    }

    #[tokio::test]
    async fn test_current_app() {
        let h = harness();
        settle(current_app(&h.ctx)).await;
        h.ctx.foreground.update("org.example.maps").await;
        settle(current_app(&h.ctx)).await;

        let payloads: Vec<_> = h
            .collector
            .events()
            .into_iter()
            .map(|e| e.payload.as_text().map(str::to_string))
            .collect();
        assert_eq!(
            payloads,
            vec![Some("N/A".to_string()), Some("org.example.maps".to_string())]
        );
    }
}
