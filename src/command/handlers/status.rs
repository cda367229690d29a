//! Device status, location and sensor reads

use super::{report_async, spawn_task, CommandResult, HandlerContext};
use crate::capability::SensorKind;
use agent_shared::{Command, Payload};
use serde_json::json;
use tracing::warn;

const BATTERY_STATUS: &str = "battery_status";
const SCREEN_STATUS: &str = "screen_status";

/// Sensor read when the command names none
const DEFAULT_SENSOR: SensorKind = SensorKind::RotationVector;

pub fn battery_status(ctx: &HandlerContext) -> CommandResult {
    let status = ctx.caps.status.clone();
    report_async(
        ctx,
        BATTERY_STATUS,
        async move { status.battery().await },
        |battery| {
            Payload::Json(json!({
                "percentage": battery.percentage,
                "isCharging": battery.is_charging,
            }))
        },
    )
}

pub fn screen_status(ctx: &HandlerContext) -> CommandResult {
    let status = ctx.caps.status.clone();
    report_async(
        ctx,
        SCREEN_STATUS,
        async move { status.screen_interactive().await },
        |on| Payload::text(if on { "On" } else { "Off" }),
    )
}

pub fn location(ctx: &HandlerContext) -> CommandResult {
    let sensors = ctx.sensors.clone();
    spawn_task(async move { sensors.locate().await })
}

/// Read each sensor in the comma-separated `sensors` parameter once
pub fn sensors(ctx: &HandlerContext, command: &Command) -> CommandResult {
    let kinds = requested_sensors(command);
    let sensors = ctx.sensors.clone();
    spawn_task(async move { sensors.read_all(&kinds).await })
}

fn requested_sensors(command: &Command) -> Vec<SensorKind> {
    let Some(list) = command.param("sensors") else {
        return vec![DEFAULT_SENSOR];
    };

    let kinds: Vec<SensorKind> = list
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter_map(|name| {
            let kind = SensorKind::from_name(name);
            if kind.is_none() {
                warn!("[SENSOR] Ignoring unknown sensor '{}'", name);
            }
            kind
        })
        .collect();

    if kinds.is_empty() {
        vec![DEFAULT_SENSOR]
    } else {
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{command, harness, settle};
    use super::*;

    #[tokio::test]
    async fn test_battery_status() {
        let h = harness();
        h.device.set_battery(42.0, true);

        settle(battery_status(&h.ctx)).await;

        let events = h.collector.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data_type, "battery_status");
        assert_eq!(
            events[0].payload,
            Payload::Json(json!({ "percentage": 42.0, "isCharging": true }))
        );
    }

    #[tokio::test]
    async fn test_screen_status() {
        let h = harness();
        settle(screen_status(&h.ctx)).await;
        h.device.set_screen_on(false);
        settle(screen_status(&h.ctx)).await;

        let events = h.collector.events();
        assert_eq!(events[0].payload.as_text(), Some("On"));
        assert_eq!(events[1].payload.as_text(), Some("Off"));
    }

    #[tokio::test]
    async fn test_status_panic_reports_error() {
        let h = harness();
        h.device.panic_on("battery");

        settle(battery_status(&h.ctx)).await;

        assert_eq!(h.collector.data_types(), vec!["battery_status_error"]);
    }

    #[tokio::test]
    async fn test_location() {
        let h = harness();
        h.device.deny_location();

        settle(location(&h.ctx)).await;

        let events = h.collector.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.as_text(), Some("Permission Denied"));
    }

    #[tokio::test]
    async fn test_sensors_default_to_rotation_vector() {
        let h = harness();
        settle(sensors(&h.ctx, &command("get_sensors", &[]))).await;

        assert_eq!(h.collector.data_types(), vec!["rotation_vector"]);
    }

    #[test]
    fn test_requested_sensors() {
        let cmd = command("get_sensors", &[("sensors", "light, Accelerometer,thermometer,")]);
        assert_eq!(
            requested_sensors(&cmd),
            vec![SensorKind::Light, SensorKind::Accelerometer]
        );

        let cmd = command("get_sensors", &[("sensors", "thermometer")]);
        assert_eq!(requested_sensors(&cmd), vec![DEFAULT_SENSOR]);
    }

    #[tokio::test]
    async fn test_sensors_one_event_each() {
        let h = harness();
        h.device.remove_sensor(SensorKind::Light);

        settle(sensors(
            &h.ctx,
            &command("get_sensors", &[("sensors", "light,accelerometer")]),
        ))
        .await;

        let mut types = h.collector.data_types();
        types.sort();
        assert_eq!(types, vec!["accelerometer", "light"]);
        assert_eq!(h.device.call_count("subscribe:light"), 0);
    }
}
