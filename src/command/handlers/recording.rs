//! start_rec / stop_rec

use super::{spawn_task, CommandResult, HandlerContext};
use crate::session::{StartOutcome, StopOutcome, RECORDING_DATA_TYPE};
use tracing::{info, warn};

pub fn start(ctx: &HandlerContext) -> CommandResult {
    match ctx.recording.start() {
        StartOutcome::Started(path) => CommandResult::Completed {
            message: format!("recording to {}", path.display()),
        },
        StartOutcome::AlreadyActive => {
            info!("[REC] Already recording, start ignored");
            CommandResult::Ignored {
                message: "already recording".into(),
            }
        }
        StartOutcome::Failed(e) => {
            warn!("[REC] Could not start recording: {}", e);
            let reporter = ctx.reporter.clone();
            let message = format!("Recording start failed: {}", e);
            spawn_task(async move {
                reporter.submit_error(RECORDING_DATA_TYPE, message).await;
            })
        }
    }
}

pub fn stop(ctx: &HandlerContext) -> CommandResult {
    match ctx.recording.stop() {
        StopOutcome::NotActive => {
            info!("[REC] Not recording, stop ignored");
            CommandResult::Ignored {
                message: "not recording".into(),
            }
        }
        StopOutcome::Stopped(finished) => {
            let reporter = ctx.reporter.clone();
            spawn_task(async move { finished.upload(&reporter).await })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{harness, settle};
    use super::*;

    #[tokio::test]
    async fn test_start_twice_one_session() {
        let h = harness();

        assert!(matches!(start(&h.ctx), CommandResult::Completed { .. }));
        assert!(matches!(start(&h.ctx), CommandResult::Ignored { .. }));

        assert_eq!(h.device.call_count("recorder.start"), 1);
        assert!(h.ctx.recording.active().is_some());
        assert!(h.collector.events().is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_session() {
        let h = harness();
        assert!(matches!(stop(&h.ctx), CommandResult::Ignored { .. }));
        assert!(h.collector.events().is_empty());
    }

    #[tokio::test]
    async fn test_start_stop_uploads_once() {
        let h = harness();
        start(&h.ctx);
        settle(stop(&h.ctx)).await;

        assert_eq!(h.collector.data_types(), vec!["last_recording"]);
        assert!(!h.device.is_recording());

        // Second stop is a no-op
        assert!(matches!(stop(&h.ctx), CommandResult::Ignored { .. }));
        assert_eq!(h.collector.events().len(), 1);
    }

    #[tokio::test]
    async fn test_start_failure_reports_error() {
        let h = harness();
        h.device.fail("recorder.start");

        settle(start(&h.ctx)).await;

        assert_eq!(h.collector.data_types(), vec!["last_recording_error"]);
        assert!(h.ctx.recording.active().is_none());
    }
}
