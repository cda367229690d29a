//! Audio recording session
//!
//! `start_rec` and `stop_rec` may arrive in any order and any number of
//! times. A start while recording and a stop while idle are no-ops. Stop
//! always releases the recorder before the file is read.

use crate::capability::{guarded_sync, AudioRecorder, CapabilityError};
use crate::telemetry::TelemetryReporter;
use agent_shared::{now_ms, Payload};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// Telemetry data type for finished recordings
pub const RECORDING_DATA_TYPE: &str = "last_recording";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSession {
    pub kind: CaptureKind,
    pub file_path: PathBuf,
    pub active: bool,
}

#[derive(Debug)]
pub enum StartOutcome {
    Started(PathBuf),
    AlreadyActive,
    Failed(CapabilityError),
}

#[derive(Debug)]
pub enum StopOutcome {
    NotActive,
    Stopped(FinishedRecording),
}

/// A recording whose recorder has been released
#[derive(Debug)]
pub struct FinishedRecording {
    pub file_path: PathBuf,
    /// Outcome of stopping the recorder
    pub release: Result<(), CapabilityError>,
}

impl FinishedRecording {
    /// Read, encode and upload the file, then delete it
    pub async fn upload(self, reporter: &TelemetryReporter) {
        match self.release {
            Err(e) => {
                warn!("[REC] Recorder stop failed: {}", e);
                reporter
                    .submit_error(RECORDING_DATA_TYPE, format!("Recording stop failed: {}", e))
                    .await;
            }
            Ok(()) => match tokio::fs::read(&self.file_path).await {
                Ok(bytes) => {
                    info!("[REC] Uploading {} bytes", bytes.len());
                    reporter
                        .submit(RECORDING_DATA_TYPE, Payload::Blob(STANDARD.encode(&bytes)))
                        .await;
                }
                Err(e) => {
                    warn!("[REC] Could not read {}: {}", self.file_path.display(), e);
                    reporter
                        .submit_error(RECORDING_DATA_TYPE, format!("Could not read recording: {}", e))
                        .await;
                }
            },
        }

        remove_file(&self.file_path).await;
    }
}

async fn remove_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("[REC] Could not delete {}: {}", path.display(), e),
    }
}

/// Singleton audio capture session
pub struct AudioSession {
    recorder: Arc<dyn AudioRecorder>,
    dir: PathBuf,
    /// Keeps file names unique within one millisecond
    seq: AtomicU64,
    current: Mutex<Option<CaptureSession>>,
}

impl AudioSession {
    pub fn new(recorder: Arc<dyn AudioRecorder>, dir: impl Into<PathBuf>) -> Self {
        Self {
            recorder,
            dir: dir.into(),
            seq: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<CaptureSession>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn active(&self) -> Option<CaptureSession> {
        self.current().clone()
    }

    pub fn start(&self) -> StartOutcome {
        let mut current = self.current();
        if current.is_some() {
            return StartOutcome::AlreadyActive;
        }

        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            return StartOutcome::Failed(e.into());
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("recording-{}-{}.m4a", now_ms(), seq));

        match guarded_sync(|| self.recorder.start(&path)) {
            Ok(()) => {
                info!("[REC] Recording started: {}", path.display());
                *current = Some(CaptureSession {
                    kind: CaptureKind::Audio,
                    file_path: path.clone(),
                    active: true,
                });
                StartOutcome::Started(path)
            }
            Err(e) => {
                // Leave no half-written file behind
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => warn!("[REC] Could not delete {}: {}", path.display(), err),
                }
                StartOutcome::Failed(e)
            }
        }
    }

    pub fn stop(&self) -> StopOutcome {
        let mut current = self.current();
        let Some(session) = current.take() else {
            return StopOutcome::NotActive;
        };

        let release = guarded_sync(|| self.recorder.stop());
        drop(current);
        info!("[REC] Recording stopped: {}", session.file_path.display());

        StopOutcome::Stopped(FinishedRecording {
            file_path: session.file_path,
            release,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::SimulatedDevice;
    use crate::telemetry::MemoryCollector;

    fn session() -> (Arc<SimulatedDevice>, AudioSession, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let device = Arc::new(SimulatedDevice::new());
        let session = AudioSession::new(device.clone(), dir.path().join("rec"));
        (device, session, dir)
    }

    #[test]
    fn test_double_start_keeps_one_session() {
        let (device, session, _dir) = session();

        assert!(matches!(session.start(), StartOutcome::Started(_)));
        assert!(matches!(session.start(), StartOutcome::AlreadyActive));

        assert!(session.active().is_some());
        assert_eq!(device.call_count("recorder.start"), 1);
    }

    #[test]
    fn test_stop_without_start() {
        let (device, session, _dir) = session();
        assert!(matches!(session.stop(), StopOutcome::NotActive));
        assert_eq!(device.call_count("recorder.stop"), 0);
    }

    #[tokio::test]
    async fn test_stop_uploads_and_deletes() {
        let (device, session, _dir) = session();
        let collector = MemoryCollector::new();
        let reporter = TelemetryReporter::new("dev-1", collector.clone());

        let StartOutcome::Started(path) = session.start() else {
            panic!("expected start");
        };
        let StopOutcome::Stopped(finished) = session.stop() else {
            panic!("expected stop");
        };
        assert!(!device.is_recording());

        finished.upload(&reporter).await;

        let events = collector.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data_type, "last_recording");
        assert_eq!(
            events[0].payload,
            Payload::Blob(STANDARD.encode(b"simulated-aac-frames"))
        );
        assert!(!path.exists());
        assert!(session.active().is_none());
    }

    #[tokio::test]
    async fn test_missing_file_reports_error() {
        let (_device, session, _dir) = session();
        let collector = MemoryCollector::new();
        let reporter = TelemetryReporter::new("dev-1", collector.clone());

        let StartOutcome::Started(path) = session.start() else {
            panic!("expected start");
        };
        std::fs::remove_file(&path).unwrap();

        let StopOutcome::Stopped(finished) = session.stop() else {
            panic!("expected stop");
        };
        finished.upload(&reporter).await;

        assert_eq!(collector.data_types(), vec!["last_recording_error"]);
    }

    #[tokio::test]
    async fn test_failed_stop_still_releases() {
        let (device, session, _dir) = session();
        let collector = MemoryCollector::new();
        let reporter = TelemetryReporter::new("dev-1", collector.clone());

        let StartOutcome::Started(path) = session.start() else {
            panic!("expected start");
        };
        device.fail("recorder.stop");

        let StopOutcome::Stopped(finished) = session.stop() else {
            panic!("expected stop");
        };
        assert!(!device.is_recording());
        finished.upload(&reporter).await;

        assert_eq!(collector.data_types(), vec!["last_recording_error"]);
        assert!(!path.exists());

        // A new session can start afterwards
        assert!(matches!(session.start(), StartOutcome::Started(_)));
    }

    #[tokio::test]
    async fn test_quick_restart_keeps_recordings_apart() {
        let (_device, session, _dir) = session();
        let collector = MemoryCollector::new();
        let reporter = TelemetryReporter::new("dev-1", collector.clone());

        let StartOutcome::Started(first_path) = session.start() else {
            panic!("expected start");
        };
        let StopOutcome::Stopped(first) = session.stop() else {
            panic!("expected stop");
        };
        let StartOutcome::Started(second_path) = session.start() else {
            panic!("expected restart");
        };
        assert_ne!(first_path, second_path);

        first.upload(&reporter).await;
        assert!(second_path.exists());

        let StopOutcome::Stopped(second) = session.stop() else {
            panic!("expected stop");
        };
        second.upload(&reporter).await;

        assert_eq!(
            collector.data_types(),
            vec!["last_recording", "last_recording"]
        );
        assert!(!first_path.exists());
        assert!(!second_path.exists());
    }

    #[test]
    fn test_failed_start_leaves_no_session() {
        let (device, session, dir) = session();
        device.fail("recorder.start");

        assert!(matches!(session.start(), StartOutcome::Failed(_)));
        assert!(session.active().is_none());
        let leftover = std::fs::read_dir(dir.path().join("rec")).unwrap().count();
        assert_eq!(leftover, 0);
    }
}
