//! Stateful capture sessions

mod recording;

pub use recording::{
    AudioSession, CaptureKind, CaptureSession, FinishedRecording, StartOutcome, StopOutcome,
    RECORDING_DATA_TYPE,
};
