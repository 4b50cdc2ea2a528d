//! Errors raised by the synchronization core.

use thiserror::Error;

use crate::source::types::StreamId;
use crate::sync::stream::StreamState;

/// Coarse classification of a [`SyncError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Misuse of the API; retrying the same call will fail again.
    Configuration,
    /// No data yet; recoverable by waiting again.
    DataUnavailable,
}

/// Errors returned by the coordinator and its building blocks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("{0} is not bound to this session")]
    Unbound(StreamId),

    #[error("{stream} is not generating (state: {state:?})")]
    NotGenerating { stream: StreamId, state: StreamState },

    #[error("{0} is already generating")]
    AlreadyGenerating(StreamId),

    #[error("{stream} cannot be aligned to the viewpoint of {target}")]
    UnsupportedViewpoint { stream: StreamId, target: StreamId },

    #[error("{0} and {1} cannot be frame-synced")]
    UnsupportedFrameSync(StreamId, StreamId),

    #[error("cropping window for {stream} is empty: {width}x{height}")]
    InvalidCropping {
        stream: StreamId,
        width: u32,
        height: u32,
    },

    #[error("playback control requires a recorded session")]
    NotRecorded,

    #[error("streams can only be registered or fed in a live session")]
    NotLive,

    #[error("playback speed must be a positive finite multiplier, got {0}")]
    InvalidSpeed(f64),

    #[error("recorded track '{0}' contains no frames")]
    EmptyTrack(String),

    #[error("recorded track '{0}' has a maximum sample value of 0")]
    InvalidMaxDepth(String),

    #[error("frame buffer holds {actual} samples, expected {expected}")]
    MalformedFrame { expected: usize, actual: usize },

    #[error("no {what} available yet for {stream}")]
    DataUnavailable {
        stream: StreamId,
        what: &'static str,
    },
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::DataUnavailable { .. } => ErrorCategory::DataUnavailable,
            _ => ErrorCategory::Configuration,
        }
    }
}
