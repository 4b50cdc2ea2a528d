//! Per-stream lifecycle.
//!
//! ```text
//! Unbound ──register──▶ Bound ──start──▶ Generating ──stop / end of data──▶ Stopped
//!                                            ▲                                 │
//!                                            └─────────────start───────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::source::types::{Cropping, StreamId, StreamKind};

/// Lifecycle state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Unbound,
    Bound,
    Generating,
    Stopped,
}

/// One channel of sensor output owned by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub id: StreamId,
    pub kind: StreamKind,
    /// Instance identity reported by the sensor runtime, e.g. "Depth2"
    pub instance_name: String,
    /// Physical device this stream belongs to
    pub device: usize,
    /// Largest valid sample value
    pub max_depth: u16,
    state: StreamState,
    /// Stream whose viewpoint this stream's frames are reprojected into
    align_target: Option<StreamId>,
    mirrored: bool,
    cropping: Option<Cropping>,
    /// Set when a recorded stream stopped because its data ran out
    reached_end: bool,
}

impl Stream {
    pub fn new(
        id: StreamId,
        kind: StreamKind,
        instance_name: impl Into<String>,
        device: usize,
        max_depth: u16,
    ) -> Self {
        Self {
            id,
            kind,
            instance_name: instance_name.into(),
            device,
            max_depth,
            state: StreamState::Unbound,
            align_target: None,
            mirrored: false,
            cropping: None,
            reached_end: false,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_generating(&self) -> bool {
        self.state == StreamState::Generating
    }

    pub fn align_target(&self) -> Option<StreamId> {
        self.align_target
    }

    pub(crate) fn set_align_target(&mut self, target: Option<StreamId>) {
        self.align_target = target;
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    pub(crate) fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    /// Output window, `None` when the full frame is delivered.
    pub fn cropping(&self) -> Option<Cropping> {
        self.cropping
    }

    pub(crate) fn set_cropping(&mut self, cropping: Option<Cropping>) {
        self.cropping = cropping;
    }

    pub fn reached_end(&self) -> bool {
        self.reached_end
    }

    /// Unbound → Bound.
    pub(crate) fn bind(&mut self) {
        if self.state == StreamState::Unbound {
            self.state = StreamState::Bound;
        }
    }

    /// Bound or Stopped → Generating.
    pub(crate) fn start(&mut self) -> Result<(), SyncError> {
        match self.state {
            StreamState::Bound | StreamState::Stopped => {
                self.state = StreamState::Generating;
                self.reached_end = false;
                Ok(())
            }
            StreamState::Generating => Err(SyncError::AlreadyGenerating(self.id)),
            StreamState::Unbound => Err(SyncError::Unbound(self.id)),
        }
    }

    /// Generating → Stopped. Returns false if the stream was not generating.
    pub(crate) fn stop(&mut self) -> Result<bool, SyncError> {
        match self.state {
            StreamState::Generating => {
                self.state = StreamState::Stopped;
                Ok(true)
            }
            StreamState::Unbound => Err(SyncError::Unbound(self.id)),
            _ => Ok(false),
        }
    }

    /// Generating → Stopped because a recording ran out of frames.
    pub(crate) fn end_of_data(&mut self) {
        if self.state == StreamState::Generating {
            self.state = StreamState::Stopped;
            self.reached_end = true;
        }
    }

    /// Error unless the stream is generating.
    pub(crate) fn ensure_generating(&self) -> Result<(), SyncError> {
        if self.is_generating() {
            Ok(())
        } else {
            Err(SyncError::NotGenerating {
                stream: self.id,
                state: self.state,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_stream() -> Stream {
        Stream::new(StreamId(1), StreamKind::Depth, "Depth1", 0, 10_000)
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut stream = depth_stream();
        assert_eq!(stream.state(), StreamState::Unbound);
        assert_eq!(stream.start(), Err(SyncError::Unbound(StreamId(1))));

        stream.bind();
        assert_eq!(stream.state(), StreamState::Bound);

        stream.start().unwrap();
        assert!(stream.is_generating());
        assert_eq!(
            stream.start(),
            Err(SyncError::AlreadyGenerating(StreamId(1)))
        );

        assert_eq!(stream.stop(), Ok(true));
        assert_eq!(stream.state(), StreamState::Stopped);
        assert_eq!(stream.stop(), Ok(false));

        stream.start().unwrap();
        assert!(stream.is_generating());
    }

    #[test]
    fn test_end_of_data_marks_stream() {
        let mut stream = depth_stream();
        stream.bind();
        stream.start().unwrap();
        stream.end_of_data();
        assert_eq!(stream.state(), StreamState::Stopped);
        assert!(stream.reached_end());

        stream.start().unwrap();
        assert!(!stream.reached_end());
    }

    #[test]
    fn test_ensure_generating_reports_state() {
        let mut stream = depth_stream();
        stream.bind();
        assert_eq!(
            stream.ensure_generating(),
            Err(SyncError::NotGenerating {
                stream: StreamId(1),
                state: StreamState::Bound
            })
        );
    }
}
