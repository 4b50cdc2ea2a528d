//! Recorded sessions handed over by the sensor runtime.
//!
//! The on-disk format belongs to the runtime; by the time a recording reaches
//! this crate it is a set of in-memory tracks of immutable frames.

use std::sync::Arc;

use crate::error::SyncError;
use crate::source::types::{Frame, StreamId, StreamKind};

/// Every frame of one recorded stream, in timestamp order.
#[derive(Debug, Clone)]
pub struct RecordedTrack {
    pub instance_name: String,
    pub kind: StreamKind,
    pub max_depth: u16,
    frames: Vec<Arc<Frame>>,
}

impl RecordedTrack {
    /// Build a track. Frames are sorted by timestamp and renumbered from 0.
    ///
    /// Every sample would be out of range with a `max_depth` of 0, so that is rejected.
    pub fn new(
        instance_name: impl Into<String>,
        kind: StreamKind,
        max_depth: u16,
        mut frames: Vec<Frame>,
    ) -> Result<Self, SyncError> {
        let instance_name = instance_name.into();
        if frames.is_empty() {
            return Err(SyncError::EmptyTrack(instance_name));
        }
        if max_depth == 0 {
            return Err(SyncError::InvalidMaxDepth(instance_name));
        }

        frames.sort_by_key(|f| f.timestamp);
        let frames = frames
            .into_iter()
            .enumerate()
            .map(|(i, mut frame)| {
                frame.frame_index = i as u64;
                Arc::new(frame)
            })
            .collect();

        Ok(Self {
            instance_name,
            kind,
            max_depth,
            frames,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Arc<Frame>] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Arc<Frame>> {
        self.frames.get(index)
    }

    pub fn first_timestamp(&self) -> u64 {
        self.frames.first().map(|f| f.timestamp).unwrap_or(0)
    }

    pub fn last_timestamp(&self) -> u64 {
        self.frames.last().map(|f| f.timestamp).unwrap_or(0)
    }

    /// Stamp every frame with the session stream it was registered as.
    pub(crate) fn assign_source(&mut self, stream: StreamId) {
        for frame in &mut self.frames {
            Arc::make_mut(frame).source = stream;
        }
    }

    /// Index of the last frame at or before `timestamp`, or 0 if every frame is later.
    pub fn index_at_or_before(&self, timestamp: u64) -> usize {
        self.frames
            .partition_point(|f| f.timestamp <= timestamp)
            .saturating_sub(1)
    }
}

/// A full recorded session.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    tracks: Vec<RecordedTrack>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, track: RecordedTrack) -> Self {
        self.tracks.push(track);
        self
    }

    pub fn push(&mut self, track: RecordedTrack) {
        self.tracks.push(track);
    }

    pub fn tracks(&self) -> &[RecordedTrack] {
        &self.tracks
    }

    pub(crate) fn into_tracks(self) -> Vec<RecordedTrack> {
        self.tracks
    }
}

/// Source id placeholder for frames that are not yet bound to a session.
pub(crate) const UNBOUND_SOURCE: StreamId = StreamId(0);

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ts: u64) -> Frame {
        Frame::new(2, 1, vec![1, 2], ts, 99, UNBOUND_SOURCE).unwrap()
    }

    #[test]
    fn test_track_sorts_and_renumbers() {
        let track = RecordedTrack::new(
            "Depth1",
            StreamKind::Depth,
            1000,
            vec![frame(300), frame(100), frame(200)],
        )
        .unwrap();

        let stamps: Vec<u64> = track.frames().iter().map(|f| f.timestamp).collect();
        assert_eq!(stamps, vec![100, 200, 300]);
        let indices: Vec<u64> = track.frames().iter().map(|f| f.frame_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(track.first_timestamp(), 100);
        assert_eq!(track.last_timestamp(), 300);
    }

    #[test]
    fn test_zero_max_depth_is_rejected() {
        let err = RecordedTrack::new("Depth1", StreamKind::Depth, 0, vec![frame(1)]).unwrap_err();
        assert_eq!(err, SyncError::InvalidMaxDepth("Depth1".to_string()));
    }

    #[test]
    fn test_empty_track_is_rejected() {
        let err = RecordedTrack::new("Image1", StreamKind::Image, 255, Vec::new()).unwrap_err();
        assert_eq!(err, SyncError::EmptyTrack("Image1".to_string()));
    }

    #[test]
    fn test_index_at_or_before() {
        let track = RecordedTrack::new(
            "Depth1",
            StreamKind::Depth,
            1000,
            vec![frame(100), frame(200), frame(300)],
        )
        .unwrap();

        assert_eq!(track.index_at_or_before(50), 0);
        assert_eq!(track.index_at_or_before(100), 0);
        assert_eq!(track.index_at_or_before(250), 1);
        assert_eq!(track.index_at_or_before(10_000), 2);
    }
}
