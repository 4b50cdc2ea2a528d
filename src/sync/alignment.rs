//! Viewpoint alignment and frame-sync capabilities between stream pairs.

use std::collections::BTreeSet;

use crate::error::SyncError;
use crate::source::types::{StreamId, StreamKind};
use crate::sync::stream::Stream;

/// Whether `source` can be reprojected into the viewpoint of `target`.
///
/// Only a depth stream can be aligned, only onto an image stream of the
/// same physical device.
pub fn viewpoint_supported(source: &Stream, target: &Stream) -> bool {
    source.id != target.id
        && source.kind == StreamKind::Depth
        && target.kind == StreamKind::Image
        && source.device == target.device
}

pub(crate) fn check_viewpoint(source: &Stream, target: &Stream) -> Result<(), SyncError> {
    if viewpoint_supported(source, target) {
        Ok(())
    } else {
        Err(SyncError::UnsupportedViewpoint {
            stream: source.id,
            target: target.id,
        })
    }
}

/// Whether two streams can be frame-synced: same device, different kinds.
pub fn frame_sync_supported(first: &Stream, second: &Stream) -> bool {
    first.id != second.id && first.kind != second.kind && first.device == second.device
}

/// Unordered pairs of streams that advance together.
#[derive(Debug, Default, Clone)]
pub struct FrameSyncPairs {
    pairs: BTreeSet<(StreamId, StreamId)>,
}

fn ordered(a: StreamId, b: StreamId) -> (StreamId, StreamId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl FrameSyncPairs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, a: StreamId, b: StreamId) -> bool {
        self.pairs.contains(&ordered(a, b))
    }

    /// Set the pair's state. Returns true if it changed.
    pub fn set(&mut self, a: StreamId, b: StreamId, synced: bool) -> bool {
        let key = ordered(a, b);
        if synced {
            self.pairs.insert(key)
        } else {
            self.pairs.remove(&key)
        }
    }

    /// Streams frame-synced with `id`.
    pub fn partners(&self, id: StreamId) -> Vec<StreamId> {
        self.pairs
            .iter()
            .filter_map(|&(a, b)| {
                if a == id {
                    Some(b)
                } else if b == id {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }
}
