//! Producer/consumer publication of session state.
//!
//! The coordinator's owner publishes a summary after each tick; readers in
//! other threads poll at their own cadence. There is no handshake: a reader
//! may see the same state twice or skip states entirely.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::source::types::StreamId;
use crate::sync::events::CrossEvent;

/// Frame metadata published for one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedFrame {
    pub stream: StreamId,
    pub frame_index: u64,
    pub timestamp: u64,
    pub width: u32,
    pub height: u32,
}

/// Everything a reader can observe about one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedState {
    pub tick: u64,
    pub frames: Vec<PublishedFrame>,
    pub cross_event: Option<CrossEvent>,
}

#[derive(Debug, Default)]
struct Inner {
    sequence: AtomicU64,
    state: RwLock<Option<Arc<PublishedState>>>,
}

/// Shared slot holding the most recently published state.
#[derive(Debug, Clone, Default)]
pub struct SharedRegion {
    inner: Arc<Inner>,
}

impl SharedRegion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published state. Never blocks on readers for longer than a copy.
    pub fn publish(&self, state: PublishedState) {
        *self.inner.state.write() = Some(Arc::new(state));
        self.inner.sequence.fetch_add(1, Ordering::Release);
    }

    /// Number of states published so far.
    pub fn sequence(&self) -> u64 {
        self.inner.sequence.load(Ordering::Acquire)
    }

    /// A polling handle for a consumer.
    pub fn reader(&self) -> RegionReader {
        RegionReader {
            region: self.clone(),
            last_seen: 0,
        }
    }
}

/// Result of one poll.
#[derive(Debug, Clone)]
pub struct Polled {
    pub state: Arc<PublishedState>,
    /// False when nothing was published since the previous poll
    pub fresh: bool,
}

/// Consumer-side handle remembering what it last saw.
#[derive(Debug, Clone)]
pub struct RegionReader {
    region: SharedRegion,
    last_seen: u64,
}

impl RegionReader {
    /// Read the current state without waiting. `None` until the first publish.
    pub fn poll(&mut self) -> Option<Polled> {
        let sequence = self.region.sequence();
        let state = self.region.inner.state.read().clone()?;

        let fresh = sequence != self.last_seen;
        self.last_seen = sequence;
        Some(Polled { state, fresh })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn state(tick: u64) -> PublishedState {
        PublishedState {
            tick,
            frames: vec![PublishedFrame {
                stream: StreamId(1),
                frame_index: tick,
                timestamp: tick * 33_333,
                width: 4,
                height: 3,
            }],
            cross_event: None,
        }
    }

    #[test]
    fn test_reader_sees_nothing_before_publish() {
        let region = SharedRegion::new();
        assert!(region.reader().poll().is_none());
    }

    #[test]
    fn test_reader_tolerates_unchanged_state() {
        let region = SharedRegion::new();
        let mut reader = region.reader();

        region.publish(state(1));
        let first = reader.poll().unwrap();
        assert!(first.fresh);
        assert_eq!(first.state.tick, 1);

        let again = reader.poll().unwrap();
        assert!(!again.fresh);
        assert_eq!(again.state.tick, 1);
    }

    #[test]
    fn test_reader_may_skip_states() {
        let region = SharedRegion::new();
        let mut reader = region.reader();
        region.publish(state(1));
        region.publish(state(2));
        region.publish(state(3));

        let polled = reader.poll().unwrap();
        assert_eq!(polled.state.tick, 3);
        assert_eq!(region.sequence(), 3);
    }

    #[test]
    fn test_publish_from_another_thread() {
        let region = SharedRegion::new();
        let producer = region.clone();
        thread::spawn(move || producer.publish(state(7)))
            .join()
            .unwrap();

        assert_eq!(region.reader().poll().unwrap().state.tick, 7);
    }

    #[test]
    fn test_publish_after_writer_panicked() {
        let region = SharedRegion::new();
        let writer = region.clone();
        let result = thread::spawn(move || {
            let _guard = writer.inner.state.write();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(result.is_err());

        region.publish(state(4));
        assert_eq!(region.reader().poll().unwrap().state.tick, 4);
    }
}
