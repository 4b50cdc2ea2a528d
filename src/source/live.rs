//! Live frame delivery from producer threads.
//!
//! Each live stream gets a bounded channel. Producers push through a
//! [`FrameSink`] and never block: when the consumer falls behind, new frames
//! are dropped and counted. The coordinator keeps a sender of its own for each
//! stream so a channel never disconnects while the stream is registered.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::source::types::{Frame, JointSample, StreamId};

/// Producer handle for one live stream.
#[derive(Clone)]
pub struct FrameSink {
    stream: StreamId,
    sender: Sender<Frame>,
    dropped: Arc<AtomicU64>,
}

impl FrameSink {
    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// Offer a frame to the consumer. Returns false if it was dropped.
    ///
    /// The frame's source is overwritten with this sink's stream.
    pub fn push(&self, mut frame: Frame) -> bool {
        frame.source = self.stream;
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Frames dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Producer handle for joint samples from the tracking collaborator.
#[derive(Clone)]
pub struct JointSink {
    sender: Sender<Vec<JointSample>>,
}

impl JointSink {
    /// Offer one batch of samples. Returns false if the queue was full.
    pub fn push(&self, samples: Vec<JointSample>) -> bool {
        self.sender.try_send(samples).is_ok()
    }
}

pub(crate) fn joint_channel(capacity: usize) -> (JointSink, Receiver<Vec<JointSample>>) {
    let (sender, receiver) = bounded(capacity.max(1));
    (JointSink { sender }, receiver)
}

struct Feed {
    sender: Sender<Frame>,
    receiver: Receiver<Frame>,
    dropped: Arc<AtomicU64>,
}

/// Consumer side of every live stream in a session.
#[derive(Default)]
pub(crate) struct LiveFeeds {
    feeds: HashMap<StreamId, Feed>,
}

impl LiveFeeds {
    pub fn register(&mut self, stream: StreamId, capacity: usize) {
        let (sender, receiver) = bounded(capacity.max(1));
        self.feeds.insert(
            stream,
            Feed {
                sender,
                receiver,
                dropped: Arc::new(AtomicU64::new(0)),
            },
        );
    }

    pub fn sink(&self, stream: StreamId) -> Option<FrameSink> {
        self.feeds.get(&stream).map(|feed| FrameSink {
            stream,
            sender: feed.sender.clone(),
            dropped: feed.dropped.clone(),
        })
    }

    /// Block until the stream's next frame arrives or `deadline` passes.
    pub fn recv_deadline(&self, stream: StreamId, deadline: Instant) -> Option<Frame> {
        let feed = self.feeds.get(&stream)?;
        let timeout = deadline.saturating_duration_since(Instant::now());
        match feed.receiver.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Newest queued frame, discarding older ones. Never blocks.
    pub fn try_latest(&self, stream: StreamId) -> Option<Frame> {
        let feed = self.feeds.get(&stream)?;
        feed.receiver.try_iter().last()
    }

    /// Discard queued frames. Returns how many were discarded.
    pub fn drain(&self, stream: StreamId) -> usize {
        self.feeds
            .get(&stream)
            .map(|feed| feed.receiver.try_iter().count())
            .unwrap_or(0)
    }

    pub fn dropped(&self, stream: StreamId) -> u64 {
        self.feeds
            .get(&stream)
            .map(|feed| feed.dropped.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frame(ts: u64) -> Frame {
        Frame::new(1, 1, vec![7], ts, ts, StreamId(0)).unwrap()
    }

    #[test]
    fn test_push_sets_source_and_drops_when_full() {
        let mut feeds = LiveFeeds::default();
        feeds.register(StreamId(3), 2);
        let sink = feeds.sink(StreamId(3)).unwrap();

        assert!(sink.push(frame(1)));
        assert!(sink.push(frame(2)));
        assert!(!sink.push(frame(3)));
        assert_eq!(sink.dropped(), 1);
        assert_eq!(feeds.dropped(StreamId(3)), 1);

        let latest = feeds.try_latest(StreamId(3)).unwrap();
        assert_eq!(latest.timestamp, 2);
        assert_eq!(latest.source, StreamId(3));
        assert!(feeds.try_latest(StreamId(3)).is_none());
    }

    #[test]
    fn test_recv_deadline_times_out() {
        let mut feeds = LiveFeeds::default();
        feeds.register(StreamId(1), 2);
        let start = Instant::now();
        let got = feeds.recv_deadline(StreamId(1), start + Duration::from_millis(20));
        assert!(got.is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_drain_discards_stale_frames() {
        let mut feeds = LiveFeeds::default();
        feeds.register(StreamId(1), 4);
        let sink = feeds.sink(StreamId(1)).unwrap();
        sink.push(frame(1));
        sink.push(frame(2));
        assert_eq!(feeds.drain(StreamId(1)), 2);
        assert!(feeds.sink(StreamId(9)).is_none());
    }
}
