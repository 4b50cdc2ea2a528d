//! Frame Synchronization Coordinator.
//!
//! Owns every stream of a session and advances them from one driving loop:
//!
//! ```text
//! loop {
//!     wait_for_all(..) / wait_for_one(..)   // bounded by Config::wait_timeout
//!       └─ on Ready: drain joints ─▶ normalize ─▶ detect ─▶ notify
//!     service one control request (seek, toggle, stop, ..)
//! }
//! ```
//!
//! The coordinator is not meant to be shared between loops. Producers run on
//! their own threads and hand frames over through bounded channels; recorded
//! sessions are stepped directly from memory.

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::Config;
use crate::core::depth;
use crate::core::pose::{self, ArmCrossDetector, DetectionContext, Limb, PoseDetector};
use crate::error::SyncError;
use crate::source::live::{joint_channel, FrameSink, JointSink, LiveFeeds};
use crate::source::projection::{PinholeProjection, ProjectionService};
use crate::source::recording::Recording;
use crate::source::types::{
    Cropping, Frame, Joint, JointSample, StreamId, StreamKind, SubjectId,
};
use crate::stats::{SessionStats, SharedSessionStats};
use crate::sync::alignment::{self, FrameSyncPairs};
use crate::sync::devices::{self, DeviceBundle};
use crate::sync::events::{
    CrossEvent, EventBus, JointEvent, StreamEvent, Subscription, SubscriptionId,
};
use crate::sync::playback::{Advance, Player, SeekOrigin};
use crate::sync::shared::{PublishedFrame, PublishedState, SharedRegion};
use crate::sync::stream::{Stream, StreamState};
use crate::sync::tracking::TrackingState;

/// Largest sample value of an image stream.
const IMAGE_MAX: u16 = u8::MAX as u16;

/// Where a session's frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    Live,
    Recorded,
}

/// Outcome of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStatus {
    /// Every awaited stream delivered a new frame
    Ready,
    /// The wait timed out; frames that did arrive are kept for the next wait
    NoData,
    /// A recorded stream ran out of data and has stopped
    EndOfStream,
}

enum Feed {
    Live(LiveFeeds),
    Recorded(Player),
}

struct Slot {
    stream: Stream,
    latest: Option<Arc<Frame>>,
    /// Frame received by a wait that did not complete
    pending: Option<Arc<Frame>>,
    intensity: Option<Arc<[u8]>>,
}

impl Slot {
    fn new(stream: Stream) -> Self {
        Self {
            stream,
            latest: None,
            pending: None,
            intensity: None,
        }
    }
}

/// The session owner.
pub struct Coordinator {
    session_id: Uuid,
    config: Config,
    feed: Feed,
    slots: BTreeMap<StreamId, Slot>,
    next_id: u32,
    frame_sync: FrameSyncPairs,
    events: EventBus,
    tracking: TrackingState,
    joint_sink: JointSink,
    joint_rx: Receiver<Vec<JointSample>>,
    projection: Box<dyn ProjectionService>,
    detector: Box<dyn PoseDetector>,
    cross_events: Vec<CrossEvent>,
    tick: u64,
    stats: SharedSessionStats,
}

impl Coordinator {
    fn with_feed(config: Config, feed: Feed) -> Self {
        let (joint_sink, joint_rx) = joint_channel(config.frame_queue_depth.max(8));
        Self {
            session_id: Uuid::new_v4(),
            config,
            feed,
            slots: BTreeMap::new(),
            next_id: 1,
            frame_sync: FrameSyncPairs::new(),
            events: EventBus::new(),
            tracking: TrackingState::new(),
            joint_sink,
            joint_rx,
            projection: Box::new(PinholeProjection::default()),
            detector: Box::new(ArmCrossDetector),
            cross_events: Vec::new(),
            tick: 0,
            stats: Arc::new(SessionStats::new()),
        }
    }

    /// A session fed by live producers. Streams are added with [`register_stream`].
    ///
    /// [`register_stream`]: Coordinator::register_stream
    pub fn live(config: Config) -> Self {
        let coordinator = Self::with_feed(config, Feed::Live(LiveFeeds::default()));
        tracing::info!(session = %coordinator.session_id, "live session created");
        coordinator
    }

    /// A session replaying a recording. Every track becomes a bound stream.
    pub fn recorded(config: Config, recording: Recording) -> Result<Self, SyncError> {
        let player = Player::new(config.playback.speed, config.playback.repeat)?;
        let mut coordinator = Self::with_feed(config, Feed::Recorded(player));

        for mut track in recording.into_tracks() {
            let id = coordinator.allocate_id();
            track.assign_source(id);
            let device = devices::device_index(&track.instance_name).unwrap_or(0);
            let stream = Stream::new(
                id,
                track.kind,
                track.instance_name.clone(),
                device,
                track.max_depth,
            );
            if let Feed::Recorded(player) = &mut coordinator.feed {
                player.add_track(id, track);
            }
            coordinator.bind(stream);
        }

        tracing::info!(
            session = %coordinator.session_id,
            streams = coordinator.slots.len(),
            "recorded session created"
        );
        Ok(coordinator)
    }

    pub fn with_projection(mut self, projection: Box<dyn ProjectionService>) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_detector(mut self, detector: Box<dyn PoseDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_stats(mut self, stats: SharedSessionStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn source(&self) -> SessionSource {
        match self.feed {
            Feed::Live(_) => SessionSource::Live,
            Feed::Recorded(_) => SessionSource::Recorded,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &SharedSessionStats {
        &self.stats
    }

    /// Completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    // ---- stream lifecycle ----

    fn allocate_id(&mut self) -> StreamId {
        let id = StreamId(self.next_id);
        self.next_id += 1;
        id
    }

    fn bind(&mut self, mut stream: Stream) {
        stream.bind();
        let id = stream.id;
        tracing::info!(
            stream = %id,
            kind = stream.kind.label(),
            instance = %stream.instance_name,
            device = stream.device,
            "stream bound"
        );
        self.slots.insert(id, Slot::new(stream));
        self.events.publish(StreamEvent::Bound { stream: id });
    }

    /// Register a live stream discovered under `instance_name`.
    ///
    /// The device index comes from the name's trailing digit; names without
    /// one are assigned to device 0.
    pub fn register_stream(
        &mut self,
        instance_name: &str,
        kind: StreamKind,
    ) -> Result<StreamId, SyncError> {
        if !matches!(self.feed, Feed::Live(_)) {
            return Err(SyncError::NotLive);
        }

        let id = self.allocate_id();
        let device = devices::device_index(instance_name).unwrap_or(0);
        let max_depth = match kind {
            StreamKind::Depth => self.config.max_depth,
            StreamKind::Image => IMAGE_MAX,
        };
        if let Feed::Live(feeds) = &mut self.feed {
            feeds.register(id, self.config.frame_queue_depth);
        }
        self.bind(Stream::new(id, kind, instance_name, device, max_depth));
        Ok(id)
    }

    /// Producer handle for a live stream.
    pub fn frame_sink(&self, id: StreamId) -> Result<FrameSink, SyncError> {
        match &self.feed {
            Feed::Live(feeds) => feeds.sink(id).ok_or(SyncError::Unbound(id)),
            Feed::Recorded(_) => Err(SyncError::NotLive),
        }
    }

    /// Producer handle for the tracking collaborator.
    pub fn joint_sink(&self) -> JointSink {
        self.joint_sink.clone()
    }

    pub fn start(&mut self, id: StreamId) -> Result<(), SyncError> {
        let slot = self.slots.get_mut(&id).ok_or(SyncError::Unbound(id))?;
        slot.stream.start()?;
        slot.pending = None;

        match &mut self.feed {
            Feed::Live(feeds) => {
                let stale = feeds.drain(id);
                if stale > 0 {
                    tracing::debug!(stream = %id, stale, "discarded frames queued before start");
                }
            }
            Feed::Recorded(player) => {
                if player.is_ended(id)? {
                    player.rewind(id)?;
                }
            }
        }

        tracing::info!(stream = %id, "stream generating");
        self.events.publish(StreamEvent::Generating { stream: id });
        Ok(())
    }

    pub fn stop(&mut self, id: StreamId) -> Result<(), SyncError> {
        let slot = self.slot_mut(id)?;
        if slot.stream.stop()? {
            slot.pending = None;
            tracing::info!(stream = %id, "stream stopped");
            self.events.publish(StreamEvent::Stopped { stream: id });
        }
        Ok(())
    }

    /// Start every stream that is not already generating.
    pub fn start_all(&mut self) -> Result<(), SyncError> {
        let ids: Vec<StreamId> = self
            .slots
            .values()
            .filter(|slot| !slot.stream.is_generating())
            .map(|slot| slot.stream.id)
            .collect();
        for id in ids {
            self.start(id)?;
        }
        Ok(())
    }

    pub fn stop_all(&mut self) -> Result<(), SyncError> {
        let ids: Vec<StreamId> = self.slots.keys().copied().collect();
        for id in ids {
            self.stop(id)?;
        }
        Ok(())
    }

    pub fn state(&self, id: StreamId) -> Result<StreamState, SyncError> {
        Ok(self.slot(id)?.stream.state())
    }

    pub fn stream(&self, id: StreamId) -> Result<&Stream, SyncError> {
        Ok(&self.slot(id)?.stream)
    }

    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.slots.values().map(|slot| &slot.stream)
    }

    /// First registered stream of a kind.
    pub fn find_stream(&self, kind: StreamKind) -> Option<StreamId> {
        self.streams().find(|s| s.kind == kind).map(|s| s.id)
    }

    /// Image/depth streams grouped by physical device.
    pub fn device_bundles(&self) -> Vec<DeviceBundle> {
        devices::group_devices(self.streams().map(|s| (s.id, s.kind, s.device)))
    }

    // ---- waiting ----

    /// Wait until every named stream has delivered one new frame.
    ///
    /// Returns [`WaitStatus::NoData`] after `wait_timeout` if any stream is
    /// still missing; frames that did arrive are held back so the next call
    /// cannot return a partial set.
    pub fn wait_for_all(&mut self, ids: &[StreamId]) -> Result<WaitStatus, SyncError> {
        let ids = dedup(ids);
        if let Some(status) = self.check_waitable(&ids)? {
            return Ok(status);
        }

        let stepped = match &mut self.feed {
            Feed::Live(feeds) => {
                let deadline = Instant::now() + self.config.wait_timeout;
                if !receive_all(feeds, &mut self.slots, &ids, deadline) {
                    self.stats.record_timeout();
                    tracing::debug!(streams = ids.len(), "wait for all timed out");
                    return Ok(WaitStatus::NoData);
                }
                Some(commit_pending(&mut self.slots, &ids))
            }
            Feed::Recorded(player) => {
                if let Some(first) = ids.first() {
                    pace(player, *first, &self.config);
                }
                step_recorded(player, &mut self.slots, &ids)?
            }
        };
        let Some(delivered) = stepped else {
            self.finish_ended(&ids)?;
            return Ok(WaitStatus::EndOfStream);
        };

        self.stats.record_frames(delivered.len() as u64);
        self.process_tick(&delivered);
        Ok(WaitStatus::Ready)
    }

    /// [`wait_for_all`](Coordinator::wait_for_all) over every generating stream.
    pub fn wait_and_update_all(&mut self) -> Result<WaitStatus, SyncError> {
        let generating: Vec<StreamId> = self
            .slots
            .values()
            .filter(|slot| slot.stream.is_generating())
            .map(|slot| slot.stream.id)
            .collect();

        if generating.is_empty() {
            let ended = self.slots.values().any(|slot| slot.stream.reached_end());
            return Ok(if ended {
                WaitStatus::EndOfStream
            } else {
                WaitStatus::NoData
            });
        }
        self.wait_for_all(&generating)
    }

    /// Advance the primary stream (and anything frame-synced with it) and pick
    /// up whatever the other generating streams last produced, without
    /// waiting on them.
    pub fn wait_for_one(&mut self, primary: StreamId) -> Result<WaitStatus, SyncError> {
        if let Some(status) = self.check_waitable(&[primary])? {
            return Ok(status);
        }

        let mut awaited = vec![primary];
        for partner in self.frame_sync.partners(primary) {
            if self.slot(partner)?.stream.is_generating() {
                awaited.push(partner);
            }
        }
        let others: Vec<StreamId> = self
            .slots
            .values()
            .filter(|slot| slot.stream.is_generating() && !awaited.contains(&slot.stream.id))
            .map(|slot| slot.stream.id)
            .collect();

        let stepped = match &mut self.feed {
            Feed::Live(feeds) => {
                let deadline = Instant::now() + self.config.wait_timeout;
                if !receive_all(feeds, &mut self.slots, &awaited, deadline) {
                    self.stats.record_timeout();
                    tracing::debug!(stream = %primary, "wait for one timed out");
                    return Ok(WaitStatus::NoData);
                }
                Some(commit_pending(&mut self.slots, &awaited))
            }
            Feed::Recorded(player) => {
                pace(player, primary, &self.config);
                step_recorded(player, &mut self.slots, &awaited)?
            }
        };
        let Some(mut delivered) = stepped else {
            self.finish_ended(&awaited)?;
            return Ok(WaitStatus::EndOfStream);
        };
        self.stats.record_frames(delivered.len() as u64);

        // Opportunistic pickup; these do not count as delivered frames.
        match &mut self.feed {
            Feed::Live(feeds) => {
                for id in &others {
                    let Some(frame) = feeds.try_latest(*id) else {
                        continue;
                    };
                    if let Some(slot) = self.slots.get_mut(id) {
                        slot.latest = Some(Arc::new(frame));
                        delivered.push(*id);
                    }
                }
            }
            Feed::Recorded(player) => {
                let timestamp = player.tell_timestamp();
                for id in &others {
                    let frame = player.follow(*id, timestamp)?;
                    if let (Some(frame), Some(slot)) = (frame, self.slots.get_mut(id)) {
                        let changed = slot
                            .latest
                            .as_ref()
                            .map_or(true, |prev| !Arc::ptr_eq(prev, &frame));
                        if changed {
                            slot.latest = Some(frame);
                            delivered.push(*id);
                        }
                    }
                }
            }
        }

        self.process_tick(&delivered);
        Ok(WaitStatus::Ready)
    }

    /// Validate streams before waiting. `Some(EndOfStream)` short-circuits the
    /// wait for recorded streams that already ran out of data.
    fn check_waitable(&self, ids: &[StreamId]) -> Result<Option<WaitStatus>, SyncError> {
        for id in ids {
            let stream = &self.slot(*id)?.stream;
            if stream.reached_end() && !stream.is_generating() {
                return Ok(Some(WaitStatus::EndOfStream));
            }
            stream.ensure_generating()?;
        }
        Ok(None)
    }

    /// Stop recorded streams whose data ran out and notify once per stream.
    fn finish_ended(&mut self, ids: &[StreamId]) -> Result<(), SyncError> {
        let Feed::Recorded(player) = &self.feed else {
            return Ok(());
        };
        let mut ended = Vec::new();
        for id in ids {
            if player.would_end(*id)? {
                ended.push(*id);
            }
        }

        for id in ended {
            let slot = self.slot_mut(id)?;
            if !slot.stream.is_generating() {
                continue;
            }
            slot.stream.end_of_data();
            if let Feed::Recorded(player) = &mut self.feed {
                // Marks the cursor as ended so a later start rewinds
                player.advance(id)?;
            }
            tracing::info!(stream = %id, "end of recorded stream");
            self.stats.record_end_of_stream();
            self.events.publish(StreamEvent::EndOfStream { stream: id });
        }
        Ok(())
    }

    // ---- per-tick processing ----

    fn process_tick(&mut self, updated: &[StreamId]) {
        while let Ok(batch) = self.joint_rx.try_recv() {
            self.submit_joints(batch);
        }

        self.refresh_intensity(updated);
        self.detect();

        self.tick += 1;
        self.stats.record_tick();
    }

    /// Recompute intensity buffers of the streams that just received a frame.
    fn refresh_intensity(&mut self, updated: &[StreamId]) {
        let mut rendered = Vec::with_capacity(updated.len());

        for id in updated {
            let Some(slot) = self.slots.get(id) else {
                continue;
            };
            let Some(frame) = slot.latest.as_ref() else {
                continue;
            };

            let mut view = Cow::Borrowed(frame.as_ref());
            if let Some(target) = slot.stream.align_target() {
                // Until the target has a frame, reproject at the source's own size
                let (w, h) = self
                    .slots
                    .get(&target)
                    .and_then(|t| t.latest.as_ref())
                    .map_or((frame.width, frame.height), |t| (t.width, t.height));
                view = Cow::Owned(self.projection.reproject(frame, w, h));
            }
            if slot.stream.is_mirrored() {
                view = Cow::Owned(view.mirrored());
            }
            if let Some(window) = slot.stream.cropping() {
                match view.cropped(&window) {
                    Some(cropped) => view = Cow::Owned(cropped),
                    None => tracing::debug!(stream = %id, ?window, "cropping window outside frame"),
                }
            }

            let buffer = match slot.stream.kind {
                StreamKind::Image => depth::render_image(&view),
                StreamKind::Depth => depth::render_intensity(
                    &view,
                    slot.stream.max_depth,
                    self.config.background_intensity,
                ),
            };
            rendered.push((*id, buffer));
        }

        for (id, buffer) in rendered {
            if let Some(slot) = self.slots.get_mut(&id) {
                slot.intensity = Some(Arc::from(buffer));
            }
        }
    }

    fn detect(&mut self) {
        self.cross_events.clear();

        for (subject, joints) in self.tracking.iter() {
            let ctx = DetectionContext {
                subject,
                joints,
                projection: self.projection.as_ref(),
                min_confidence: self.config.min_joint_confidence,
            };
            if let Some(event) = self.detector.detect(&ctx) {
                self.cross_events.push(event);
            }
        }

        for event in &self.cross_events {
            tracing::debug!(
                subject = %event.subject,
                x = event.point.x,
                y = event.point.y,
                "cross detected"
            );
            self.stats.record_cross_event();
            self.events.publish(*event);
        }
    }

    // ---- data access ----

    /// Most recent frame of a stream.
    pub fn latest_frame(&self, id: StreamId) -> Result<Arc<Frame>, SyncError> {
        self.slot(id)?
            .latest
            .clone()
            .ok_or(SyncError::DataUnavailable {
                stream: id,
                what: "frame",
            })
    }

    /// Display intensities for the stream's most recent frame, `width * height` bytes.
    ///
    /// Depth streams aligned to an image stream are reprojected first, so the
    /// buffer has the image stream's resolution. Mirroring is applied next and
    /// cropping last, which shrinks the buffer to the cropping window.
    pub fn intensity_buffer(&self, id: StreamId) -> Result<Arc<[u8]>, SyncError> {
        self.slot(id)?
            .intensity
            .clone()
            .ok_or(SyncError::DataUnavailable {
                stream: id,
                what: "intensity buffer",
            })
    }

    /// Frames a live producer discarded because the stream's queue was full.
    ///
    /// Always 0 for recorded streams.
    pub fn dropped_frames(&self, id: StreamId) -> Result<u64, SyncError> {
        self.slot(id)?;
        Ok(match &self.feed {
            Feed::Live(feeds) => feeds.dropped(id),
            Feed::Recorded(_) => 0,
        })
    }

    /// The first cross event of the last tick, if any.
    pub fn cross_event(&self) -> Option<CrossEvent> {
        self.cross_events.first().copied()
    }

    /// Every cross event of the last tick.
    pub fn cross_events(&self) -> &[CrossEvent] {
        &self.cross_events
    }

    /// Publish a summary of the current tick for out-of-loop readers.
    pub fn publish_to(&self, region: &SharedRegion) {
        let frames = self
            .slots
            .values()
            .filter_map(|slot| slot.latest.as_ref())
            .map(|frame| PublishedFrame {
                stream: frame.source,
                frame_index: frame.frame_index,
                timestamp: frame.timestamp,
                width: frame.width,
                height: frame.height,
            })
            .collect();

        region.publish(PublishedState {
            tick: self.tick,
            frames,
            cross_event: self.cross_event(),
        });
    }

    // ---- viewpoint alignment ----

    pub fn is_viewpoint_supported(
        &self,
        source: StreamId,
        target: StreamId,
    ) -> Result<bool, SyncError> {
        Ok(alignment::viewpoint_supported(
            &self.slot(source)?.stream,
            &self.slot(target)?.stream,
        ))
    }

    /// Whether `source` is currently aligned to `target`.
    pub fn is_viewpoint_as(&self, source: StreamId, target: StreamId) -> Result<bool, SyncError> {
        self.slot(target)?;
        Ok(self.slot(source)?.stream.align_target() == Some(target))
    }

    /// Reproject `source`'s future frames into `target`'s viewpoint.
    pub fn set_viewpoint(&mut self, source: StreamId, target: StreamId) -> Result<(), SyncError> {
        alignment::check_viewpoint(&self.slot(source)?.stream, &self.slot(target)?.stream)?;

        let previous = self.slot(source)?.stream.align_target();
        if previous == Some(target) {
            return Ok(());
        }
        if let Some(old) = previous {
            self.events.publish(StreamEvent::AlignmentChanged {
                stream: source,
                target: old,
                aligned: false,
            });
        }

        self.slot_mut(source)?.stream.set_align_target(Some(target));
        tracing::info!(stream = %source, target = %target, "viewpoint aligned");
        self.events.publish(StreamEvent::AlignmentChanged {
            stream: source,
            target,
            aligned: true,
        });
        Ok(())
    }

    /// Return `source` to its own viewpoint.
    pub fn reset_viewpoint(&mut self, source: StreamId) -> Result<(), SyncError> {
        let slot = self.slot_mut(source)?;
        if let Some(target) = slot.stream.align_target() {
            slot.stream.set_align_target(None);
            tracing::info!(stream = %source, target = %target, "viewpoint reset");
            self.events.publish(StreamEvent::AlignmentChanged {
                stream: source,
                target,
                aligned: false,
            });
        }
        Ok(())
    }

    /// Flip alignment of `source` onto `target`. Returns the new state.
    pub fn toggle_viewpoint(
        &mut self,
        source: StreamId,
        target: StreamId,
    ) -> Result<bool, SyncError> {
        if self.is_viewpoint_as(source, target)? {
            self.reset_viewpoint(source)?;
            Ok(false)
        } else {
            self.set_viewpoint(source, target)?;
            Ok(true)
        }
    }

    // ---- frame sync ----

    pub fn can_frame_sync_with(&self, a: StreamId, b: StreamId) -> Result<bool, SyncError> {
        Ok(alignment::frame_sync_supported(
            &self.slot(a)?.stream,
            &self.slot(b)?.stream,
        ))
    }

    pub fn is_frame_synced_with(&self, a: StreamId, b: StreamId) -> Result<bool, SyncError> {
        self.slot(a)?;
        self.slot(b)?;
        Ok(self.frame_sync.contains(a, b))
    }

    /// Make `a` and `b` advance together under [`wait_for_one`](Coordinator::wait_for_one).
    pub fn frame_sync_with(&mut self, a: StreamId, b: StreamId) -> Result<(), SyncError> {
        if !self.can_frame_sync_with(a, b)? {
            return Err(SyncError::UnsupportedFrameSync(a, b));
        }
        if self.frame_sync.set(a, b, true) {
            tracing::info!(first = %a, second = %b, "frame sync enabled");
            self.events.publish(StreamEvent::FrameSyncChanged {
                first: a,
                second: b,
                synced: true,
            });
        }
        Ok(())
    }

    pub fn stop_frame_sync_with(&mut self, a: StreamId, b: StreamId) -> Result<(), SyncError> {
        self.slot(a)?;
        self.slot(b)?;
        if self.frame_sync.set(a, b, false) {
            tracing::info!(first = %a, second = %b, "frame sync disabled");
            self.events.publish(StreamEvent::FrameSyncChanged {
                first: a,
                second: b,
                synced: false,
            });
        }
        Ok(())
    }

    // ---- mirroring and cropping ----

    pub fn is_mirrored(&self, id: StreamId) -> Result<bool, SyncError> {
        Ok(self.slot(id)?.stream.is_mirrored())
    }

    /// Flip the stream's rendered output left to right.
    pub fn set_mirror(&mut self, id: StreamId, mirrored: bool) -> Result<(), SyncError> {
        let stream = &mut self.slot_mut(id)?.stream;
        if stream.is_mirrored() == mirrored {
            return Ok(());
        }
        stream.set_mirrored(mirrored);
        tracing::info!(stream = %id, mirrored, "mirror changed");
        self.events.publish(StreamEvent::MirrorChanged { stream: id, mirrored });
        Ok(())
    }

    /// Apply one mirror setting to every stream of the session.
    pub fn set_global_mirror(&mut self, mirrored: bool) -> Result<(), SyncError> {
        let ids: Vec<StreamId> = self.slots.keys().copied().collect();
        for id in ids {
            self.set_mirror(id, mirrored)?;
        }
        Ok(())
    }

    pub fn cropping(&self, id: StreamId) -> Result<Option<Cropping>, SyncError> {
        Ok(self.slot(id)?.stream.cropping())
    }

    /// Restrict the stream's rendered output to a window; `None` restores the full frame.
    pub fn set_cropping(
        &mut self,
        id: StreamId,
        cropping: Option<Cropping>,
    ) -> Result<(), SyncError> {
        self.slot(id)?;
        if let Some(window) = cropping.filter(Cropping::is_empty) {
            return Err(SyncError::InvalidCropping {
                stream: id,
                width: window.width,
                height: window.height,
            });
        }

        let stream = &mut self.slot_mut(id)?.stream;
        if stream.cropping() == cropping {
            return Ok(());
        }
        stream.set_cropping(cropping);
        tracing::info!(stream = %id, ?cropping, "cropping changed");
        self.events.publish(StreamEvent::CroppingChanged { stream: id, cropping });
        Ok(())
    }

    // ---- playback ----

    fn player(&self) -> Result<&Player, SyncError> {
        match &self.feed {
            Feed::Recorded(player) => Ok(player),
            Feed::Live(_) => Err(SyncError::NotRecorded),
        }
    }

    fn player_mut(&mut self) -> Result<&mut Player, SyncError> {
        match &mut self.feed {
            Feed::Recorded(player) => Ok(player),
            Feed::Live(_) => Err(SyncError::NotRecorded),
        }
    }

    pub fn speed(&self) -> Result<f64, SyncError> {
        Ok(self.player()?.speed())
    }

    /// Set the playback multiplier. Non-positive or non-finite values are
    /// rejected and leave the speed unchanged.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), SyncError> {
        self.player_mut()?.set_speed(speed)?;
        tracing::info!(speed, "playback speed changed");
        Ok(())
    }

    pub fn is_repeat(&self) -> Result<bool, SyncError> {
        Ok(self.player()?.is_repeat())
    }

    pub fn set_repeat(&mut self, repeat: bool) -> Result<(), SyncError> {
        self.player_mut()?.set_repeat(repeat);
        Ok(())
    }

    /// Seek one stream by frame; the others follow by timestamp.
    pub fn seek_to_frame(
        &mut self,
        id: StreamId,
        offset: i64,
        origin: SeekOrigin,
    ) -> Result<u64, SyncError> {
        self.slot(id)?;
        let index = self.player_mut()?.seek_to_frame(id, offset, origin)?;
        tracing::info!(stream = %id, offset, ?origin, index, "seek to frame");
        Ok(index)
    }

    /// Seek every stream by session timestamp (microseconds).
    pub fn seek_to_timestamp(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64, SyncError> {
        let position = self.player_mut()?.seek_to_timestamp(offset, origin);
        tracing::info!(offset, ?origin, position, "seek to timestamp");
        Ok(position)
    }

    pub fn tell_frame(&self, id: StreamId) -> Result<u64, SyncError> {
        self.slot(id)?;
        self.player()?.tell_frame(id)
    }

    pub fn tell_timestamp(&self) -> Result<u64, SyncError> {
        Ok(self.player()?.tell_timestamp())
    }

    pub fn frame_count(&self, id: StreamId) -> Result<usize, SyncError> {
        self.slot(id)?;
        self.player()?.frame_count(id)
    }

    // ---- tracking ----

    /// Merge joint samples into the tracking state and notify subscribers.
    pub fn submit_joints<I>(&mut self, samples: I)
    where
        I: IntoIterator<Item = JointSample>,
    {
        for outcome in self.tracking.merge(samples) {
            if outcome.newly_found {
                tracing::info!(subject = %outcome.subject, "subject found");
                self.events.publish(JointEvent::SubjectFound {
                    subject: outcome.subject,
                });
            }
            self.events.publish(JointEvent::JointsUpdated {
                subject: outcome.subject,
                joints: outcome.joints,
            });
        }
    }

    /// Drop a subject from tracking. Returns false if it was not tracked.
    pub fn lose_subject(&mut self, subject: SubjectId) -> bool {
        if !self.tracking.remove(subject) {
            return false;
        }
        tracing::info!(subject = %subject, "subject lost");
        self.events.publish(JointEvent::SubjectLost { subject });
        true
    }

    pub fn tracked_subjects(&self) -> Vec<SubjectId> {
        self.tracking.subjects()
    }

    pub fn joints(&self, subject: SubjectId) -> Option<&HashMap<Joint, JointSample>> {
        self.tracking.joints(subject)
    }

    /// Projected skeleton segments of a subject, for drawing.
    pub fn visible_limbs(&self, subject: SubjectId) -> Vec<Limb> {
        match self.tracking.joints(subject) {
            Some(joints) => pose::visible_limbs(&DetectionContext {
                subject,
                joints,
                projection: self.projection.as_ref(),
                min_confidence: self.config.min_joint_confidence,
            }),
            None => Vec::new(),
        }
    }

    // ---- notifications ----

    pub fn subscribe(&mut self) -> Subscription {
        self.events.subscribe()
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // ---- helpers ----

    fn slot(&self, id: StreamId) -> Result<&Slot, SyncError> {
        self.slots.get(&id).ok_or(SyncError::Unbound(id))
    }

    fn slot_mut(&mut self, id: StreamId) -> Result<&mut Slot, SyncError> {
        self.slots.get_mut(&id).ok_or(SyncError::Unbound(id))
    }
}

fn dedup(ids: &[StreamId]) -> Vec<StreamId> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Fill each stream's pending slot. Returns false if any is still empty at the deadline.
fn receive_all(
    feeds: &LiveFeeds,
    slots: &mut BTreeMap<StreamId, Slot>,
    ids: &[StreamId],
    deadline: Instant,
) -> bool {
    let mut complete = true;
    for id in ids {
        let Some(slot) = slots.get_mut(id) else {
            continue;
        };
        if slot.pending.is_none() {
            slot.pending = feeds.recv_deadline(*id, deadline).map(Arc::new);
        }
        complete &= slot.pending.is_some();
    }
    complete
}

fn commit_pending(slots: &mut BTreeMap<StreamId, Slot>, ids: &[StreamId]) -> Vec<StreamId> {
    let mut delivered = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(slot) = slots.get_mut(id) {
            if let Some(frame) = slot.pending.take() {
                slot.latest = Some(frame);
                delivered.push(*id);
            }
        }
    }
    delivered
}

/// Advance each recorded stream one frame. `None` if any of them is out of data,
/// in which case no cursor moves.
fn step_recorded(
    player: &mut Player,
    slots: &mut BTreeMap<StreamId, Slot>,
    ids: &[StreamId],
) -> Result<Option<Vec<StreamId>>, SyncError> {
    for id in ids {
        if player.would_end(*id)? {
            return Ok(None);
        }
    }

    let mut delivered = Vec::with_capacity(ids.len());
    for id in ids {
        let frame = match player.advance(*id)? {
            Advance::Frame(frame) | Advance::Wrapped(frame) => frame,
            Advance::EndOfData => continue,
        };
        if let Some(slot) = slots.get_mut(id) {
            slot.latest = Some(frame);
            delivered.push(*id);
        }
    }
    Ok(Some(delivered))
}

/// Sleep until the next recorded frame is due, when realtime playback is on.
fn pace(player: &Player, id: StreamId, config: &Config) {
    if !config.playback.realtime {
        return;
    }
    let Ok(Some(next)) = player.peek_next_timestamp(id) else {
        return;
    };
    let current = player.tell_timestamp();
    if next <= current {
        return;
    }

    let micros = (next - current) as f64 / player.speed();
    let delay = Duration::from_micros(micros as u64).min(config.wait_timeout);
    thread::sleep(delay);
}
