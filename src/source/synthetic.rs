//! Synthetic sensor used when no physical device is attached.
//!
//! The camera renders a depth ramp with a moving band, a luminance pattern,
//! and a scripted skeleton whose forearms cross periodically. The same pure
//! generators back both the live producer thread and in-memory recordings.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::SyncError;
use crate::source::live::{FrameSink, JointSink};
use crate::source::recording::{RecordedTrack, Recording, UNBOUND_SOURCE};
use crate::source::types::{Frame, Joint, JointSample, Point3, StreamKind, SubjectId};

/// Shape and cadence of the synthetic sensor.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub max_depth: u16,
    pub subject: SubjectId,
    /// Ticks spent in each pose (arms open, then arms crossed)
    pub pose_period: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 160,
            height: 120,
            fps: 30,
            max_depth: 10_000,
            subject: SubjectId(1),
            pose_period: 30,
        }
    }
}

impl CameraConfig {
    /// Device timestamp of a tick, in microseconds.
    pub fn timestamp(&self, tick: u64) -> u64 {
        tick * 1_000_000 / u64::from(self.fps.max(1))
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.fps.max(1)))
    }
}

/// Errors that can occur while driving the synthetic camera.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("camera is already running")]
    AlreadyRunning,
}

/// Where the camera's output goes. Missing sinks are skipped.
#[derive(Clone, Default)]
pub struct CameraOutputs {
    pub depth: Option<FrameSink>,
    pub image: Option<FrameSink>,
    pub joints: Option<JointSink>,
}

/// Background producer thread emitting frames at the configured rate.
pub struct SyntheticCamera {
    config: CameraConfig,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Start producing into `outputs`.
    pub fn start(&mut self, outputs: CameraOutputs) -> Result<(), CameraError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CameraError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let config = self.config.clone();
        let handle = thread::spawn(move || {
            run_camera_loop(&config, &outputs, &running);
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        tracing::debug!(
            width = self.config.width,
            height = self.config.height,
            fps = self.config.fps,
            "synthetic camera started"
        );
        Ok(())
    }

    /// Stop producing. Takes effect at the producer's next frame boundary.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_camera_loop(config: &CameraConfig, outputs: &CameraOutputs, running: &AtomicBool) {
    let interval = config.frame_interval();
    let mut tick = 0u64;

    while running.load(Ordering::SeqCst) {
        if let Some(sink) = &outputs.depth {
            sink.push(depth_frame(config, tick));
        }
        if let Some(sink) = &outputs.image {
            sink.push(image_frame(config, tick));
        }
        if let Some(sink) = &outputs.joints {
            sink.push(skeleton(config, tick));
        }
        tick += 1;
        thread::sleep(interval);
    }
}

/// Depth map for one tick.
///
/// Border pixels read 0 (no data). Interior depth grows left to right with a
/// band of nearer readings sweeping downward over time.
pub fn depth_frame(config: &CameraConfig, tick: u64) -> Frame {
    let (w, h) = (config.width, config.height);
    let max = u32::from(config.max_depth.max(2));
    let far = max - 1;
    let near = (max / 10).max(1);
    let band = if h > 0 { (tick % u64::from(h)) as u32 } else { 0 };

    Frame::from_fn(w, h, config.timestamp(tick), tick, UNBOUND_SOURCE, |x, y| {
        let value = if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
            0
        } else if y.abs_diff(band) < 4 {
            near
        } else {
            near + (far - near) * x / w
        };
        value.min(max) as u16
    })
}

/// Luminance pattern for one tick.
pub fn image_frame(config: &CameraConfig, tick: u64) -> Frame {
    let (w, h) = (config.width, config.height);
    let shift = (tick % 256) as u32;
    Frame::from_fn(w, h, config.timestamp(tick), tick, UNBOUND_SOURCE, |x, y| {
        ((x + y + shift) % 256) as u16
    })
}

/// Whether the scripted subject has its forearms crossed at `tick`.
pub fn arms_crossed(config: &CameraConfig, tick: u64) -> bool {
    (tick / config.pose_period.max(1)) % 2 == 1
}

/// Scripted skeleton for one tick, in millimetres two metres from the sensor.
pub fn skeleton(config: &CameraConfig, tick: u64) -> Vec<JointSample> {
    const Z: f64 = 2000.0;
    let (left_hand, right_hand) = if arms_crossed(config, tick) {
        (Point3::new(150.0, 300.0, Z), Point3::new(-150.0, 300.0, Z))
    } else {
        (Point3::new(-300.0, 300.0, Z), Point3::new(300.0, 300.0, Z))
    };

    let pose = [
        (Joint::Head, Point3::new(0.0, 650.0, Z)),
        (Joint::Neck, Point3::new(0.0, 500.0, Z)),
        (Joint::Torso, Point3::new(0.0, 200.0, Z)),
        (Joint::LeftShoulder, Point3::new(-180.0, 480.0, Z)),
        (Joint::LeftElbow, Point3::new(-150.0, 0.0, Z)),
        (Joint::LeftHand, left_hand),
        (Joint::RightShoulder, Point3::new(180.0, 480.0, Z)),
        (Joint::RightElbow, Point3::new(150.0, 0.0, Z)),
        (Joint::RightHand, right_hand),
        (Joint::LeftHip, Point3::new(-120.0, -100.0, Z)),
        (Joint::LeftKnee, Point3::new(-130.0, -500.0, Z)),
        (Joint::LeftFoot, Point3::new(-140.0, -900.0, Z)),
        (Joint::RightHip, Point3::new(120.0, -100.0, Z)),
        (Joint::RightKnee, Point3::new(130.0, -500.0, Z)),
        (Joint::RightFoot, Point3::new(140.0, -900.0, Z)),
    ];

    let timestamp = config.timestamp(tick);
    pose.into_iter()
        .map(|(joint, position)| JointSample::new(config.subject, joint, position, 0.9, timestamp))
        .collect()
}

/// An in-memory recording of `frames` ticks from one synthetic device.
///
/// Tracks are named after device `device` ("Depth1"/"Image1" for device 0).
pub fn recording(
    config: &CameraConfig,
    device: usize,
    frames: u64,
) -> Result<Recording, SyncError> {
    let depth = (0..frames).map(|t| depth_frame(config, t)).collect();
    let image = (0..frames).map(|t| image_frame(config, t)).collect();
    let suffix = device + 1;

    Ok(Recording::new()
        .with_track(RecordedTrack::new(
            format!("Depth{suffix}"),
            StreamKind::Depth,
            config.max_depth,
            depth,
        )?)
        .with_track(RecordedTrack::new(
            format!("Image{suffix}"),
            StreamKind::Image,
            u16::from(u8::MAX),
            image,
        )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::live::LiveFeeds;
    use crate::source::types::StreamId;
    use std::time::Instant;

    fn small() -> CameraConfig {
        CameraConfig {
            width: 16,
            height: 12,
            fps: 100,
            max_depth: 1000,
            pose_period: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_depth_frame_shape_and_bounds() {
        let config = small();
        let frame = depth_frame(&config, 3);
        assert_eq!(frame.pixel_count(), 16 * 12);
        assert_eq!(frame.at(0, 0), Some(0));
        assert_eq!(frame.at(15, 11), Some(0));
        assert!(frame.at(5, 8).unwrap() > 0);
        assert!(frame.max_sample() <= config.max_depth);
        assert_eq!(frame.timestamp, 30_000);
    }

    #[test]
    fn test_skeleton_alternates_pose() {
        let config = small();
        assert!(!arms_crossed(&config, 0));
        assert!(!arms_crossed(&config, 1));
        assert!(arms_crossed(&config, 2));
        assert_eq!(skeleton(&config, 2).len(), Joint::ALL.len());
    }

    #[test]
    fn test_recording_names_tracks_by_device() {
        let rec = recording(&small(), 1, 5).unwrap();
        let names: Vec<&str> = rec.tracks().iter().map(|t| t.instance_name.as_str()).collect();
        assert_eq!(names, vec!["Depth2", "Image2"]);
        assert!(rec.tracks().iter().all(|t| t.len() == 5));
    }

    #[test]
    fn test_camera_produces_into_sink() {
        let mut feeds = LiveFeeds::default();
        feeds.register(StreamId(1), 4);
        let mut camera = SyntheticCamera::new(small());
        camera
            .start(CameraOutputs {
                depth: feeds.sink(StreamId(1)),
                ..Default::default()
            })
            .unwrap();
        assert!(matches!(
            camera.start(CameraOutputs::default()),
            Err(CameraError::AlreadyRunning)
        ));

        let frame = feeds.recv_deadline(StreamId(1), Instant::now() + Duration::from_secs(2));
        camera.stop();
        assert!(!camera.is_running());
        assert_eq!(frame.unwrap().source, StreamId(1));
    }
}
