//! depthsync - depth-sensor stream synchronization and pose triggers.
//!
//! This library sits between a depth-camera runtime and whatever displays or
//! records its output. It normalizes raw depth frames for display, detects a
//! crossed-arms pose from tracked joints, and keeps several sensor streams
//! (live or recorded, one or more physical devices) frame-aligned.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          depthsync                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌──────────────────┐   ┌─────────────┐    │
//! │  │   Source    │──▶│   Coordinator    │──▶│    Depth    │    │
//! │  │ live/record │   │ wait · align ·   │   │ Normalizer  │    │
//! │  └─────────────┘   │ seek · devices   │   └─────────────┘    │
//! │  ┌─────────────┐   │                  │   ┌─────────────┐    │
//! │  │   Joints    │──▶│                  │──▶│    Pose     │    │
//! │  │ (tracking)  │   └──────────────────┘   │  Geometry   │    │
//! │  └─────────────┘      │           │       └─────────────┘    │
//! │                       ▼           ▼                          │
//! │              ┌─────────────┐ ┌─────────────┐                 │
//! │              │   Events    │ │   Session   │                 │
//! │              │ subscribers │ │    Stats    │                 │
//! │              └─────────────┘ └─────────────┘                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use depthsync::{Config, Coordinator, StreamKind, WaitStatus};
//!
//! let mut coordinator = Coordinator::live(Config::default());
//! let depth = coordinator.register_stream("Depth1", StreamKind::Depth).unwrap();
//! let sink = coordinator.frame_sink(depth).unwrap();
//! // hand `sink` to the producer thread, then:
//! coordinator.start(depth).unwrap();
//! if coordinator.wait_for_all(&[depth]).unwrap() == WaitStatus::Ready {
//!     let intensities = coordinator.intensity_buffer(depth).unwrap();
//!     println!("{} pixels", intensities.len());
//! }
//! # drop(sink);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod source;
pub mod stats;
pub mod sync;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, PlaybackConfig};
pub use error::{ErrorCategory, SyncError};
pub use source::{
    CameraConfig, Cropping, Frame, FrameSink, Joint, JointSample, JointSink, Point2, Point3,
    RecordedTrack, Recording, StreamId, StreamKind, SubjectId, SyntheticCamera,
};
pub use stats::{SessionStats, SharedSessionStats, StatsSnapshot};
pub use sync::{
    Coordinator, CrossEvent, DeviceBundle, SeekOrigin, SessionSource, SharedRegion, StreamEvent,
    StreamState, SyncEvent, WaitStatus,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
