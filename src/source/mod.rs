//! Frame and joint producers feeding the synchronization core.
//!
//! Live sensors push through [`FrameSink`]s, recorded sessions arrive as a
//! [`Recording`], and the [`synthetic`] camera stands in for hardware.

pub mod live;
pub mod projection;
pub mod recording;
pub mod synthetic;
pub mod types;

// Re-export commonly used types
pub use live::{FrameSink, JointSink};
pub use projection::{PinholeProjection, ProjectionService};
pub use recording::{RecordedTrack, Recording};
pub use synthetic::{CameraConfig, CameraOutputs, SyntheticCamera};
pub use types::{
    Cropping, Frame, Joint, JointSample, Point2, Point3, StreamId, StreamKind, SubjectId,
};
