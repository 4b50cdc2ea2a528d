//! Data types shared between sensor producers and the synchronization core.
//!
//! Frames and joint samples are produced by external collaborators (a live
//! device, a recording, the synthetic camera) and are never mutated once the
//! core has captured them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

use crate::error::SyncError;

/// Identifier of a registered stream within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub u32);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Identifier of a tracked subject (person) reported by the tracking collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectId(pub u32);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subject#{}", self.0)
    }
}

/// Kind of sensor output carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Camera image, one luminance sample per pixel
    Image,
    /// Depth map, one distance reading per pixel (0 = no reading)
    Depth,
}

impl StreamKind {
    pub fn label(&self) -> &'static str {
        match self {
            StreamKind::Image => "image",
            StreamKind::Depth => "depth",
        }
    }
}

/// One captured frame of a stream.
///
/// `samples.len() == width * height` always holds for a constructed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    samples: Vec<u16>,
    /// Device timestamp in microseconds
    pub timestamp: u64,
    /// Index of this frame within its stream
    pub frame_index: u64,
    /// Stream that produced this frame
    pub source: StreamId,
}

impl Frame {
    /// Create a frame, validating the buffer length against the resolution.
    pub fn new(
        width: u32,
        height: u32,
        samples: Vec<u16>,
        timestamp: u64,
        frame_index: u64,
        source: StreamId,
    ) -> Result<Self, SyncError> {
        let expected = width as usize * height as usize;
        if samples.len() != expected {
            return Err(SyncError::MalformedFrame {
                expected,
                actual: samples.len(),
            });
        }

        Ok(Self {
            width,
            height,
            samples,
            timestamp,
            frame_index,
            source,
        })
    }

    /// Create a frame by evaluating `sample(x, y)` for every pixel.
    pub fn from_fn(
        width: u32,
        height: u32,
        timestamp: u64,
        frame_index: u64,
        source: StreamId,
        mut sample: impl FnMut(u32, u32) -> u16,
    ) -> Self {
        let mut samples = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                samples.push(sample(x, y));
            }
        }

        Self {
            width,
            height,
            samples,
            timestamp,
            frame_index,
            source,
        }
    }

    /// Raw samples in row-major order.
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Number of pixels in the frame.
    pub fn pixel_count(&self) -> usize {
        self.samples.len()
    }

    /// Sample at `(x, y)`, or `None` outside the frame.
    pub fn at(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples.get((y * self.width + x) as usize).copied()
    }

    /// Largest sample value in the frame.
    pub fn max_sample(&self) -> u16 {
        self.samples.iter().copied().max().unwrap_or(0)
    }

    /// Copy of the frame flipped left to right.
    pub fn mirrored(&self) -> Frame {
        let last = self.width.saturating_sub(1);
        Frame::from_fn(
            self.width,
            self.height,
            self.timestamp,
            self.frame_index,
            self.source,
            |x, y| self.at(last - x, y).unwrap_or(0),
        )
    }

    /// The part of the frame inside `window`, clipped to the frame bounds.
    ///
    /// `None` when the window lies entirely outside the frame.
    pub fn cropped(&self, window: &Cropping) -> Option<Frame> {
        let right = window.x.saturating_add(window.width).min(self.width);
        let bottom = window.y.saturating_add(window.height).min(self.height);
        if window.x >= right || window.y >= bottom {
            return None;
        }

        Some(Frame::from_fn(
            right - window.x,
            bottom - window.y,
            self.timestamp,
            self.frame_index,
            self.source,
            |x, y| self.at(window.x + x, window.y + y).unwrap_or(0),
        ))
    }
}

/// Rectangular output window of a stream, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cropping {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Cropping {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A point on the image plane, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Z component of the cross product of two 2D vectors.
    pub fn cross(self, other: Point2) -> f64 {
        self.x * other.y - self.y * other.x
    }
}

impl Sub for Point2 {
    type Output = Point2;

    fn sub(self, rhs: Point2) -> Point2 {
        Point2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A real-world position in millimetres (sensor coordinate frame).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Tracked skeletal landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Head,
    Neck,
    Torso,
    LeftShoulder,
    LeftElbow,
    LeftHand,
    RightShoulder,
    RightElbow,
    RightHand,
    LeftHip,
    LeftKnee,
    LeftFoot,
    RightHip,
    RightKnee,
    RightFoot,
}

impl Joint {
    pub const ALL: [Joint; 15] = [
        Joint::Head,
        Joint::Neck,
        Joint::Torso,
        Joint::LeftShoulder,
        Joint::LeftElbow,
        Joint::LeftHand,
        Joint::RightShoulder,
        Joint::RightElbow,
        Joint::RightHand,
        Joint::LeftHip,
        Joint::LeftKnee,
        Joint::LeftFoot,
        Joint::RightHip,
        Joint::RightKnee,
        Joint::RightFoot,
    ];
}

/// One joint observation from the tracking collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    pub joint: Joint,
    pub subject: SubjectId,
    /// Real-world position
    pub position: Point3,
    /// Tracking confidence in [0, 1]
    pub confidence: f32,
    /// Timestamp in microseconds
    pub timestamp: u64,
}

impl JointSample {
    pub fn new(
        subject: SubjectId,
        joint: Joint,
        position: Point3,
        confidence: f32,
        timestamp: u64,
    ) -> Self {
        Self {
            joint,
            subject,
            position,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_wrong_buffer_length() {
        let err = Frame::new(4, 2, vec![0; 7], 0, 0, StreamId(1)).unwrap_err();
        assert_eq!(
            err,
            SyncError::MalformedFrame {
                expected: 8,
                actual: 7
            }
        );
    }

    #[test]
    fn test_frame_pixel_access() {
        let frame = Frame::new(3, 2, vec![1, 2, 3, 4, 5, 6], 10, 0, StreamId(1)).unwrap();
        assert_eq!(frame.at(0, 0), Some(1));
        assert_eq!(frame.at(2, 1), Some(6));
        assert_eq!(frame.at(3, 0), None);
        assert_eq!(frame.max_sample(), 6);
    }

    #[test]
    fn test_frame_from_fn() {
        let frame = Frame::from_fn(3, 2, 0, 0, StreamId(1), |x, y| (x + 10 * y) as u16);
        assert_eq!(frame.samples(), &[0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn test_frame_mirrored() {
        let frame = Frame::new(3, 2, vec![1, 2, 3, 4, 5, 6], 10, 4, StreamId(2)).unwrap();
        let flipped = frame.mirrored();
        assert_eq!(flipped.samples(), &[3, 2, 1, 6, 5, 4]);
        assert_eq!(flipped.timestamp, 10);
        assert_eq!(flipped.frame_index, 4);
        assert_eq!(flipped.mirrored(), frame);
    }

    #[test]
    fn test_frame_cropped_is_clipped_to_bounds() {
        let frame = Frame::from_fn(4, 3, 0, 0, StreamId(1), |x, y| (y * 4 + x) as u16);

        let inner = frame.cropped(&Cropping::new(1, 1, 2, 2)).unwrap();
        assert_eq!((inner.width, inner.height), (2, 2));
        assert_eq!(inner.samples(), &[5, 6, 9, 10]);

        let clipped = frame.cropped(&Cropping::new(2, 1, 10, 10)).unwrap();
        assert_eq!((clipped.width, clipped.height), (2, 2));
        assert_eq!(clipped.samples(), &[6, 7, 10, 11]);

        assert!(frame.cropped(&Cropping::new(4, 0, 2, 2)).is_none());
    }

    #[test]
    fn test_cross_product_sign() {
        let x = Point2::new(1.0, 0.0);
        let y = Point2::new(0.0, 1.0);
        assert_eq!(x.cross(y), 1.0);
        assert_eq!(y.cross(x), -1.0);
    }

    #[test]
    fn test_joint_confidence_is_clamped() {
        let sample = JointSample::new(SubjectId(1), Joint::Head, Point3::default(), 1.7, 0);
        assert_eq!(sample.confidence, 1.0);
    }
}
