//! Projection between real-world and image-plane coordinates.
//!
//! The sensor runtime owns the real calibration; the core only talks to it
//! through [`ProjectionService`]. [`PinholeProjection`] is a stand-in built
//! from nominal structured-light sensor intrinsics at 640x480.

use crate::source::types::{Frame, Point2, Point3};

/// Focal length X (pixels) at the 640x480 reference resolution
pub const FX: f64 = 594.21;
/// Focal length Y (pixels) at the 640x480 reference resolution
pub const FY: f64 = 591.04;
/// Principal point X (pixels) at the 640x480 reference resolution
pub const CX: f64 = 339.5;
/// Principal point Y (pixels) at the 640x480 reference resolution
pub const CY: f64 = 242.7;

/// Reference width for the intrinsics above
pub const BASE_WIDTH: u32 = 640;
/// Reference height for the intrinsics above
pub const BASE_HEIGHT: u32 = 480;

/// External projection collaborator. Treated as a pure function by the core.
pub trait ProjectionService: Send {
    /// Project real-world points onto the depth image plane.
    fn real_world_to_image(&self, points: &[Point3]) -> Vec<Point2>;

    /// Reproject a depth frame into the coordinate frame of a target stream
    /// with the given resolution. Pixels without a source reading are 0.
    fn reproject(&self, frame: &Frame, target_width: u32, target_height: u32) -> Frame;
}

/// Pinhole model with a fixed horizontal shift between depth and image sensors.
#[derive(Debug, Clone, PartialEq)]
pub struct PinholeProjection {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// Horizontal offset (target pixels) applied when reprojecting depth onto the image sensor
    pub viewpoint_shift: i32,
}

impl Default for PinholeProjection {
    fn default() -> Self {
        Self {
            fx: FX,
            fy: FY,
            cx: CX,
            cy: CY,
            viewpoint_shift: 0,
        }
    }
}

impl PinholeProjection {
    /// Intrinsics scaled to a depth resolution other than 640x480.
    pub fn for_resolution(width: u32, height: u32) -> Self {
        let sx = width as f64 / BASE_WIDTH as f64;
        let sy = height as f64 / BASE_HEIGHT as f64;
        Self {
            fx: FX * sx,
            fy: FY * sy,
            cx: CX * sx,
            cy: CY * sy,
            viewpoint_shift: 0,
        }
    }

    pub fn with_viewpoint_shift(mut self, shift: i32) -> Self {
        self.viewpoint_shift = shift;
        self
    }
}

impl ProjectionService for PinholeProjection {
    fn real_world_to_image(&self, points: &[Point3]) -> Vec<Point2> {
        points
            .iter()
            .map(|p| {
                // Points at or behind the sensor pin to the principal point
                if p.z <= 0.0 {
                    return Point2::new(self.cx, self.cy);
                }
                Point2::new(self.fx * p.x / p.z + self.cx, self.cy - self.fy * p.y / p.z)
            })
            .collect()
    }

    fn reproject(&self, frame: &Frame, target_width: u32, target_height: u32) -> Frame {
        let shift = i64::from(self.viewpoint_shift);
        Frame::from_fn(
            target_width,
            target_height,
            frame.timestamp,
            frame.frame_index,
            frame.source,
            |tx, ty| {
                let shifted = i64::from(tx) - shift;
                if shifted < 0 || shifted >= i64::from(target_width) {
                    return 0;
                }
                let sx = (shifted as u64 * u64::from(frame.width) / u64::from(target_width)) as u32;
                let sy =
                    (u64::from(ty) * u64::from(frame.height) / u64::from(target_height)) as u32;
                frame.at(sx, sy).unwrap_or(0)
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::types::StreamId;

    #[test]
    fn test_point_on_axis_projects_to_principal_point() {
        let projection = PinholeProjection::default();
        let projected = projection.real_world_to_image(&[Point3::new(0.0, 0.0, 1500.0)]);
        assert_eq!(projected, vec![Point2::new(CX, CY)]);
    }

    #[test]
    fn test_positive_y_projects_upward() {
        let projection = PinholeProjection::default();
        let projected = projection.real_world_to_image(&[Point3::new(100.0, 100.0, 1000.0)]);
        assert!(projected[0].x > CX);
        assert!(projected[0].y < CY);
    }

    #[test]
    fn test_point_behind_sensor_is_pinned() {
        let projection = PinholeProjection::for_resolution(320, 240);
        let projected = projection.real_world_to_image(&[Point3::new(10.0, 10.0, 0.0)]);
        assert_eq!(projected[0], Point2::new(CX / 2.0, CY / 2.0));
    }

    #[test]
    fn test_reproject_scales_and_shifts() {
        let frame = Frame::new(2, 1, vec![100, 200], 55, 3, StreamId(1)).unwrap();

        let scaled = PinholeProjection::default().reproject(&frame, 4, 2);
        assert_eq!(scaled.samples(), &[100, 100, 200, 200, 100, 100, 200, 200]);
        assert_eq!(scaled.timestamp, 55);
        assert_eq!(scaled.frame_index, 3);

        let shifted = PinholeProjection::default()
            .with_viewpoint_shift(1)
            .reproject(&frame, 2, 1);
        assert_eq!(shifted.samples(), &[0, 100]);
    }
}
