//! Core algorithms for depthsync.
//!
//! This module contains:
//! - Depth normalization (cumulative-histogram equalization)
//! - 2D segment geometry for limb crossing
//! - Pose detection over tracked skeletons

pub mod depth;
pub mod geometry;
pub mod pose;

// Re-export commonly used types
pub use depth::{equalize, render_image, render_intensity};
pub use geometry::{cross_hit_test, cross_point, crossing};
pub use pose::{
    detect_arm_cross, visible_limbs, ArmCrossDetector, DetectionContext, Limb, PoseDetector,
    SKELETON_LIMBS,
};
