//! Pose detection over tracked skeletons.
//!
//! Detection and limb extraction are free functions over a [`DetectionContext`]
//! that bundles everything a helper needs: the subject, its joints, the
//! projection service and the confidence threshold.

use std::collections::HashMap;

use crate::core::geometry;
use crate::source::projection::ProjectionService;
use crate::source::types::{Joint, JointSample, Point2, SubjectId};
use crate::sync::events::CrossEvent;

/// Joint pairs that make up the drawn skeleton.
pub const SKELETON_LIMBS: [(Joint, Joint); 15] = [
    (Joint::Head, Joint::Neck),
    (Joint::Neck, Joint::LeftShoulder),
    (Joint::LeftShoulder, Joint::LeftElbow),
    (Joint::LeftElbow, Joint::LeftHand),
    (Joint::Neck, Joint::RightShoulder),
    (Joint::RightShoulder, Joint::RightElbow),
    (Joint::RightElbow, Joint::RightHand),
    (Joint::LeftShoulder, Joint::Torso),
    (Joint::RightShoulder, Joint::Torso),
    (Joint::Torso, Joint::LeftHip),
    (Joint::LeftHip, Joint::LeftKnee),
    (Joint::LeftKnee, Joint::LeftFoot),
    (Joint::Torso, Joint::RightHip),
    (Joint::RightHip, Joint::RightKnee),
    (Joint::RightKnee, Joint::RightFoot),
];

/// Everything a detection or drawing helper needs for one subject.
pub struct DetectionContext<'a> {
    pub subject: SubjectId,
    pub joints: &'a HashMap<Joint, JointSample>,
    pub projection: &'a dyn ProjectionService,
    pub min_confidence: f32,
}

impl<'a> DetectionContext<'a> {
    /// Project a pair of joints, if both meet the confidence threshold.
    pub fn projected_pair(&self, from: Joint, to: Joint) -> Option<(Point2, Point2)> {
        let a = self.joints.get(&from)?;
        let b = self.joints.get(&to)?;
        if a.confidence < self.min_confidence || b.confidence < self.min_confidence {
            return None;
        }

        let projected = self
            .projection
            .real_world_to_image(&[a.position, b.position]);
        match projected.as_slice() {
            [pa, pb] => Some((*pa, *pb)),
            _ => None,
        }
    }

    /// Latest timestamp among the subject's joints.
    fn latest_timestamp(&self) -> u64 {
        self.joints.values().map(|s| s.timestamp).max().unwrap_or(0)
    }
}

/// A skeleton segment projected onto the image plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limb {
    pub from: Joint,
    pub to: Joint,
    pub start: Point2,
    pub end: Point2,
}

/// Limbs whose both joints are confidently tracked.
pub fn visible_limbs(ctx: &DetectionContext<'_>) -> Vec<Limb> {
    SKELETON_LIMBS
        .iter()
        .filter_map(|&(from, to)| {
            ctx.projected_pair(from, to).map(|(start, end)| Limb {
                from,
                to,
                start,
                end,
            })
        })
        .collect()
}

/// Detects forearms crossed in front of the body (an "X" pose).
///
/// Segment A is left elbow to left hand, segment B is right elbow to right hand.
pub fn detect_arm_cross(ctx: &DetectionContext<'_>) -> Option<CrossEvent> {
    let (a1, a2) = ctx.projected_pair(Joint::LeftElbow, Joint::LeftHand)?;
    let (b1, b2) = ctx.projected_pair(Joint::RightElbow, Joint::RightHand)?;

    let point = geometry::crossing(a1, a2, b1, b2)?;
    Some(CrossEvent {
        subject: ctx.subject,
        point,
        timestamp: ctx.latest_timestamp(),
    })
}

/// Strategy for turning a tracked skeleton into a cross event.
pub trait PoseDetector: Send {
    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<CrossEvent>;
}

/// The default detector: crossed forearms.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArmCrossDetector;

impl PoseDetector for ArmCrossDetector {
    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<CrossEvent> {
        detect_arm_cross(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::projection::PinholeProjection;
    use crate::source::types::Point3;

    fn skeleton(arms_crossed: bool, confidence: f32) -> HashMap<Joint, JointSample> {
        let subject = SubjectId(1);
        let (lh, rh) = if arms_crossed {
            (Point3::new(150.0, 300.0, 2000.0), Point3::new(-150.0, 300.0, 2000.0))
        } else {
            (Point3::new(-300.0, 300.0, 2000.0), Point3::new(300.0, 300.0, 2000.0))
        };
        [
            (Joint::LeftElbow, Point3::new(-150.0, 0.0, 2000.0)),
            (Joint::LeftHand, lh),
            (Joint::RightElbow, Point3::new(150.0, 0.0, 2000.0)),
            (Joint::RightHand, rh),
            (Joint::Head, Point3::new(0.0, 600.0, 2000.0)),
            (Joint::Neck, Point3::new(0.0, 450.0, 2000.0)),
        ]
        .into_iter()
        .map(|(joint, pos)| (joint, JointSample::new(subject, joint, pos, confidence, 1_000)))
        .collect()
    }

    #[test]
    fn test_crossed_arms_are_detected() {
        let joints = skeleton(true, 1.0);
        let projection = PinholeProjection::default();
        let ctx = DetectionContext {
            subject: SubjectId(1),
            joints: &joints,
            projection: &projection,
            min_confidence: 0.5,
        };

        let event = ArmCrossDetector.detect(&ctx).expect("arms should cross");
        assert_eq!(event.subject, SubjectId(1));
        assert_eq!(event.timestamp, 1_000);
        // symmetric pose crosses on the vertical centre line
        assert!((event.point.x - projection.cx).abs() < 1e-6);
    }

    #[test]
    fn test_open_arms_are_not_detected() {
        let joints = skeleton(false, 1.0);
        let projection = PinholeProjection::default();
        let ctx = DetectionContext {
            subject: SubjectId(1),
            joints: &joints,
            projection: &projection,
            min_confidence: 0.5,
        };
        assert!(detect_arm_cross(&ctx).is_none());
    }

    #[test]
    fn test_low_confidence_joints_are_skipped() {
        let joints = skeleton(true, 0.3);
        let projection = PinholeProjection::default();
        let ctx = DetectionContext {
            subject: SubjectId(1),
            joints: &joints,
            projection: &projection,
            min_confidence: 0.5,
        };
        assert!(detect_arm_cross(&ctx).is_none());
        assert!(visible_limbs(&ctx).is_empty());
    }

    #[test]
    fn test_visible_limbs_only_include_tracked_pairs() {
        let joints = skeleton(false, 0.9);
        let projection = PinholeProjection::default();
        let ctx = DetectionContext {
            subject: SubjectId(1),
            joints: &joints,
            projection: &projection,
            min_confidence: 0.5,
        };
        let limbs = visible_limbs(&ctx);
        let pairs: Vec<(Joint, Joint)> = limbs.iter().map(|l| (l.from, l.to)).collect();
        assert_eq!(
            pairs,
            vec![
                (Joint::Head, Joint::Neck),
                (Joint::LeftElbow, Joint::LeftHand),
                (Joint::RightElbow, Joint::RightHand),
            ]
        );
    }
}
