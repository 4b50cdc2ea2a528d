//! Latest joint samples per tracked subject.

use std::collections::{BTreeMap, HashMap};

use crate::source::types::{Joint, JointSample, SubjectId};

/// What a merge did to one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub subject: SubjectId,
    /// The subject was not tracked before this merge
    pub newly_found: bool,
    /// Joints now held for the subject
    pub joints: usize,
}

/// Subject id to latest joint samples. Owned by the coordinator.
#[derive(Debug, Default, Clone)]
pub struct TrackingState {
    subjects: BTreeMap<SubjectId, HashMap<Joint, JointSample>>,
}

impl TrackingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch of samples. Older samples never replace newer ones.
    pub fn merge<I>(&mut self, samples: I) -> Vec<MergeOutcome>
    where
        I: IntoIterator<Item = JointSample>,
    {
        let mut touched: BTreeMap<SubjectId, bool> = BTreeMap::new();

        for sample in samples {
            let newly_found = !self.subjects.contains_key(&sample.subject);
            touched.entry(sample.subject).or_insert(newly_found);

            let joints = self.subjects.entry(sample.subject).or_default();
            match joints.get(&sample.joint) {
                Some(existing) if existing.timestamp > sample.timestamp => {}
                _ => {
                    joints.insert(sample.joint, sample);
                }
            }
        }

        touched
            .into_iter()
            .map(|(subject, newly_found)| MergeOutcome {
                subject,
                newly_found,
                joints: self.subjects.get(&subject).map_or(0, HashMap::len),
            })
            .collect()
    }

    /// Forget a subject. Returns false if it was not tracked.
    pub fn remove(&mut self, subject: SubjectId) -> bool {
        self.subjects.remove(&subject).is_some()
    }

    pub fn joints(&self, subject: SubjectId) -> Option<&HashMap<Joint, JointSample>> {
        self.subjects.get(&subject)
    }

    pub fn subjects(&self) -> Vec<SubjectId> {
        self.subjects.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SubjectId, &HashMap<Joint, JointSample>)> {
        self.subjects.iter().map(|(id, joints)| (*id, joints))
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::types::Point3;

    fn sample(subject: u32, joint: Joint, x: f64, ts: u64) -> JointSample {
        JointSample::new(SubjectId(subject), joint, Point3::new(x, 0.0, 1000.0), 1.0, ts)
    }

    #[test]
    fn test_merge_reports_new_subjects_once() {
        let mut tracking = TrackingState::new();
        let outcomes = tracking.merge([
            sample(1, Joint::Head, 0.0, 10),
            sample(1, Joint::Neck, 0.0, 10),
            sample(2, Joint::Head, 0.0, 10),
        ]);
        assert_eq!(
            outcomes,
            vec![
                MergeOutcome {
                    subject: SubjectId(1),
                    newly_found: true,
                    joints: 2
                },
                MergeOutcome {
                    subject: SubjectId(2),
                    newly_found: true,
                    joints: 1
                },
            ]
        );

        let outcomes = tracking.merge([sample(1, Joint::Torso, 0.0, 20)]);
        assert!(!outcomes[0].newly_found);
        assert_eq!(outcomes[0].joints, 3);
    }

    #[test]
    fn test_stale_samples_are_ignored() {
        let mut tracking = TrackingState::new();
        tracking.merge([sample(1, Joint::Head, 5.0, 20)]);
        tracking.merge([sample(1, Joint::Head, 9.0, 10)]);
        let head = tracking.joints(SubjectId(1)).unwrap()[&Joint::Head];
        assert_eq!(head.position.x, 5.0);
    }

    #[test]
    fn test_remove_subject() {
        let mut tracking = TrackingState::new();
        tracking.merge([sample(3, Joint::Head, 0.0, 1)]);
        assert!(tracking.remove(SubjectId(3)));
        assert!(!tracking.remove(SubjectId(3)));
        assert!(tracking.is_empty());
    }
}
