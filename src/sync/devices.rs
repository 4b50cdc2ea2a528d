//! Grouping streams by physical device.
//!
//! Instance identities reported by the runtime end in a device number
//! ("Image1", "Depth2", ...). That number, offset so `'1'` is device 0, is the
//! stable index used to bundle one sensor's image and depth streams.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::source::types::{StreamId, StreamKind};

/// Device index encoded in the last character of an instance identity.
///
/// `'1'..='9'` map to `0..=8`. Any other trailing character yields `None`.
pub fn device_index(instance_name: &str) -> Option<usize> {
    let last = instance_name.chars().last()?;
    match last {
        '1'..='9' => Some(last as usize - '1' as usize),
        _ => None,
    }
}

/// The streams of one physical sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBundle {
    pub index: usize,
    pub image: Option<StreamId>,
    pub depth: Option<StreamId>,
}

impl DeviceBundle {
    fn new(index: usize) -> Self {
        Self {
            index,
            image: None,
            depth: None,
        }
    }

    /// Whether the bundle carries both an image and a depth stream.
    pub fn is_complete(&self) -> bool {
        self.image.is_some() && self.depth.is_some()
    }
}

/// Group `(stream, kind, device)` triples into bundles ordered by device index.
///
/// If a device reports two streams of the same kind the first one is kept.
pub fn group_devices<I>(streams: I) -> Vec<DeviceBundle>
where
    I: IntoIterator<Item = (StreamId, StreamKind, usize)>,
{
    let mut bundles: BTreeMap<usize, DeviceBundle> = BTreeMap::new();

    for (id, kind, device) in streams {
        let bundle = bundles
            .entry(device)
            .or_insert_with(|| DeviceBundle::new(device));
        let slot = match kind {
            StreamKind::Image => &mut bundle.image,
            StreamKind::Depth => &mut bundle.depth,
        };
        match *slot {
            Some(existing) => tracing::warn!(
                device,
                kept = %existing,
                ignored = %id,
                "device reports more than one {} stream",
                kind.label()
            ),
            None => *slot = Some(id),
        }
    }

    bundles.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_index_from_instance_name() {
        assert_eq!(device_index("Depth1"), Some(0));
        assert_eq!(device_index("Image2"), Some(1));
        assert_eq!(device_index("Depth3"), Some(2));
        assert_eq!(device_index("Depth"), None);
        assert_eq!(device_index("Depth0"), None);
        assert_eq!(device_index(""), None);
    }

    #[test]
    fn test_group_devices_bundles_by_index() {
        let bundles = group_devices([
            (StreamId(1), StreamKind::Image, 1),
            (StreamId(2), StreamKind::Depth, 0),
            (StreamId(3), StreamKind::Depth, 1),
            (StreamId(4), StreamKind::Image, 0),
        ]);

        assert_eq!(
            bundles,
            vec![
                DeviceBundle {
                    index: 0,
                    image: Some(StreamId(4)),
                    depth: Some(StreamId(2)),
                },
                DeviceBundle {
                    index: 1,
                    image: Some(StreamId(1)),
                    depth: Some(StreamId(3)),
                },
            ]
        );
        assert!(bundles.iter().all(DeviceBundle::is_complete));
    }

    #[test]
    fn test_duplicate_kind_keeps_first() {
        let bundles = group_devices([
            (StreamId(1), StreamKind::Depth, 0),
            (StreamId(2), StreamKind::Depth, 0),
        ]);
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].depth, Some(StreamId(1)));
        assert!(!bundles[0].is_complete());
    }
}
