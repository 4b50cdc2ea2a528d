//! Typed notifications and the listener set that delivers them.
//!
//! Subscribers receive events over their own channel; dropping the receiver
//! or calling [`EventBus::unsubscribe`] removes the listener.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::source::types::{Cropping, Point2, StreamId, SubjectId};

/// Stream lifecycle and capability changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Bound { stream: StreamId },
    Generating { stream: StreamId },
    Stopped { stream: StreamId },
    AlignmentChanged {
        stream: StreamId,
        target: StreamId,
        aligned: bool,
    },
    FrameSyncChanged {
        first: StreamId,
        second: StreamId,
        synced: bool,
    },
    MirrorChanged {
        stream: StreamId,
        mirrored: bool,
    },
    CroppingChanged {
        stream: StreamId,
        cropping: Option<Cropping>,
    },
    EndOfStream { stream: StreamId },
}

/// Subject tracking changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JointEvent {
    SubjectFound { subject: SubjectId },
    SubjectLost { subject: SubjectId },
    JointsUpdated { subject: SubjectId, joints: usize },
}

/// Two tracked limb segments crossed on the image plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossEvent {
    pub subject: SubjectId,
    /// Crossing point in image coordinates
    pub point: Point2,
    /// Timestamp of the newest joint sample involved, in microseconds
    pub timestamp: u64,
}

/// Any notification published by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEvent {
    Stream(StreamEvent),
    Joint(JointEvent),
    Cross(CrossEvent),
}

impl From<StreamEvent> for SyncEvent {
    fn from(event: StreamEvent) -> Self {
        SyncEvent::Stream(event)
    }
}

impl From<JointEvent> for SyncEvent {
    fn from(event: JointEvent) -> Self {
        SyncEvent::Joint(event)
    }
}

impl From<CrossEvent> for SyncEvent {
    fn from(event: CrossEvent) -> Self {
        SyncEvent::Cross(event)
    }
}

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A live subscription: its id and the receiving end of its channel.
pub struct Subscription {
    pub id: SubscriptionId,
    pub receiver: Receiver<SyncEvent>,
}

/// The set of current listeners.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Sender<SyncEvent>)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener.
    pub fn subscribe(&mut self) -> Subscription {
        let (sender, receiver) = unbounded();
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, sender));
        Subscription { id, receiver }
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    /// Deliver an event to every listener, dropping listeners whose receiver is gone.
    pub fn publish(&mut self, event: impl Into<SyncEvent>) {
        let event = event.into();
        self.listeners
            .retain(|(_, sender)| sender.send(event).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_all_listeners() {
        let mut bus = EventBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.publish(StreamEvent::Bound {
            stream: StreamId(1),
        });

        let expected = SyncEvent::Stream(StreamEvent::Bound {
            stream: StreamId(1),
        });
        assert_eq!(first.receiver.try_recv().ok(), Some(expected));
        assert_eq!(second.receiver.try_recv().ok(), Some(expected));
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let sub = bus.subscribe();
        assert!(bus.unsubscribe(sub.id));
        assert!(!bus.unsubscribe(sub.id));

        bus.publish(JointEvent::SubjectFound {
            subject: SubjectId(2),
        });
        assert!(sub.receiver.try_recv().is_err());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let mut bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(StreamEvent::EndOfStream {
            stream: StreamId(4),
        });
        assert_eq!(bus.listener_count(), 1);
        assert!(kept.receiver.try_recv().is_ok());
    }

    #[test]
    fn test_events_serialize_with_type_tags() {
        let json = serde_json::to_value(SyncEvent::Stream(StreamEvent::AlignmentChanged {
            stream: StreamId(1),
            target: StreamId(2),
            aligned: true,
        }))
        .unwrap();
        assert_eq!(json["stream"]["type"], "alignment_changed");
        assert_eq!(json["stream"]["aligned"], true);
    }
}
