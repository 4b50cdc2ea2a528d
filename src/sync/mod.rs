//! Frame synchronization: stream lifecycle, waiting, alignment and playback.

pub mod alignment;
pub mod coordinator;
pub mod devices;
pub mod events;
pub mod playback;
pub mod shared;
pub mod stream;
pub mod tracking;

// Re-export commonly used types
pub use coordinator::{Coordinator, SessionSource, WaitStatus};
pub use devices::{device_index, group_devices, DeviceBundle};
pub use events::{CrossEvent, JointEvent, StreamEvent, Subscription, SubscriptionId, SyncEvent};
pub use playback::SeekOrigin;
pub use shared::{PublishedState, RegionReader, SharedRegion};
pub use stream::{Stream, StreamState};
pub use tracking::TrackingState;
