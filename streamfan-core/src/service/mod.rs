//! Service layer: everything the poll loop is made of

pub mod checkpoint;
pub mod cursor;
pub mod delivery;
pub mod poll_loop;
pub mod poller;
pub mod reconciler;
pub mod subscribers;

pub use checkpoint::CheckpointStore;
pub use cursor::{CursorTracker, ShardPoll};
pub use delivery::{DeliveryDispatcher, FanoutReport};
pub use poll_loop::{CycleReport, PollLoop};
pub use poller::RecordPoller;
pub use reconciler::{reconcile, StreamReconciler};
pub use subscribers::SubscriberDirectory;
