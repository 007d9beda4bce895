//! Shared data model for the emergent feed simulation.
//!
//! Defines the types that cross crate boundaries: the virtual clock and its
//! timestamps, posted messages and the shared message log, and pending events
//! with the depth-tagged propagation queue.

pub mod message;
pub mod queue;
pub mod timestamp;

pub use message::{generate_message_id, Message, MessageLog, ReplyContext};
pub use queue::{EventQueue, PendingEvent};
pub use timestamp::{FeedTimestamp, ParseTimestampError, VirtualClock, MINUTES_PER_DAY};
