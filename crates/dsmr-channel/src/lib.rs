//! Latest-value broadcast channel.
//!
//! One producer publishes values; any number of consumer threads wait for the
//! *next* value. Nothing is queued: the channel holds a single slot, and a
//! consumer that was busy when a value was published never sees it.
//!
//! ```text
//! producer ── publish(v) ──▶ [ slot | revision ] ──▶ await_next() ×N
//! ```

pub mod broadcast;
pub mod error;

pub use broadcast::BroadcastChannel;
pub use error::{ChannelError, Result};
