use std::time::Duration;

/// Reasons a wait on a [`BroadcastChannel`](crate::BroadcastChannel) ends
/// without a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The channel was closed before a new value was published.
    #[error("channel closed")]
    Closed,

    /// No value was published within the timeout.
    #[error("no value published within {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
