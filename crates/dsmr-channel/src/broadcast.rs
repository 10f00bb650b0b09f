use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{ChannelError, Result};

struct State<T> {
    /// Last published value; `None` until the first publish.
    current: Option<T>,
    /// Number of publishes so far.
    revision: u64,
    /// Threads currently blocked in a wait.
    waiting: usize,
    closed: bool,
}

/// A single-slot channel that hands the next published value to every
/// waiting consumer.
///
/// A wait is satisfied only by a publish that happens after the wait began:
/// the revision is sampled and compared under the same lock the condition
/// variable releases, so a publish racing with the start of a wait is never
/// lost, and a value that was already current is never returned.
///
/// If several publishes land before a woken consumer reacquires the lock, it
/// receives the latest of them.
///
/// All state changes are single assignments made under the lock, so a
/// poisoned mutex is recovered rather than propagated to consumers.
pub struct BroadcastChannel<T> {
    state: Mutex<State<T>>,
    published: Condvar,
}

impl<T: Clone> BroadcastChannel<T> {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                current: None,
                revision: 0,
                waiting: 0,
                closed: false,
            }),
            published: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the current value and wake every waiting consumer.
    ///
    /// Never blocks on consumers. Returns the new revision, or the unchanged
    /// revision if the channel is closed.
    pub fn publish(&self, value: T) -> u64 {
        let mut state = self.lock();
        if state.closed {
            trace!(revision = state.revision, "publish on closed channel ignored");
            return state.revision;
        }

        state.current = Some(value);
        state.revision = state.revision.wrapping_add(1);
        let revision = state.revision;
        let waiting = state.waiting;
        drop(state);

        self.published.notify_all();
        trace!(revision, waiting, "published");
        revision
    }

    /// Publish `value` if there is one; `None` leaves the channel untouched.
    pub fn offer(&self, value: Option<T>) -> Option<u64> {
        value.map(|value| self.publish(value))
    }

    /// Block until the next publish and return a copy of its value.
    ///
    /// Waits forever unless the channel is closed, in which case
    /// `Err(ChannelError::Closed)` is returned.
    pub fn await_next(&self) -> Result<T> {
        self.wait(None)
    }

    /// Like [`await_next`](Self::await_next), but gives up after `timeout`.
    pub fn await_next_timeout(&self, timeout: Duration) -> Result<T> {
        self.wait(Some(timeout))
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<T> {
        let mut state = self.lock();
        if state.closed {
            return Err(ChannelError::Closed);
        }

        let entered = state.revision;
        state.waiting += 1;

        let pending = |state: &mut State<T>| state.revision == entered && !state.closed;
        let mut state = match timeout {
            None => self
                .published
                .wait_while(state, pending)
                .unwrap_or_else(PoisonError::into_inner),
            Some(timeout) => {
                self.published
                    .wait_timeout_while(state, timeout, pending)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
        };
        state.waiting -= 1;

        if state.revision != entered {
            if let Some(value) = &state.current {
                return Ok(value.clone());
            }
        }
        if state.closed {
            Err(ChannelError::Closed)
        } else {
            Err(ChannelError::Timeout(timeout.unwrap_or_default()))
        }
    }

    /// Wake every waiter with `Err(ChannelError::Closed)` and refuse further
    /// publishes.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let waiting = state.waiting;
        drop(state);

        self.published.notify_all();
        debug!(waiting, "channel closed");
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Snapshot of the current value without waiting.
    pub fn latest(&self) -> Option<T> {
        self.lock().current.clone()
    }

    /// Number of publishes so far.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// Number of threads currently blocked in a wait.
    pub fn waiting(&self) -> usize {
        self.lock().waiting
    }
}

impl<T: Clone> Default for BroadcastChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for BroadcastChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("BroadcastChannel")
            .field("revision", &state.revision)
            .field("waiting", &state.waiting)
            .field("closed", &state.closed)
            .finish()
    }
}
