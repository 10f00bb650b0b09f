use std::io::{ErrorKind, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dsmr_channel::{BroadcastChannel, ChannelError};
use dsmr_telegram::Telegram;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_POLL_INTERVAL, DEFAULT_WRITE_TIMEOUT};

/// Why a session stopped forwarding telegrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Writing to the client failed or stalled past the write timeout.
    Disconnected,
    /// The running flag was cleared.
    Shutdown,
    /// The channel was closed.
    ChannelClosed,
}

/// Outcome of [`ClientSession::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub end: SessionEnd,
    /// Telegrams written to the client.
    pub forwarded: u64,
}

/// One connected TCP client.
///
/// Each published telegram is written as its raw validated bytes; there is
/// no extra framing. Writes are bounded by a timeout so a client that stops
/// reading cannot pin the session thread.
#[derive(Debug)]
pub struct ClientSession {
    id: String,
    stream: TcpStream,
    peer_addr: Option<SocketAddr>,
    poll_interval: Duration,
}

impl ClientSession {
    /// Wrap an accepted stream.
    pub fn new(id: impl Into<String>, stream: TcpStream) -> Self {
        let peer_addr = stream.peer_addr().ok();
        if let Err(err) = stream.set_nodelay(true) {
            debug!(error = %err, "could not disable Nagle on client stream");
        }
        Self {
            id: id.into(),
            stream,
            peer_addr,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
        .with_write_timeout(DEFAULT_WRITE_TIMEOUT)
    }

    /// Bound how long forwarding one telegram may block on a client that is
    /// not reading. A zero duration is raised to one millisecond.
    pub fn with_write_timeout(self, timeout: Duration) -> Self {
        let timeout = timeout.max(Duration::from_millis(1));
        if let Err(err) = self.stream.set_write_timeout(Some(timeout)) {
            warn!(client = %self.id, error = %err, "could not set client write timeout");
        }
        self
    }

    /// Override how long a single wait may block before the running flag is
    /// checked again.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Session id (`client-N` for accepted sessions).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remote address, when the OS reported one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Forward every telegram published after entry until the client goes
    /// away, `running` is cleared or the channel closes.
    pub fn run(
        mut self,
        channel: &BroadcastChannel<Telegram>,
        running: &AtomicBool,
    ) -> SessionSummary {
        let mut forwarded = 0u64;

        let end = loop {
            if !running.load(Ordering::SeqCst) {
                break SessionEnd::Shutdown;
            }

            let telegram = match channel.await_next_timeout(self.poll_interval) {
                Ok(telegram) => telegram,
                Err(ChannelError::Timeout(_)) => continue,
                Err(ChannelError::Closed) => break SessionEnd::ChannelClosed,
            };

            if let Err(err) = self
                .stream
                .write_all(telegram.as_bytes())
                .and_then(|()| self.stream.flush())
            {
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) {
                    warn!(client = %self.id, "client stopped reading; dropping it");
                } else {
                    warn!(client = %self.id, error = %err, "client write failed");
                }
                break SessionEnd::Disconnected;
            }
            forwarded += 1;
            debug!(client = %self.id, size = telegram.len(), "forwarded telegram");
        };

        info!(client = %self.id, ?end, forwarded, "client session ended");
        SessionSummary { end, forwarded }
    }
}
