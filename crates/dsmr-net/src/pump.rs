use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use dsmr_channel::BroadcastChannel;
use dsmr_telegram::{Telegram, TelegramError, TelegramReader};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Name of the thread that moves telegrams into the channel.
pub const PUMP_THREAD_NAME: &str = "dsmr-reader";

/// Counters maintained by a running pump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Telegrams that validated and were published.
    pub published: u64,
    /// Frames that failed validation and were skipped.
    pub rejected: u64,
}

/// Final state of a pump thread.
#[derive(Debug)]
pub struct PumpReport {
    pub stats: PumpStats,
    /// The error that stopped the pump. `None` when the source reached EOF.
    pub error: Option<TelegramError>,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PumpStats {
        PumpStats {
            published: self.published.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Background thread reading telegrams from a byte source and publishing
/// each valid one.
///
/// Invalid frames are logged and skipped. When the source ends or fails the
/// channel is closed so that waiting sessions wind down.
pub struct TelegramPump {
    handle: JoinHandle<Option<TelegramError>>,
    counters: Arc<Counters>,
}

impl TelegramPump {
    /// Start pumping `source` into `channel`.
    pub fn spawn<R>(source: R, channel: Arc<BroadcastChannel<Telegram>>) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let counters = Arc::new(Counters::default());
        let thread_counters = Arc::clone(&counters);

        let handle = thread::Builder::new()
            .name(PUMP_THREAD_NAME.to_string())
            .spawn(move || {
                let error = pump(TelegramReader::new(source), &channel, &thread_counters);
                channel.close();
                error
            })?;

        Ok(Self { handle, counters })
    }

    /// Counters so far.
    pub fn stats(&self) -> PumpStats {
        self.counters.snapshot()
    }

    /// Whether the pump thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the pump thread to exit.
    pub fn join(self) -> PumpReport {
        let error = match self.handle.join() {
            Ok(error) => error,
            Err(_) => Some(TelegramError::Io(std::io::Error::other(
                "telegram reader thread panicked",
            ))),
        };
        PumpReport {
            stats: self.counters.snapshot(),
            error,
        }
    }
}

impl std::fmt::Debug for TelegramPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramPump")
            .field("stats", &self.stats())
            .field("finished", &self.is_finished())
            .finish()
    }
}

fn pump<R: Read>(
    mut reader: TelegramReader<R>,
    channel: &BroadcastChannel<Telegram>,
    counters: &Counters,
) -> Option<TelegramError> {
    loop {
        match reader.read_telegram() {
            Ok(telegram) => {
                let size = telegram.len();
                let revision = channel.publish(telegram);
                counters.published.fetch_add(1, Ordering::Relaxed);
                debug!(revision, size, "published telegram");
            }
            Err(err) if err.is_validation_error() => {
                counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "rejected telegram");
            }
            Err(TelegramError::StreamClosed) => {
                info!(stats = ?counters.snapshot(), "telegram source closed");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "telegram source failed");
                return Some(err);
            }
        }
    }
}
