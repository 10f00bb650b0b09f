use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::error::{Result, TelegramError};
use crate::telegram::{end_of_telegram, start_of_telegram, verify, Span, Telegram};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 1024;

/// Bytes kept when no header is buffered: a `/XXX5` marker split across two
/// reads leaves at most four of its bytes behind.
const MARKER_TAIL: usize = 4;

/// Default maximum telegram size: 16 KiB.
///
/// DSMR 5 telegrams with several sub-meters stay well below 4 KiB.
pub const DEFAULT_MAX_TELEGRAM_SIZE: usize = 16 * 1024;

/// Configuration for [`TelegramReader`].
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Largest candidate telegram, header through trailer. Default: 16 KiB.
    pub max_telegram_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_telegram_size: DEFAULT_MAX_TELEGRAM_SIZE,
        }
    }
}

/// Reads validated telegrams from any `Read` stream.
///
/// Handles partial reads and line noise internally. A frame that fails
/// validation is reported once and dropped; the next call continues with
/// the bytes after it.
#[derive(Debug)]
pub struct TelegramReader<T> {
    inner: T,
    buf: BytesMut,
    config: ReaderConfig,
}

impl<T: Read> TelegramReader<T> {
    /// Create a new telegram reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, ReaderConfig::default())
    }

    /// Create a new telegram reader with explicit configuration.
    pub fn with_config(inner: T, config: ReaderConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next telegram (blocking).
    ///
    /// Returns `Err(TelegramError::StreamClosed)` when EOF is reached.
    /// Errors for which [`TelegramError::is_validation_error`] is true leave
    /// the reader usable.
    pub fn read_telegram(&mut self) -> Result<Telegram> {
        loop {
            if let Some(result) = self.take_telegram() {
                return result;
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TelegramError::Io(err)),
            };

            if read == 0 {
                return Err(TelegramError::StreamClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Try to cut one candidate telegram out of the buffer.
    ///
    /// `None` means more input is needed.
    fn take_telegram(&mut self) -> Option<Result<Telegram>> {
        let Some(start) = start_of_telegram(&self.buf) else {
            let discard = self.buf.len().saturating_sub(MARKER_TAIL);
            if discard > 0 {
                trace!(discarded = discard, "dropping bytes outside telegram");
                self.buf.advance(discard);
            }
            return None;
        };

        if start > 0 {
            trace!(discarded = start, "dropping bytes before header");
            self.buf.advance(start);
        }

        let Some((bang, end)) = end_of_telegram(&self.buf, 0) else {
            let size = self.buf.len();
            if size > self.config.max_telegram_size {
                // Skip this header; a later one may still start a good telegram.
                self.buf.advance(1);
                return Some(Err(TelegramError::TelegramTooLarge {
                    size,
                    max: self.config.max_telegram_size,
                }));
            }
            return None;
        };

        let span = Span {
            start: 0,
            bang,
            end,
        };
        match verify(&self.buf, &span) {
            Ok(checksum) => {
                let bytes = self.buf.split_to(end).freeze();
                debug!(size = bytes.len(), checksum, "telegram read");
                Some(Ok(Telegram::from_verified(bytes, checksum)))
            }
            Err(err) => {
                // A stray header inside the rejected frame may start a real one.
                let resume = start_of_telegram(&self.buf[1..end]).map_or(end, |next| next + 1);
                debug!(error = %err, dropped = resume, "rejected telegram");
                self.buf.advance(resume);
                Some(Err(err))
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum telegram size for subsequent reads.
    pub fn set_max_telegram_size(&mut self, max_telegram_size: usize) {
        self.config.max_telegram_size = max_telegram_size;
    }

    /// Current reader configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }
}

impl<T: Read> Iterator for TelegramReader<T> {
    type Item = Result<Telegram>;

    /// Yields telegrams and per-frame errors until the stream ends.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_telegram() {
            Err(TelegramError::StreamClosed) => None,
            other => Some(other),
        }
    }
}
