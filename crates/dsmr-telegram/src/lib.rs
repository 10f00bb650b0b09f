//! DSMR P1 telegram validation and stream reading.
//!
//! A smart meter emits telegrams on its P1 port as plain text:
//! - A header line starting with `/` and a five character identification
//!   whose fifth character is `5`
//! - Data lines (`OBIS(value)`), each terminated by CR LF
//! - A trailer `!` followed by a four digit hexadecimal CRC-16/ARC and CR LF
//!
//! [`validate`] finds one telegram inside an arbitrary buffer and checks its
//! checksum. [`TelegramReader`] does the same over any `Read` stream.

pub mod crc;
pub mod error;
pub mod reader;
pub mod telegram;

pub use crc::checksum;
pub use error::{Result, TelegramError};
pub use reader::{ReaderConfig, TelegramReader, DEFAULT_MAX_TELEGRAM_SIZE};
pub use telegram::{locate, validate, Span, Telegram};
