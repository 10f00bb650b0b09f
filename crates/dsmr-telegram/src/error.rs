/// Errors that can occur while locating, validating or reading telegrams.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// No `/XXX5` header marker in the input.
    #[error("no start of P1 telegram found")]
    MissingStartMarker,

    /// A header marker was found but no `!....\r\n` trailer after it.
    #[error("no end of P1 telegram found")]
    MissingEndMarker,

    /// The trailer does not carry exactly four hexadecimal digits.
    #[error("malformed checksum field {field:?} (expected 4 hex digits)")]
    MalformedChecksum { field: String },

    /// The declared checksum does not match the CRC of the telegram.
    #[error("incorrect checksum (declared {declared:04X}, computed {computed:04X})")]
    ChecksumMismatch { declared: u16, computed: u16 },

    /// A candidate telegram grew beyond the configured maximum size.
    #[error("telegram too large ({size} bytes, max {max})")]
    TelegramTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading the underlying stream.
    #[error("telegram I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream reached EOF.
    #[error("stream closed")]
    StreamClosed,
}

impl TelegramError {
    /// True for failures local to one candidate frame.
    ///
    /// A reader that returned one of these can keep reading; the bad frame
    /// has already been dropped from its buffer.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            TelegramError::MissingStartMarker
                | TelegramError::MissingEndMarker
                | TelegramError::MalformedChecksum { .. }
                | TelegramError::ChecksumMismatch { .. }
                | TelegramError::TelegramTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TelegramError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_mismatch_message_uses_hex() {
        let err = TelegramError::ChecksumMismatch {
            declared: 0xE86E,
            computed: 0xE86D,
        };
        assert_eq!(
            err.to_string(),
            "incorrect checksum (declared E86E, computed E86D)"
        );
    }

    #[test]
    fn stream_errors_are_not_validation_errors() {
        assert!(!TelegramError::StreamClosed.is_validation_error());
        assert!(!TelegramError::Io(std::io::Error::other("boom")).is_validation_error());
        assert!(TelegramError::MissingEndMarker.is_validation_error());
    }
}
