use std::path::PathBuf;

/// Errors that can occur while opening or reading a serial device.
#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    /// Failed to open the device node.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The device was opened but its line settings could not be applied.
    #[error("failed to configure {path}: {source}")]
    Configure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The requested speed is not a supported termios baud rate.
    #[error("unsupported baud rate: {0}")]
    UnsupportedBaudRate(String),

    /// The requested character format is not supported.
    #[error("unsupported character format: {0} (expected 8N1 or 7E1)")]
    UnsupportedFormat(String),

    /// An I/O error occurred on the open device.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;
