use std::net::SocketAddr;

/// Errors that can occur while serving or receiving telegrams over TCP.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Failed to bind the listening socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Accepting a client connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// Failed to connect to a telegram server.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The serial source could not be opened.
    #[error("serial error: {0}")]
    Serial(#[from] dsmr_serial::SerialError),

    /// Telegram-level error.
    #[error("telegram error: {0}")]
    Telegram(#[from] dsmr_telegram::TelegramError),

    /// Any other socket I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NetError>;
