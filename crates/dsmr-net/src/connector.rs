use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use dsmr_telegram::TelegramReader;
use tracing::info;

use crate::error::{NetError, Result};

/// Connect to a telegram server as a client.
///
/// The server writes raw telegrams back to back, so the returned reader
/// yields each one as it arrives.
pub fn connect(addr: &str) -> Result<TelegramReader<TcpStream>> {
    connect_with_timeout(addr, None)
}

/// Connect with an optional read timeout.
///
/// With a timeout, a quiet server makes [`TelegramReader::read_telegram`]
/// fail with an I/O error of kind `WouldBlock` or `TimedOut`.
pub fn connect_with_timeout(
    addr: &str,
    read_timeout: Option<Duration>,
) -> Result<TelegramReader<TcpStream>> {
    let connect_err = |source: std::io::Error| NetError::Connect {
        addr: addr.to_string(),
        source,
    };

    let addrs = addr.to_socket_addrs().map_err(connect_err)?;
    let mut last_err = None;
    for candidate in addrs {
        match TcpStream::connect(candidate) {
            Ok(stream) => {
                stream.set_read_timeout(read_timeout)?;
                info!(addr = %candidate, "connected to telegram server");
                return Ok(TelegramReader::new(stream));
            }
            Err(err) => last_err = Some(err),
        }
    }

    Err(connect_err(last_err.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "address resolved to nothing",
        )
    })))
}
