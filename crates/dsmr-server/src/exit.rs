use std::fmt;
use std::io;

use dsmr_net::NetError;
use dsmr_serial::SerialError;
use dsmr_telegram::TelegramError;

// sysexits-style exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn serial_error(context: &str, err: SerialError) -> CliError {
    match err {
        SerialError::Open { ref source, .. } | SerialError::Configure { ref source, .. } => {
            let code = match source.kind() {
                io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
                _ => TRANSPORT_ERROR,
            };
            CliError::new(code, format!("{context}: {err}"))
        }
        SerialError::UnsupportedBaudRate(_) | SerialError::UnsupportedFormat(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        SerialError::Io(source) => io_error(context, source),
    }
}

pub fn telegram_error(context: &str, err: TelegramError) -> CliError {
    match err {
        TelegramError::Io(source) => io_error(context, source),
        TelegramError::StreamClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other if other.is_validation_error() => {
            CliError::new(DATA_INVALID, format!("{context}: {other}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn net_error(context: &str, err: NetError) -> CliError {
    match err {
        NetError::Bind { source, .. }
        | NetError::Connect { source, .. }
        | NetError::Accept(source)
        | NetError::Io(source) => io_error(context, source),
        NetError::Serial(err) => serial_error(context, err),
        NetError::Telegram(err) => telegram_error(context, err),
    }
}
