//! Serial device access for DSMR P1 ports.
//!
//! The P1 port is a one-way serial line: the meter transmits, we only read.
//! This crate opens the device, switches it to raw mode at the requested
//! speed and character format, and hands back a blocking [`SerialPort`]
//! that implements `std::io::Read`.

pub mod baud;
pub mod error;

#[cfg(unix)]
pub mod port;

pub use baud::{BaudRate, CharacterFormat, SerialSettings};
pub use error::{Result, SerialError};

#[cfg(unix)]
pub use port::SerialPort;
