//! Serve DSMR P1 smart-meter telegrams over TCP.
//!
//! A meter writes telegrams to a serial line; this server validates each one
//! (CRC-16) and hands every valid telegram to all connected TCP clients.
//!
//! # Crate Structure
//!
//! - [`telegram`]: telegram validation and the streaming reader
//! - [`channel`]: latest-value broadcast channel
//! - [`serial`]: raw serial device access (behind `net` feature)
//! - [`net`]: reader pump, TCP listener and client sessions (behind `net` feature)

/// Re-export telegram types.
pub mod telegram {
    pub use dsmr_telegram::*;
}

/// Re-export channel types.
pub mod channel {
    pub use dsmr_channel::*;
}

/// Re-export serial types (requires `net` feature).
#[cfg(feature = "net")]
pub mod serial {
    pub use dsmr_serial::*;
}

/// Re-export server types (requires `net` feature).
#[cfg(feature = "net")]
pub mod net {
    pub use dsmr_net::*;
}
