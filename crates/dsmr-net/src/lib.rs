//! TCP fan-out of validated DSMR P1 telegrams.
//!
//! A [`TelegramPump`] reads a byte source (normally the serial port),
//! publishes every valid telegram into a shared
//! [`BroadcastChannel`](dsmr_channel::BroadcastChannel), and each TCP client
//! gets its own [`ClientSession`] thread that forwards whatever is published
//! next. [`Server`] wires the pieces together; [`connect`] is the client side.

pub mod config;
pub mod connector;
pub mod error;
pub mod listener;
pub mod pump;
pub mod server;
pub mod session;

pub use config::{
    ServerConfig, DEFAULT_DEVICE, DEFAULT_POLL_INTERVAL, DEFAULT_PORT, DEFAULT_WRITE_TIMEOUT,
    MIN_PORT,
};
pub use connector::{connect, connect_with_timeout};
pub use error::{NetError, Result};
pub use listener::TelegramListener;
pub use pump::{PumpReport, PumpStats, TelegramPump, PUMP_THREAD_NAME};
pub use server::Server;
pub use session::{ClientSession, SessionEnd, SessionSummary};
