use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use dsmr_serial::SerialSettings;

/// Serial device the meter is usually attached to.
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";

/// Default TCP port clients connect to.
pub const DEFAULT_PORT: u16 = 8120;

/// Lowest port a server may listen on (`IPPORT_USERRESERVED`).
pub const MIN_PORT: u16 = 5000;

/// How often idle sessions re-check the shutdown flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long a write to a client may block before the client is dropped.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything needed to run a telegram server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Serial device path.
    pub device: PathBuf,
    /// Serial line speed and character format.
    pub serial: SerialSettings,
    /// Address to listen on.
    pub bind: IpAddr,
    /// TCP port to listen on.
    pub port: u16,
    /// Session wait granularity.
    pub poll_interval: Duration,
}

impl ServerConfig {
    /// The socket address the listener binds.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            serial: SerialSettings::default(),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsmr_serial::BaudRate;

    #[test]
    fn defaults_match_command_line_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.device, PathBuf::from("/dev/ttyUSB0"));
        assert_eq!(config.serial.baud_rate, BaudRate::B9600);
        assert_eq!(config.port, 8120);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8120");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn socket_addr_uses_bind_and_port() {
        let config = ServerConfig {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            ..ServerConfig::default()
        };
        assert_eq!(config.socket_addr(), "127.0.0.1:5000".parse().unwrap());
    }
}
