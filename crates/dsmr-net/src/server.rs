use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use dsmr_channel::BroadcastChannel;
use dsmr_telegram::Telegram;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::listener::TelegramListener;
use crate::pump::{PumpReport, TelegramPump};

/// A running telegram server: one pump thread, one accept thread and a
/// thread per client, all sharing one channel.
#[derive(Debug)]
pub struct Server {
    channel: Arc<BroadcastChannel<Telegram>>,
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
    pump: TelegramPump,
    acceptor: JoinHandle<Result<()>>,
}

impl Server {
    /// Open the configured serial device and start serving.
    #[cfg(unix)]
    pub fn start(config: &ServerConfig) -> Result<Self> {
        let port = dsmr_serial::SerialPort::open(&config.device, config.serial)?;
        Self::start_with_source(port, config)
    }

    /// Serial devices are only supported on Unix.
    #[cfg(not(unix))]
    pub fn start(config: &ServerConfig) -> Result<Self> {
        Err(crate::error::NetError::Io(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!(
                "cannot open {}: serial devices require a Unix platform",
                config.device.display()
            ),
        )))
    }

    /// Serve telegrams read from an arbitrary byte source.
    pub fn start_with_source<R>(source: R, config: &ServerConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let listener =
            TelegramListener::bind(config.socket_addr())?.with_poll_interval(config.poll_interval);
        let local_addr = listener.local_addr();

        let channel = Arc::new(BroadcastChannel::new());
        let running = Arc::new(AtomicBool::new(true));

        let acceptor = {
            let channel = Arc::clone(&channel);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("dsmr-accept".to_string())
                .spawn(move || listener.serve(channel, running))?
        };
        let pump = TelegramPump::spawn(source, Arc::clone(&channel))?;

        info!(%local_addr, "telegram server started");
        Ok(Self {
            channel,
            running,
            local_addr,
            pump,
            acceptor,
        })
    }

    /// The address clients connect to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The shared telegram channel.
    pub fn channel(&self) -> &Arc<BroadcastChannel<Telegram>> {
        &self.channel
    }

    /// Flag that keeps the server running; clear it to request shutdown.
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Whether the telegram source has ended.
    pub fn is_source_finished(&self) -> bool {
        self.pump.is_finished()
    }

    /// Whether the accept thread is still taking clients. It stops when the
    /// running flag is cleared or the listener fails; [`Server::shutdown`]
    /// then reports the failure.
    pub fn is_accepting(&self) -> bool {
        !self.acceptor.is_finished()
    }

    /// Stop accepting clients, release every session and collect the pump
    /// outcome.
    ///
    /// A pump still blocked on its source is left to finish on its own; the
    /// report then carries the counters so far and no error.
    pub fn shutdown(self) -> Result<PumpReport> {
        self.running.store(false, Ordering::SeqCst);
        self.channel.close();

        let accept_result = match self.acceptor.join() {
            Ok(result) => result,
            Err(_) => {
                warn!("accept thread panicked");
                Ok(())
            }
        };

        let report = if self.pump.is_finished() {
            self.pump.join()
        } else {
            PumpReport {
                stats: self.pump.stats(),
                error: None,
            }
        };

        info!(stats = ?report.stats, "telegram server stopped");
        accept_result.map(|()| report)
    }
}
