use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dsmr_channel::BroadcastChannel;
use dsmr_telegram::Telegram;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_POLL_INTERVAL;
use crate::error::{NetError, Result};
use crate::session::ClientSession;

/// Pause between accept attempts while serving with no pending connection.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Pause after an accept failure that only costs one connection or signals
/// descriptor exhaustion.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(500);

/// What the accept loop does with a failed [`TelegramListener::accept`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptDisposition {
    /// No pending connection.
    Idle,
    /// Try again immediately.
    Retry,
    /// Log, pause, keep listening.
    Backoff,
    /// The listener itself is broken.
    Fatal,
}

fn classify_accept_error(err: &NetError) -> AcceptDisposition {
    match err {
        NetError::Accept(io) => match io.kind() {
            ErrorKind::WouldBlock => AcceptDisposition::Idle,
            ErrorKind::Interrupted | ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset => {
                AcceptDisposition::Retry
            }
            ErrorKind::OutOfMemory => AcceptDisposition::Backoff,
            _ if is_resource_exhaustion(io) => AcceptDisposition::Backoff,
            _ => AcceptDisposition::Fatal,
        },
        // Preparing one accepted socket failed; only that client is lost.
        NetError::Io(_) => AcceptDisposition::Backoff,
        _ => AcceptDisposition::Fatal,
    }
}

#[cfg(unix)]
fn is_resource_exhaustion(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
    )
}

#[cfg(not(unix))]
fn is_resource_exhaustion(_err: &io::Error) -> bool {
    false
}

/// Listens for and accepts telegram clients.
#[derive(Debug)]
pub struct TelegramListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    poll_interval: Duration,
    next_client_id: AtomicU64,
}

impl TelegramListener {
    /// Bind to a TCP address. Port 0 picks a free port.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| NetError::Bind { addr, source: e })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "listening for telegram clients");
        Ok(Self {
            listener,
            local_addr,
            poll_interval: DEFAULT_POLL_INTERVAL,
            next_client_id: AtomicU64::new(1),
        })
    }

    /// Poll interval handed to every accepted session.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept the next connection and assign an auto-generated client id.
    pub fn accept(&self) -> Result<ClientSession> {
        let (stream, peer) = self.listener.accept().map_err(NetError::Accept)?;
        // Accepted sockets may inherit non-blocking mode from the listener.
        stream.set_nonblocking(false)?;
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let session =
            ClientSession::new(format!("client-{id}"), stream).with_poll_interval(self.poll_interval);
        info!(client = session.id(), %peer, "client connected");
        Ok(session)
    }

    /// Accept clients and run each in its own thread until `running` is
    /// cleared.
    ///
    /// Failures tied to a single connection, or to running out of file
    /// descriptors, are logged and retried after a pause. Only an error that
    /// breaks the listener itself is returned.
    ///
    /// Session threads are detached; they end on their own once `running`
    /// is cleared or the channel is closed.
    pub fn serve(
        &self,
        channel: Arc<BroadcastChannel<Telegram>>,
        running: Arc<AtomicBool>,
    ) -> Result<()> {
        self.listener.set_nonblocking(true)?;
        let result = self.accept_loop(&channel, &running);
        self.listener.set_nonblocking(false)?;
        result
    }

    fn accept_loop(
        &self,
        channel: &Arc<BroadcastChannel<Telegram>>,
        running: &Arc<AtomicBool>,
    ) -> Result<()> {
        while running.load(Ordering::SeqCst) {
            let session = match self.accept() {
                Ok(session) => session,
                Err(err) => match classify_accept_error(&err) {
                    AcceptDisposition::Idle => {
                        thread::sleep(ACCEPT_POLL);
                        continue;
                    }
                    AcceptDisposition::Retry => {
                        debug!(error = %err, "transient accept failure");
                        continue;
                    }
                    AcceptDisposition::Backoff => {
                        warn!(error = %err, "accept failed; backing off");
                        thread::sleep(ACCEPT_BACKOFF);
                        continue;
                    }
                    AcceptDisposition::Fatal => {
                        warn!(addr = %self.local_addr, error = %err, "listener failed");
                        return Err(err);
                    }
                },
            };

            let channel = Arc::clone(channel);
            let running = Arc::clone(running);
            let name = session.id().to_string();
            if let Err(err) = thread::Builder::new()
                .name(name)
                .spawn(move || session.run(&channel, &running))
            {
                warn!(error = %err, "failed to start client session");
            }
        }

        info!(addr = %self.local_addr, "stopped accepting clients");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::TcpStream;
    use std::time::Instant;

    use super::*;

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn bind_reports_actual_port() {
        let listener = TelegramListener::bind(localhost()).expect("listener should bind");
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[test]
    fn bind_conflict_is_reported() {
        let first = TelegramListener::bind(localhost()).expect("listener should bind");
        let addr = first.local_addr();
        let err = TelegramListener::bind(addr).unwrap_err();
        assert!(matches!(err, NetError::Bind { addr: a, .. } if a == addr));
    }

    #[test]
    fn accepts_sequential_clients_with_ids() {
        let listener = TelegramListener::bind(localhost()).expect("listener should bind");
        let addr = listener.local_addr();

        let server = thread::spawn(move || {
            let first = listener.accept().expect("first accept should succeed");
            let second = listener.accept().expect("second accept should succeed");
            assert_eq!(first.id(), "client-1");
            assert_eq!(second.id(), "client-2");
            assert!(first.peer_addr().is_some());
        });

        let _c1 = TcpStream::connect(addr).expect("first client should connect");
        let _c2 = TcpStream::connect(addr).expect("second client should connect");
        server.join().expect("server thread should finish");
    }

    #[test]
    fn serve_fans_out_and_stops() {
        let listener = Arc::new(
            TelegramListener::bind(localhost())
                .expect("listener should bind")
                .with_poll_interval(Duration::from_millis(20)),
        );
        let addr = listener.local_addr();
        let channel = Arc::new(BroadcastChannel::new());
        let running = Arc::new(AtomicBool::new(true));

        let server = {
            let listener = Arc::clone(&listener);
            let channel = Arc::clone(&channel);
            let running = Arc::clone(&running);
            thread::spawn(move || listener.serve(channel, running))
        };

        let mut clients: Vec<TcpStream> = (0..3)
            .map(|_| TcpStream::connect(addr).expect("client should connect"))
            .collect();

        let deadline = Instant::now() + Duration::from_secs(5);
        while channel.waiting() < 3 {
            assert!(Instant::now() < deadline, "sessions did not start");
            thread::sleep(Duration::from_millis(1));
        }

        let telegram = dsmr_telegram::validate(b"/ABC5\r\ndata\r\n!E86D\r\n").unwrap();
        channel.publish(telegram);

        for client in &mut clients {
            let mut received = [0u8; 20];
            client.read_exact(&mut received).unwrap();
            assert_eq!(&received, b"/ABC5\r\ndata\r\n!E86D\r\n");
        }

        running.store(false, Ordering::SeqCst);
        server.join().unwrap().expect("serve should stop cleanly");
    }

    #[test]
    fn per_connection_accept_failures_keep_listening() {
        let would_block = NetError::Accept(io::Error::from(ErrorKind::WouldBlock));
        assert_eq!(classify_accept_error(&would_block), AcceptDisposition::Idle);

        let aborted = NetError::Accept(io::Error::from(ErrorKind::ConnectionAborted));
        assert_eq!(classify_accept_error(&aborted), AcceptDisposition::Retry);

        let socket_setup = NetError::Io(io::Error::other("set_nonblocking failed"));
        assert_eq!(
            classify_accept_error(&socket_setup),
            AcceptDisposition::Backoff
        );
    }

    #[cfg(unix)]
    #[test]
    fn descriptor_exhaustion_backs_off_but_invalid_listener_is_fatal() {
        for errno in [libc::EMFILE, libc::ENFILE] {
            let err = NetError::Accept(io::Error::from_raw_os_error(errno));
            assert_eq!(classify_accept_error(&err), AcceptDisposition::Backoff);
        }
        for errno in [libc::EINVAL, libc::EBADF] {
            let err = NetError::Accept(io::Error::from_raw_os_error(errno));
            assert_eq!(classify_accept_error(&err), AcceptDisposition::Fatal);
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn serve_returns_when_listener_breaks() {
        use std::os::fd::AsRawFd;

        let listener = TelegramListener::bind(localhost()).expect("listener should bind");
        // Shutting down a listening socket makes every later accept fail
        // with EINVAL on Linux.
        let rc = unsafe { libc::shutdown(listener.listener.as_raw_fd(), libc::SHUT_RD) };
        assert_eq!(rc, 0);

        let channel = Arc::new(BroadcastChannel::new());
        let running = Arc::new(AtomicBool::new(true));
        let server = {
            let running = Arc::clone(&running);
            thread::spawn(move || listener.serve(channel, running))
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while !server.is_finished() {
            assert!(Instant::now() < deadline, "accept loop kept running");
            thread::sleep(Duration::from_millis(10));
        }
        assert!(running.load(Ordering::SeqCst));
        let err = server.join().unwrap().unwrap_err();
        assert!(matches!(err, NetError::Accept(_)));
    }
}
