use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::log::log_sink::LogSink;
use crate::log::NoopLogSink;
use crate::relay::protocol::{BYE_EXITING, Frame};
use crate::relay::registry::Registry;
use crate::relay::shutdown::ShutdownSignal;
use crate::relay::transport::spawn_connection_threads;
use crate::relay::types::ConnId;
use crate::{sink_debug, sink_info, sink_warn};

/// How often the accept loop looks at the shutdown flag while idle.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Top-level runtime object for the relay.
///
/// This owns:
/// - the bound listener
/// - the participant registry shared by every session
/// - the shutdown flag
/// and knows how to accept connections and hand each one its own threads.
pub struct RelayServer {
    listener: TcpListener,
    registry: Arc<Registry>,
    shutdown: ShutdownSignal,
    log: Arc<dyn LogSink>,
    next_conn_id: ConnId,
}

impl RelayServer {
    /// Bind `addr`. Port 0 picks a free port; see [`RelayServer::local_addr`].
    pub fn bind<A: ToSocketAddrs>(addr: A, log: Arc<dyn LogSink>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        // Polled so the loop can notice the shutdown flag between accepts.
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            registry: Arc::new(Registry::new()),
            shutdown: ShutdownSignal::new(),
            log,
            next_conn_id: 1,
        })
    }

    /// Convenience: bind with a `NoopLogSink`.
    pub fn bind_no_log<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        Self::bind(addr, Arc::new(NoopLogSink))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle that stops [`RelayServer::run`] when triggered.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Blocking main loop: accept until shutdown is requested, then say BYE to
    /// whoever is still joined and close their connections.
    ///
    /// Accept failures are logged and the loop keeps going.
    pub fn run(mut self) -> io::Result<()> {
        let addr = self.listener.local_addr()?;
        sink_info!(self.log, "relay listening on {}", addr);

        while !self.shutdown.is_triggered() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let conn_id = self.next_conn_id;
                    self.next_conn_id += 1;
                    sink_info!(self.log, "accepted {} as conn {}", peer, conn_id);

                    // Accepted sockets may inherit non-blocking mode.
                    if let Err(e) = stream.set_nonblocking(false) {
                        sink_warn!(self.log, "conn {}: cannot make blocking: {}", conn_id, e);
                        continue;
                    }
                    if let Err(e) = spawn_connection_threads(
                        conn_id,
                        stream,
                        Arc::clone(&self.registry),
                        self.shutdown.clone(),
                        Arc::clone(&self.log),
                    ) {
                        sink_warn!(
                            self.log,
                            "failed to spawn connection threads for conn {}: {}",
                            conn_id,
                            e
                        );
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    sink_warn!(self.log, "accept failed: {} (continuing to accept)", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        sink_info!(self.log, "shutdown requested, no longer accepting");
        self.farewell();
        Ok(())
    }

    /// Empties the registry, sending each remaining member BYE then Close.
    fn farewell(&self) {
        let remaining = self.registry.drain();
        if remaining.is_empty() {
            return;
        }
        sink_info!(self.log, "closing {} remaining connection(s)", remaining.len());

        let bye = Frame::bye(BYE_EXITING);
        for member in remaining {
            if member.conn.send(&bye).is_err() || member.conn.close().is_err() {
                sink_debug!(self.log, "{} was already gone", member.name);
            }
        }
    }
}
