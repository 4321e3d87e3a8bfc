use std::io::Read;
use std::sync::Arc;

use crate::log::log_sink::LogSink;
use crate::relay::fanout::{broadcast, broadcast_to_members};
use crate::relay::protocol::{BYE_SHUTTING_DOWN, Frame, FrameError, MAX_NAME_LEN, MsgType, read_frame};
use crate::relay::registry::{Participant, Registry};
use crate::relay::shutdown::ShutdownSignal;
use crate::relay::types::{ConnHandle, ConnId};
use crate::{sink_debug, sink_info, sink_trace, sink_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Joined,
    Terminated,
}

/// Per-connection state machine.
///
/// Owns the connection's handle and the participant name once joined. Frames
/// are fed in arrival order through [`Session::handle_frame`]; every registry
/// change happens under the registry lock and every resulting broadcast
/// happens after it is released.
pub struct Session {
    conn: ConnHandle,
    state: SessionState,
    name: Option<String>,
    closed: bool,
    registry: Arc<Registry>,
    shutdown: ShutdownSignal,
    log: Arc<dyn LogSink>,
}

impl Session {
    pub fn new(
        conn: ConnHandle,
        registry: Arc<Registry>,
        shutdown: ShutdownSignal,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            conn,
            state: SessionState::Unjoined,
            name: None,
            closed: false,
            registry,
            shutdown,
            log,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn.id()
    }

    /// Reads and handles frames until the session terminates.
    ///
    /// A malformed frame ends the session quietly; a transport failure (or the
    /// peer closing) ends it as a departure, with LEFT sent to the others.
    pub fn run<R: Read>(mut self, reader: &mut R) {
        while self.state != SessionState::Terminated {
            match read_frame(reader) {
                Ok(frame) => {
                    self.handle_frame(frame);
                }
                Err(e) if e.is_protocol() => {
                    sink_warn!(self.log, "conn {}: bad frame: {}", self.conn.id(), e);
                    self.terminate();
                }
                Err(FrameError::Closed) => {
                    sink_debug!(self.log, "conn {}: peer closed", self.conn.id());
                    self.connection_lost();
                }
                Err(e) => {
                    sink_warn!(self.log, "conn {}: receive failed: {}", self.conn.id(), e);
                    self.connection_lost();
                }
            }
        }
    }

    /// Applies one frame and returns the resulting state.
    pub fn handle_frame(&mut self, frame: Frame) -> SessionState {
        sink_trace!(
            self.log,
            "conn {} ({:?}): {}",
            self.conn.id(),
            self.state,
            frame.msg_type.label()
        );

        match (self.state, frame.msg_type) {
            (SessionState::Terminated, _) => {}

            (SessionState::Unjoined, MsgType::Join) => self.on_join(frame.name.unwrap_or_default()),
            (SessionState::Joined, MsgType::Join) => {
                sink_debug!(self.log, "conn {}: already joined, JOIN ignored", self.conn.id());
            }

            (SessionState::Joined, MsgType::Note) => {
                if let Some(text) = frame.text {
                    self.on_note(&text);
                }
            }

            (SessionState::Joined, MsgType::Leave | MsgType::Shutdown) => self.on_leave(),
            (SessionState::Unjoined, MsgType::Leave | MsgType::Shutdown) => self.terminate(),

            (SessionState::Joined, MsgType::ShutdownAll) => self.on_shutdown_all(),
            (SessionState::Unjoined, MsgType::ShutdownAll) => {
                sink_debug!(
                    self.log,
                    "conn {}: SHUTDOWN_ALL before JOIN ignored",
                    self.conn.id()
                );
            }

            // NOTE before JOIN, server-side indications, unknown codes.
            _ => {}
        }
        self.state
    }

    fn on_join(&mut self, requested: String) {
        let name = clamp_name(requested);
        if name.is_empty() {
            sink_debug!(self.log, "conn {}: JOIN with empty name dropped", self.conn.id());
            return;
        }

        let Some(others) = self
            .registry
            .admit(Participant::new(name.clone(), self.conn.clone()))
        else {
            sink_info!(
                self.log,
                "conn {}: JOIN as {:?} dropped, name taken",
                self.conn.id(),
                name
            );
            return;
        };

        sink_info!(self.log, "{} joined on conn {}", name, self.conn.id());
        broadcast(&others, &Frame::joining(name.as_str()), self.log.as_ref());
        self.name = Some(name);
        self.state = SessionState::Joined;
    }

    fn on_note(&self, text: &str) {
        let Some(name) = self.name.as_deref() else {
            return;
        };
        let report = broadcast_to_members(
            &self.registry,
            Some(self.conn.id()),
            &Frame::deliver(name, text),
            self.log.as_ref(),
        );
        if report.failed > 0 {
            sink_info!(
                self.log,
                "NOTE from {} reached {} member(s), {} failed",
                name,
                report.delivered,
                report.failed
            );
        }
    }

    fn on_leave(&mut self) {
        self.depart();
        self.terminate();
    }

    fn on_shutdown_all(&mut self) {
        sink_info!(
            self.log,
            "{} requested SHUTDOWN_ALL",
            self.name.as_deref().unwrap_or("?")
        );
        // Everyone, this connection included. Queued before the flag is set so
        // the accept loop's farewell cannot drain members ahead of this BYE.
        broadcast_to_members(
            &self.registry,
            None,
            &Frame::bye(BYE_SHUTTING_DOWN),
            self.log.as_ref(),
        );
        self.terminate();
        self.shutdown.trigger();
    }

    /// Peer went away or the socket failed.
    pub fn connection_lost(&mut self) {
        self.depart();
        self.terminate();
    }

    /// Removes this participant and tells everyone else it left.
    fn depart(&mut self) {
        if self.state != SessionState::Joined {
            return;
        }
        if let Some((gone, others)) = self.registry.withdraw(self.conn.id()) {
            sink_info!(self.log, "{} left", gone.name);
            broadcast(&others, &Frame::left(gone.name), self.log.as_ref());
        }
    }

    /// Enters `Terminated`: silent registry removal if still present, then the
    /// connection is closed. Safe to call repeatedly.
    pub fn terminate(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if self.state == SessionState::Joined && self.registry.remove_by_connection(self.conn.id())
        {
            sink_debug!(
                self.log,
                "conn {}: removed {:?} without notice",
                self.conn.id(),
                self.name
            );
        }
        // The writer may already be gone; nothing left to close then.
        let _ = self.conn.close();
        self.state = SessionState::Terminated;
    }
}

/// Cuts a requested name to the registry's byte limit on a char boundary.
pub fn clamp_name(mut name: String) -> String {
    if name.len() > MAX_NAME_LEN {
        let mut cut = MAX_NAME_LEN;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    name
}
