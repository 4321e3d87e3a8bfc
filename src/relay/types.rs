use std::io;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};

use bytes::Bytes;
use thiserror::Error;

use crate::relay::protocol::{Frame, ProtoError, encode_frame};

/// Identifier of one accepted TCP connection, unique for the server's lifetime.
pub type ConnId = u64;

/// Frames a connection may have queued before it is considered stalled.
pub const OUTBOX_MAX_FRAMES: usize = 1024;

/// Encoded bytes a connection may have queued before it is considered stalled.
/// Larger than one maximum-size frame.
pub const OUTBOX_MAX_BYTES: usize = 64 << 20;

/// What a connection's writer thread receives.
#[derive(Debug)]
pub enum Outbound {
    /// An already encoded frame, prefix included.
    Frame(Bytes),
    /// Write nothing more; shut the socket down once earlier items are written.
    Close,
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection {0} is closed")]
    Closed(ConnId),

    #[error("connection {0} is not keeping up and was dropped")]
    Overflow(ConnId),

    #[error("cannot encode frame: {0}")]
    Encode(#[from] ProtoError),
}

/// Bounds on one connection's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboxLimits {
    pub max_frames: usize,
    pub max_bytes: usize,
}

impl Default for OutboxLimits {
    fn default() -> Self {
        Self {
            max_frames: OUTBOX_MAX_FRAMES,
            max_bytes: OUTBOX_MAX_BYTES,
        }
    }
}

#[derive(Debug)]
struct Shared {
    queued_bytes: AtomicUsize,
    stalled: AtomicBool,
    max_bytes: usize,
    /// Only used to shut a stalled connection down; never read or written.
    socket: Option<TcpStream>,
}

impl Shared {
    fn release(&self, len: usize) {
        self.queued_bytes.fetch_sub(len, Ordering::SeqCst);
    }
}

/// Opaque, cloneable handle to one connection.
///
/// Holds the sending side of the connection's bounded outbound queue. Sending
/// only enqueues, so it is safe from any thread and never blocks on the
/// network. A connection whose queue is full is treated as stalled: its socket
/// is shut down, which ends its session as a departure, and every later send
/// fails with [`SendError::Overflow`].
#[derive(Debug, Clone)]
pub struct ConnHandle {
    id: ConnId,
    outbox: SyncSender<Outbound>,
    shared: Arc<Shared>,
}

impl ConnHandle {
    /// Creates a handle with default limits and no socket attached.
    pub fn new(id: ConnId) -> (Self, Outbox) {
        Self::with_limits(id, OutboxLimits::default())
    }

    pub fn with_limits(id: ConnId, limits: OutboxLimits) -> (Self, Outbox) {
        Self::build(id, limits, None)
    }

    /// Creates a handle for an accepted stream. A clone of the stream is kept
    /// so the handle can cut off a peer that stops reading.
    pub fn for_stream(id: ConnId, stream: &TcpStream) -> io::Result<(Self, Outbox)> {
        Ok(Self::build(id, OutboxLimits::default(), Some(stream.try_clone()?)))
    }

    fn build(id: ConnId, limits: OutboxLimits, socket: Option<TcpStream>) -> (Self, Outbox) {
        let (outbox, rx) = mpsc::sync_channel(limits.max_frames.max(1));
        let shared = Arc::new(Shared {
            queued_bytes: AtomicUsize::new(0),
            stalled: AtomicBool::new(false),
            max_bytes: limits.max_bytes,
            socket,
        });
        (
            Self {
                id,
                outbox,
                shared: Arc::clone(&shared),
            },
            Outbox { rx, shared },
        )
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn is_stalled(&self) -> bool {
        self.shared.stalled.load(Ordering::SeqCst)
    }

    pub fn send_encoded(&self, bytes: Bytes) -> Result<(), SendError> {
        if self.is_stalled() {
            return Err(SendError::Overflow(self.id));
        }

        let len = bytes.len();
        let queued = self.shared.queued_bytes.fetch_add(len, Ordering::SeqCst) + len;
        if queued > self.shared.max_bytes {
            self.shared.release(len);
            return Err(self.cut_off());
        }

        match self.outbox.try_send(Outbound::Frame(bytes)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.shared.release(len);
                Err(self.cut_off())
            }
            Err(TrySendError::Disconnected(_)) => {
                self.shared.release(len);
                Err(SendError::Closed(self.id))
            }
        }
    }

    pub fn send(&self, frame: &Frame) -> Result<(), SendError> {
        self.send_encoded(encode_frame(frame)?)
    }

    /// Asks the writer to finish what is queued and close the socket. If the
    /// queue is full the socket is shut down at once instead.
    pub fn close(&self) -> Result<(), SendError> {
        match self.outbox.try_send(Outbound::Close) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.cut_off();
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(SendError::Closed(self.id)),
        }
    }

    fn cut_off(&self) -> SendError {
        self.shared.stalled.store(true, Ordering::SeqCst);
        if let Some(socket) = &self.shared.socket {
            // Unblocks the writer and makes the reader see the connection end.
            let _ = socket.shutdown(Shutdown::Both);
        }
        SendError::Overflow(self.id)
    }
}

impl PartialEq for ConnHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnHandle {}

/// Receiving end of a connection's queue, drained by its writer thread.
#[derive(Debug)]
pub struct Outbox {
    rx: Receiver<Outbound>,
    shared: Arc<Shared>,
}

impl Outbox {
    /// Blocks for the next item; `None` once every handle is gone.
    pub fn recv(&self) -> Option<Outbound> {
        self.rx.recv().ok().map(|item| self.dequeued(item))
    }

    pub fn try_recv(&self) -> Result<Outbound, TryRecvError> {
        self.rx.try_recv().map(|item| self.dequeued(item))
    }

    /// Everything queued right now, without blocking.
    pub fn try_iter(&self) -> impl Iterator<Item = Outbound> + '_ {
        self.rx.try_iter().map(|item| self.dequeued(item))
    }

    /// Bytes currently queued and not yet taken by the writer.
    pub fn queued_bytes(&self) -> usize {
        self.shared.queued_bytes.load(Ordering::SeqCst)
    }

    fn dequeued(&self, item: Outbound) -> Outbound {
        if let Outbound::Frame(bytes) = &item {
            self.shared.release(bytes.len());
        }
        item
    }
}
