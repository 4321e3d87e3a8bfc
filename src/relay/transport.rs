use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread;

use crate::log::log_sink::LogSink;
use crate::relay::registry::Registry;
use crate::relay::session::Session;
use crate::relay::shutdown::ShutdownSignal;
use crate::relay::types::{ConnHandle, ConnId, Outbound, Outbox};
use crate::{sink_debug, sink_warn};

/// Spawn reader + writer threads for one accepted TcpStream.
///
/// The writer owns the socket's write half and drains the connection's
/// outbound queue, so concurrent broadcasts never interleave bytes. The reader
/// drives a [`Session`] until it terminates.
pub fn spawn_connection_threads(
    conn_id: ConnId,
    stream: TcpStream,
    registry: Arc<Registry>,
    shutdown: ShutdownSignal,
    log: Arc<dyn LogSink>,
) -> std::io::Result<()> {
    let (conn, outbox) = ConnHandle::for_stream(conn_id, &stream)?;

    let read_stream = stream.try_clone()?;
    let write_stream = stream;

    // WRITER THREAD: outbox -> socket
    {
        let log = Arc::clone(&log);
        thread::Builder::new()
            .name(format!("conn-{conn_id}-tx"))
            .spawn(move || write_loop(conn_id, write_stream, outbox, log.as_ref()))?;
    }

    // READER THREAD: socket -> session
    {
        let session = Session::new(conn, registry, shutdown, Arc::clone(&log));
        // On failure the closure is dropped with the session's handle, which
        // ends the writer as well.
        thread::Builder::new()
            .name(format!("conn-{conn_id}-rx"))
            .spawn(move || {
                let mut reader = BufReader::new(read_stream);
                session.run(&mut reader);
                sink_debug!(log, "conn {}: reader finished", conn_id);
            })?;
    }

    Ok(())
}

fn write_loop(conn_id: ConnId, mut stream: TcpStream, outbox: Outbox, log: &dyn LogSink) {
    while let Some(item) = outbox.recv() {
        match item {
            Outbound::Frame(bytes) => {
                if let Err(e) = stream.write_all(&bytes).and_then(|()| stream.flush()) {
                    sink_warn!(log, "conn {}: send failed: {}", conn_id, e);
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    // Also wakes the reader if it is still blocked on this socket.
    let _ = stream.shutdown(Shutdown::Both);
    sink_debug!(log, "conn {}: writer finished", conn_id);
}
