use std::io::BufReader;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use crate::log::log_sink::LogSink;
use crate::log::NoopLogSink;
use crate::relay::protocol::{Frame, FrameError, MsgType, read_frame, write_frame};
use crate::relay_client::notice::render_notice;
use crate::relay_client::relay_client_error::RelayClientError;
use crate::{sink_debug, sink_info, sink_warn};

/// What the receiver thread reports back to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A displayable line (DELIVER, JOINING, LEFT).
    Notice(String),
    /// The server said goodbye; the text is the rendered notice.
    Bye(String),
    /// The connection is gone (server closed it, or it failed).
    Closed,
}

struct Link {
    stream: TcpStream,
    alive: Arc<AtomicBool>,
}

/// Blocking client for the relay.
///
/// Commands write directly on the calling thread; a background receiver
/// thread per connection turns incoming frames into [`ClientEvent`]s.
pub struct RelayClient {
    display_name: String,
    link: Option<Link>,
    events_tx: Sender<ClientEvent>,
    log: Arc<dyn LogSink>,
}

impl RelayClient {
    pub fn new(display_name: impl Into<String>, log: Arc<dyn LogSink>) -> (Self, Receiver<ClientEvent>) {
        let (events_tx, events_rx) = mpsc::channel();
        (
            Self {
                display_name: display_name.into(),
                link: None,
                events_tx,
                log,
            },
            events_rx,
        )
    }

    /// Convenience: client with a `NoopLogSink`.
    pub fn new_no_log(display_name: impl Into<String>) -> (Self, Receiver<ClientEvent>) {
        Self::new(display_name, Arc::new(NoopLogSink))
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_connected(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|l| l.alive.load(Ordering::SeqCst))
    }

    /// Connects to `addr` and sends JOIN with the display name.
    pub fn join<A: ToSocketAddrs>(&mut self, addr: A) -> Result<(), RelayClientError> {
        if self.is_connected() {
            return Err(RelayClientError::AlreadyConnected);
        }
        self.link = None;

        let mut stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let reader = stream.try_clone()?;
        let alive = Arc::new(AtomicBool::new(true));

        {
            let alive = Arc::clone(&alive);
            let events_tx = self.events_tx.clone();
            let log = Arc::clone(&self.log);
            thread::Builder::new()
                .name("relay-client-rx".into())
                .spawn(move || receive_loop(reader, &events_tx, &alive, log.as_ref()))?;
        }

        write_frame(&mut stream, &Frame::join(self.display_name.as_str()))?;
        sink_info!(self.log, "joined {:?} as {}", stream.peer_addr().ok(), self.display_name);
        self.link = Some(Link { stream, alive });
        Ok(())
    }

    pub fn note(&mut self, text: &str) -> Result<(), RelayClientError> {
        self.send(&Frame::note(text))
    }

    /// Sends LEAVE and disconnects.
    pub fn leave(&mut self) -> Result<(), RelayClientError> {
        self.send_and_disconnect(&Frame::leave())
    }

    /// Sends SHUTDOWN and disconnects; the caller is expected to exit.
    pub fn shutdown(&mut self) -> Result<(), RelayClientError> {
        self.send_and_disconnect(&Frame::shutdown())
    }

    /// Asks the server to stop. The BYE (and the close after it) arrive as
    /// events.
    pub fn shutdown_all(&mut self) -> Result<(), RelayClientError> {
        self.send(&Frame::shutdown_all())
    }

    /// Drops the connection without telling the server.
    pub fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            let _ = link.stream.shutdown(Shutdown::Both);
        }
    }

    fn send(&mut self, frame: &Frame) -> Result<(), RelayClientError> {
        if !self.is_connected() {
            return Err(RelayClientError::NotConnected);
        }
        let Some(link) = self.link.as_mut() else {
            return Err(RelayClientError::NotConnected);
        };
        if let Err(e) = write_frame(&mut link.stream, frame) {
            sink_warn!(self.log, "send {} failed: {}", frame.msg_type.label(), e);
            self.disconnect();
            return Err(e.into());
        }
        Ok(())
    }

    fn send_and_disconnect(&mut self, frame: &Frame) -> Result<(), RelayClientError> {
        let sent = self.send(frame);
        self.disconnect();
        sent
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn receive_loop(stream: TcpStream, events: &Sender<ClientEvent>, alive: &AtomicBool, log: &dyn LogSink) {
    let mut reader = BufReader::new(stream);
    loop {
        match read_frame(&mut reader) {
            Ok(frame) => {
                let Some(line) = render_notice(&frame) else {
                    sink_warn!(log, "unexpected {} from server", frame.msg_type.label());
                    continue;
                };
                let event = if frame.msg_type == MsgType::Bye {
                    ClientEvent::Bye(line)
                } else {
                    ClientEvent::Notice(line)
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            Err(FrameError::Closed) => {
                sink_debug!(log, "server closed the connection");
                break;
            }
            Err(e) => {
                sink_warn!(log, "receive failed: {}", e);
                break;
            }
        }
    }
    alive.store(false, Ordering::SeqCst);
    let _ = events.send(ClientEvent::Closed);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::net::TcpListener;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn listener() -> (TcpListener, String) {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = l.local_addr().unwrap().to_string();
        (l, addr)
    }

    #[test]
    fn commands_before_join_fail() {
        let (mut client, _rx) = RelayClient::new_no_log("alice");
        assert!(matches!(client.note("hi"), Err(RelayClientError::NotConnected)));
        assert!(matches!(client.leave(), Err(RelayClientError::NotConnected)));
        assert!(!client.is_connected());
    }

    #[test]
    fn join_sends_join_frame_and_receives_notices() {
        let (server, addr) = listener();
        let (mut client, rx) = RelayClient::new_no_log("alice");
        client.join(&addr).unwrap();

        let (mut peer, _) = server.accept().unwrap();
        peer.set_read_timeout(Some(WAIT)).unwrap();
        assert_eq!(read_frame(&mut peer).unwrap(), Frame::join("alice"));

        client.note("hello").unwrap();
        assert_eq!(read_frame(&mut peer).unwrap(), Frame::note("hello"));

        write_frame(&mut peer, &Frame::deliver("bob", "hey")).unwrap();
        write_frame(&mut peer, &Frame::joining("carol")).unwrap();
        write_frame(&mut peer, &Frame::bye("Server exiting")).unwrap();
        drop(peer);

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ClientEvent::Notice("bob: hey".into()));
        assert_eq!(
            rx.recv_timeout(WAIT).unwrap(),
            ClientEvent::Notice("[info] carol joined".into())
        );
        assert_eq!(
            rx.recv_timeout(WAIT).unwrap(),
            ClientEvent::Bye("[server] Server exiting".into())
        );
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ClientEvent::Closed);
        assert!(!client.is_connected());
    }

    #[test]
    fn second_join_while_connected_is_refused() {
        let (server, addr) = listener();
        let (mut client, _rx) = RelayClient::new_no_log("alice");
        client.join(&addr).unwrap();
        let _peer = server.accept().unwrap();
        assert!(matches!(client.join(&addr), Err(RelayClientError::AlreadyConnected)));
    }

    #[test]
    fn leave_sends_leave_then_closes() {
        let (server, addr) = listener();
        let (mut client, rx) = RelayClient::new_no_log("alice");
        client.join(&addr).unwrap();
        let (mut peer, _) = server.accept().unwrap();
        peer.set_read_timeout(Some(WAIT)).unwrap();

        client.leave().unwrap();
        assert_eq!(read_frame(&mut peer).unwrap(), Frame::join("alice"));
        assert_eq!(read_frame(&mut peer).unwrap(), Frame::leave());
        assert!(matches!(read_frame(&mut peer), Err(FrameError::Closed)));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ClientEvent::Closed);
        assert!(!client.is_connected());
    }
}
