#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use byteorder::{BigEndian, WriteBytesExt};
use noterelay::relay::protocol::{Frame, FrameError, MsgType, read_frame, write_frame};
use noterelay::relay::{Registry, RelayServer, ShutdownSignal};

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    registry: Arc<Registry>,
    shutdown: ShutdownSignal,
    thread: Option<JoinHandle<std::io::Result<()>>>,
}

impl TestServer {
    fn start() -> Self {
        let server = RelayServer::bind_no_log("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        let registry = server.registry();
        let shutdown = server.shutdown_signal();
        let thread = Some(thread::spawn(move || server.run()));
        Self {
            addr,
            registry,
            shutdown,
            thread,
        }
    }

    fn connect(&self) -> TcpStream {
        let s = TcpStream::connect(self.addr).unwrap();
        s.set_read_timeout(Some(WAIT)).unwrap();
        s
    }

    /// Connects and joins as `name`, returning once the server has admitted it.
    fn join(&self, name: &str) -> TcpStream {
        let mut s = self.connect();
        write_frame(&mut s, &Frame::join(name)).unwrap();
        self.wait_for(|r| r.find_by_name(name).is_some());
        s
    }

    fn wait_for(&self, cond: impl Fn(&Registry) -> bool) {
        let deadline = Instant::now() + WAIT;
        while !cond(&self.registry) {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn wait_stopped(&mut self) {
        let handle = self.thread.take().unwrap();
        let deadline = Instant::now() + WAIT;
        while !handle.is_finished() {
            assert!(Instant::now() < deadline, "server did not stop");
            thread::sleep(Duration::from_millis(10));
        }
        handle.join().unwrap().unwrap();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

fn expect(s: &mut TcpStream, want: Frame) {
    assert_eq!(read_frame(s).unwrap(), want);
}

fn expect_closed(s: &mut TcpStream) {
    assert!(matches!(read_frame(s), Err(FrameError::Closed)));
}

#[test]
fn duplicate_name_is_dropped_and_first_owner_kept() {
    let server = TestServer::start();
    let mut alice = server.join("alice");

    let mut impostor = server.connect();
    write_frame(&mut impostor, &Frame::join("alice")).unwrap();
    // Frames on one connection are handled in order, so once this name shows
    // up the duplicate JOIN has already been dropped.
    write_frame(&mut impostor, &Frame::join("alice2")).unwrap();
    server.wait_for(|r| r.find_by_name("alice2").is_some());

    expect(&mut alice, Frame::joining("alice2"));
    assert_eq!(server.registry.len(), 2);

    // The first alice still owns the name.
    write_frame(&mut impostor, &Frame::note("who am i")).unwrap();
    expect(&mut alice, Frame::deliver("alice2", "who am i"));
}

#[test]
fn note_reaches_others_but_not_sender() {
    let server = TestServer::start();
    let mut alice = server.join("alice");
    let mut bob = server.join("bob");
    let mut carol = server.join("carol");
    expect(&mut alice, Frame::joining("bob"));
    expect(&mut alice, Frame::joining("carol"));
    expect(&mut bob, Frame::joining("carol"));

    write_frame(&mut alice, &Frame::note("hi")).unwrap();
    expect(&mut bob, Frame::deliver("alice", "hi"));
    expect(&mut carol, Frame::deliver("alice", "hi"));

    // Had alice been sent her own note, it would be queued ahead of this reply.
    write_frame(&mut bob, &Frame::note("ack")).unwrap();
    expect(&mut alice, Frame::deliver("bob", "ack"));
}

#[test]
fn leave_announces_and_closes() {
    let server = TestServer::start();
    let mut alice = server.join("alice");
    let mut bob = server.join("bob");
    expect(&mut alice, Frame::joining("bob"));

    write_frame(&mut alice, &Frame::leave()).unwrap();
    expect(&mut bob, Frame::left("alice"));
    expect_closed(&mut alice);
    server.wait_for(|r| r.find_by_name("alice").is_none());

    // The name is free again.
    let _alice_again = server.join("alice");
    expect(&mut bob, Frame::joining("alice"));
}

#[test]
fn dropped_connection_counts_as_leaving() {
    let server = TestServer::start();
    let alice = server.join("alice");
    let mut bob = server.join("bob");

    drop(alice);
    expect(&mut bob, Frame::left("alice"));
    server.wait_for(|r| r.len() == 1);
}

#[test]
fn malformed_frame_drops_only_that_connection_silently() {
    let server = TestServer::start();
    let mut alice = server.join("alice");
    let mut bob = server.join("bob");
    expect(&mut alice, Frame::joining("bob"));

    // Body length below the fixed header size. Only the prefix is sent so the
    // server has nothing unread when it closes.
    let mut junk = Vec::new();
    junk.write_u32::<BigEndian>(3).unwrap();
    alice.write_all(&junk).unwrap();

    expect_closed(&mut alice);
    server.wait_for(|r| r.find_by_name("alice").is_none());

    // Bob was told nothing about alice; the next thing he sees is carol.
    let _carol = server.join("carol");
    expect(&mut bob, Frame::joining("carol"));
}

#[test]
fn unjoined_connections_cannot_note_or_stop_the_server() {
    let server = TestServer::start();
    let mut bob = server.join("bob");
    let mut lurker = server.connect();

    write_frame(&mut lurker, &Frame::note("psst")).unwrap();
    write_frame(&mut lurker, &Frame::shutdown_all()).unwrap();
    write_frame(&mut lurker, &Frame::join("lurker")).unwrap();
    server.wait_for(|r| r.find_by_name("lurker").is_some());

    expect(&mut bob, Frame::joining("lurker"));
    assert!(!server.shutdown.is_triggered());
}

#[test]
fn shutdown_all_says_bye_and_stops_accepting() {
    let mut server = TestServer::start();
    let mut alice = server.join("alice");
    let mut bob = server.join("bob");
    expect(&mut alice, Frame::joining("bob"));

    write_frame(&mut alice, &Frame::shutdown_all()).unwrap();

    expect(&mut alice, Frame::bye("Server shutting down"));
    expect_closed(&mut alice);

    expect(&mut bob, Frame::bye("Server shutting down"));
    expect(&mut bob, Frame::bye("Server exiting"));
    expect_closed(&mut bob);

    server.wait_stopped();
    assert!(server.registry.is_empty());
    assert!(TcpStream::connect(server.addr).is_err());
}

#[test]
fn operator_shutdown_says_bye_to_members() {
    let mut server = TestServer::start();
    let mut alice = server.join("alice");

    server.shutdown.trigger();
    expect(&mut alice, Frame::bye("Server exiting"));
    expect_closed(&mut alice);
    server.wait_stopped();
}

#[test]
fn non_utf8_note_is_relayed_with_replacement() {
    let server = TestServer::start();
    let mut alice = server.join("alice");
    let mut bob = server.join("bob");
    expect(&mut alice, Frame::joining("bob"));

    // NOTE whose text is Latin-1, not UTF-8.
    let text = b"caf\xe9!";
    let mut raw = Vec::new();
    raw.write_u32::<BigEndian>(12 + text.len() as u32).unwrap();
    raw.write_u32::<BigEndian>(MsgType::Note.as_u32()).unwrap();
    raw.write_u32::<BigEndian>(0).unwrap();
    raw.write_u32::<BigEndian>(text.len() as u32).unwrap();
    raw.extend_from_slice(text);
    bob.write_all(&raw).unwrap();

    expect(&mut alice, Frame::deliver("bob", "caf\u{FFFD}!"));
    assert!(server.registry.find_by_name("bob").is_some());

    write_frame(&mut bob, &Frame::note("still here")).unwrap();
    expect(&mut alice, Frame::deliver("bob", "still here"));
}

#[test]
fn stalled_reader_is_cut_off_without_hurting_others() {
    const NOTES: usize = 40;

    let server = TestServer::start();
    // Joins and then never reads.
    let _stalled = server.join("stalled");
    let mut bob = server.join("bob");
    let mut alice = server.join("alice");
    expect(&mut bob, Frame::joining("alice"));

    let (progress_tx, progress) = std::sync::mpsc::channel();
    let reader = thread::spawn(move || {
        let (mut delivered, mut saw_left) = (0, false);
        while delivered < NOTES || !saw_left {
            let f = read_frame(&mut bob).unwrap();
            match f.msg_type {
                MsgType::Deliver => {
                    delivered += 1;
                    let _ = progress_tx.send(delivered);
                }
                MsgType::Left => {
                    assert_eq!(f, Frame::left("stalled"));
                    saw_left = true;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        delivered
    });

    // 160 MiB in total, well past one connection's outbound budget. Bob is
    // kept at most a few notes behind so only the stalled peer overflows.
    let big = "x".repeat(4 << 20);
    for i in 0..NOTES {
        if i >= 4 {
            progress.recv_timeout(WAIT).unwrap();
        }
        write_frame(&mut alice, &Frame::note(big.as_str())).unwrap();
    }

    server.wait_for(|r| r.find_by_name("stalled").is_none());
    assert_eq!(reader.join().unwrap(), NOTES);
    assert!(server.registry.find_by_name("alice").is_some());
    assert!(server.registry.find_by_name("bob").is_some());
}
