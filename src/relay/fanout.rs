use crate::log::log_sink::LogSink;
use crate::relay::protocol::{Frame, encode_frame};
use crate::relay::registry::Registry;
use crate::relay::types::{ConnHandle, ConnId, SendError};
use crate::sink_warn;

/// Outcome of one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Sends `frame` to every handle in `targets`.
///
/// The frame is encoded once and the same buffer is queued to each target. A
/// target whose queue is gone, or full, is counted and skipped; a full one is
/// cut off, and its own session then departs on its next read.
pub fn broadcast(targets: &[ConnHandle], frame: &Frame, log: &dyn LogSink) -> FanoutReport {
    let mut report = FanoutReport::default();
    if targets.is_empty() {
        return report;
    }

    let bytes = match encode_frame(frame) {
        Ok(b) => b,
        Err(e) => {
            sink_warn!(log, "dropping {} broadcast: {}", frame.msg_type.label(), e);
            report.failed = targets.len();
            return report;
        }
    };

    for target in targets {
        match target.send_encoded(bytes.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e @ SendError::Overflow(_)) => {
                sink_warn!(log, "fan-out: {}", e);
                report.failed += 1;
            }
            // Already gone; its session reports the departure.
            Err(_) => report.failed += 1,
        }
    }
    report
}

/// Lock, copy, release, act: snapshot the registry (minus `excluding`), then
/// broadcast with no lock held.
pub fn broadcast_to_members(
    registry: &Registry,
    excluding: Option<ConnId>,
    frame: &Frame,
    log: &dyn LogSink,
) -> FanoutReport {
    let targets = registry.snapshot_connections(excluding);
    broadcast(&targets, frame, log)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::NoopLogSink;
    use crate::relay::protocol::read_frame;
    use crate::relay::registry::Participant;
    use crate::relay::types::{OutboxLimits, Outbound, Outbox};
    use std::io::Cursor;

    fn next_frame(rx: &Outbox) -> Frame {
        match rx.try_recv().expect("a queued frame") {
            Outbound::Frame(bytes) => read_frame(&mut Cursor::new(bytes.to_vec())).unwrap(),
            Outbound::Close => panic!("unexpected Close"),
        }
    }

    #[test]
    fn dead_target_does_not_stop_the_others() {
        let (a, rx_a) = ConnHandle::new(1);
        let (dead, rx_dead) = ConnHandle::new(2);
        let (c, rx_c) = ConnHandle::new(3);
        drop(rx_dead);

        let report = broadcast(&[a, dead, c], &Frame::left("bob"), &NoopLogSink);
        assert_eq!(report, FanoutReport { delivered: 2, failed: 1 });
        assert_eq!(next_frame(&rx_a), Frame::left("bob"));
        assert_eq!(next_frame(&rx_c), Frame::left("bob"));
    }

    #[test]
    fn members_broadcast_skips_the_excluded_connection() {
        let reg = Registry::new();
        let (a, rx_a) = ConnHandle::new(1);
        let (b, rx_b) = ConnHandle::new(2);
        reg.add(Participant::new("alice", a));
        reg.add(Participant::new("bob", b));

        let report = broadcast_to_members(&reg, Some(1), &Frame::deliver("alice", "hi"), &NoopLogSink);
        assert_eq!(report.delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(next_frame(&rx_b), Frame::deliver("alice", "hi"));
    }

    #[test]
    fn full_target_fails_alone_and_stays_cut_off() {
        let (a, rx_a) = ConnHandle::new(1);
        let (slow, rx_slow) = ConnHandle::with_limits(
            2,
            OutboxLimits {
                max_frames: 2,
                max_bytes: usize::MAX,
            },
        );
        let (c, rx_c) = ConnHandle::new(3);
        let targets = [a, slow.clone(), c];

        // Nobody drains `rx_slow`; two frames fill it.
        for text in ["one", "two"] {
            let report = broadcast(&targets, &Frame::deliver("bob", text), &NoopLogSink);
            assert_eq!(report, FanoutReport { delivered: 3, failed: 0 });
        }

        let report = broadcast(&targets, &Frame::deliver("bob", "three"), &NoopLogSink);
        assert_eq!(report, FanoutReport { delivered: 2, failed: 1 });
        assert!(slow.is_stalled());

        for rx in [&rx_a, &rx_c] {
            assert_eq!(next_frame(rx), Frame::deliver("bob", "one"));
            assert_eq!(next_frame(rx), Frame::deliver("bob", "two"));
            assert_eq!(next_frame(rx), Frame::deliver("bob", "three"));
        }

        // Even once drained, the slow target is not sent to again.
        assert_eq!(rx_slow.try_iter().count(), 2);
        let report = broadcast(&targets, &Frame::left("bob"), &NoopLogSink);
        assert_eq!(report, FanoutReport { delivered: 2, failed: 1 });
    }

    #[test]
    fn nobody_to_tell_is_a_no_op() {
        let report = broadcast(&[], &Frame::joining("alice"), &NoopLogSink);
        assert_eq!(report, FanoutReport::default());
    }
}
