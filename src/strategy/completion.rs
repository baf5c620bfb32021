//! Zero-copy completion bookkeeping.
//!
//! Every successful `MSG_ZEROCOPY` send pins the message pages until the
//! kernel posts a notification on the socket error queue. The drainer keeps
//! the two counters in step so the message is never released with sends
//! still in flight.

use std::io;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::network::Transport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Successful zero-copy sends
    pub sends: u64,
    /// Sends covered by a completion
    pub acknowledged: u64,
    /// Acknowledged sends the kernel copied anyway
    pub copied: u64,
    /// Notifications read (one may cover many sends)
    pub notifications: u64,
}

#[derive(Debug, Default)]
pub struct CompletionDrainer {
    issued: u64,
    acked: u64,
    copied: u64,
    notifications: u64,
}

impl CompletionDrainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one successful zero-copy send.
    #[inline(always)]
    pub fn record_send(&mut self) {
        self.issued += 1;
    }

    #[inline(always)]
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Sends yang pages-nya mungkin masih di-pin kernel
    #[inline(always)]
    pub fn outstanding(&self) -> u64 {
        self.issued.saturating_sub(self.acked)
    }

    /// Consume every notification that is ready now. Never blocks.
    ///
    /// Returns the number of sends acknowledged by this call.
    pub fn drain<T: Transport + ?Sized>(&mut self, transport: &mut T) -> io::Result<u64> {
        let mut acked = 0;
        while let Some(completion) = transport.recv_completion()? {
            let count = completion.count();
            acked += count;
            self.notifications += 1;
            if completion.copied {
                self.copied += count;
            }
        }
        self.acked += acked;
        if acked > 0 {
            trace!(acked, outstanding = self.outstanding(), "drained completions");
        }
        Ok(acked)
    }

    /// Drain until nothing is outstanding or `timeout` runs out.
    ///
    /// Returns `true` if every send was acknowledged.
    pub fn drain_all<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        timeout: Duration,
        backoff: Duration,
    ) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            self.drain(transport)?;
            if self.outstanding() == 0 {
                return Ok(true);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            // poll() returns early on EINTR, on POLLHUP after a reset, or on a
            // socket error that is not a notification; back off before polling again
            let woken = transport.wait_completion(deadline - now)?;
            if !woken || self.drain(transport)? == 0 {
                std::thread::sleep(backoff.min(deadline.saturating_duration_since(Instant::now())));
            }
        }
    }

    pub fn stats(&self) -> DrainStats {
        DrainStats {
            sends: self.issued,
            acknowledged: self.acked,
            copied: self.copied,
            notifications: self.notifications,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::mock::MockTransport;
    use crate::network::{Completion, SendMode};
    use std::io::IoSlice;

    fn zerocopy_mock() -> MockTransport {
        let mut mock = MockTransport::new();
        mock.enable_zerocopy().unwrap();
        mock
    }

    fn send_zc(mock: &mut MockTransport, drainer: &mut CompletionDrainer) {
        let n = mock
            .send_vectored(&[IoSlice::new(b"payload")], SendMode::ZeroCopy)
            .unwrap();
        assert_eq!(n, 7);
        drainer.record_send();
    }

    #[test]
    fn test_drain_acknowledges_ready_sends() {
        let mut mock = zerocopy_mock();
        let mut drainer = CompletionDrainer::new();

        for _ in 0..5 {
            send_zc(&mut mock, &mut drainer);
        }
        assert_eq!(drainer.outstanding(), 5);

        assert_eq!(drainer.drain(&mut mock).unwrap(), 5);
        assert_eq!(drainer.outstanding(), 0);
        assert_eq!(drainer.drain(&mut mock).unwrap(), 0);
    }

    #[test]
    fn test_coalesced_notification_covers_range() {
        let mut mock = MockTransport::new();
        let mut drainer = CompletionDrainer::new();
        for _ in 0..10 {
            drainer.record_send();
        }
        mock.push_completion(Completion {
            lo: 0,
            hi: 6,
            copied: false,
        });
        mock.push_completion(Completion {
            lo: 7,
            hi: 9,
            copied: true,
        });

        assert_eq!(drainer.drain(&mut mock).unwrap(), 10);
        let stats = drainer.stats();
        assert_eq!(stats.notifications, 2);
        assert_eq!(stats.acknowledged, 10);
        assert_eq!(stats.copied, 3);
    }

    #[test]
    fn test_drain_all_waits_for_late_completions() {
        let mut mock = zerocopy_mock();
        mock.hold_completions = true;
        let mut drainer = CompletionDrainer::new();

        for _ in 0..3 {
            send_zc(&mut mock, &mut drainer);
        }
        // Nothing readable yet
        assert_eq!(drainer.drain(&mut mock).unwrap(), 0);

        let done = drainer
            .drain_all(&mut mock, Duration::from_secs(1), Duration::ZERO)
            .unwrap();
        assert!(done);
        assert_eq!(mock.unacked(), 0);
    }

    #[test]
    fn test_drain_all_gives_up_at_deadline() {
        let mut mock = MockTransport::new();
        let mut drainer = CompletionDrainer::new();
        // A send the transport will never acknowledge
        drainer.record_send();

        let start = Instant::now();
        let done = drainer
            .drain_all(&mut mock, Duration::from_millis(20), Duration::from_millis(1))
            .unwrap();
        assert!(!done);
        assert_eq!(drainer.outstanding(), 1);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_drain_all_backs_off_when_poll_returns_early() {
        // The mock's wait returns immediately, like poll() on a hung-up socket
        let mut mock = MockTransport::new();
        let mut drainer = CompletionDrainer::new();
        drainer.record_send();

        let done = drainer
            .drain_all(&mut mock, Duration::from_millis(30), Duration::from_millis(5))
            .unwrap();

        assert!(!done);
        assert!(mock.waits <= 10, "waits = {}", mock.waits);
    }
}
