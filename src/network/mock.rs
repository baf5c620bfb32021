//! In-memory transport for unit tests.
//!
//! Records every accepted byte and models the zero-copy side channel:
//! each zero-copy send queues one completion, and a send counts as
//! unacknowledged until the caller has read its completion.

use std::collections::VecDeque;
use std::io::{self, IoSlice};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::transport::{Completion, SendMode, Transport};

pub(crate) struct MockTransport {
    /// Everything the "kernel" accepted, in order
    pub wire: Vec<u8>,
    /// Accept at most this many bytes per call
    pub max_chunk: Option<usize>,
    /// Stop accepting once the wire holds this many bytes
    pub close_after: usize,
    /// What a send returns once closed: `None` = `Ok(0)`
    pub close_with: Option<io::ErrorKind>,
    /// Fail every k-th call with `EINTR`
    pub interrupt_every: Option<u64>,
    pub zerocopy_supported: bool,
    /// `ENOBUFS` while this many zero-copy sends are unacknowledged
    pub zerocopy_budget: Option<u64>,
    /// Completions only become readable after `wait_completion`
    pub hold_completions: bool,
    /// Zero-copy sends are never acknowledged, as with a peer that vanished
    /// while data sat in the retransmit queue
    pub lose_completions: bool,
    /// Bumped on drop
    pub drops: Option<Arc<AtomicUsize>>,

    pub calls: u64,
    pub interrupts: u64,
    pub enobufs: u64,
    pub zerocopy_sends: u64,
    pub acknowledged: u64,
    pub waits: u64,
    /// Highest unacknowledged count seen right after a zero-copy send
    pub max_unacked: u64,

    zerocopy_enabled: bool,
    next_id: u32,
    queued: VecDeque<Completion>,
    held: VecDeque<Completion>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            wire: Vec::new(),
            max_chunk: None,
            close_after: usize::MAX,
            close_with: None,
            interrupt_every: None,
            zerocopy_supported: true,
            zerocopy_budget: None,
            hold_completions: false,
            lose_completions: false,
            drops: None,
            calls: 0,
            interrupts: 0,
            enobufs: 0,
            zerocopy_sends: 0,
            acknowledged: 0,
            waits: 0,
            max_unacked: 0,
            zerocopy_enabled: false,
            next_id: 0,
            queued: VecDeque::new(),
            held: VecDeque::new(),
        }
    }

    /// Closes (per `close_with`) after `bytes` have been accepted
    pub fn closing_after(bytes: usize) -> Self {
        let mut mock = Self::new();
        mock.close_after = bytes;
        mock
    }

    pub fn unacked(&self) -> u64 {
        self.zerocopy_sends - self.acknowledged
    }

    /// Queue an arbitrary notification, e.g. a coalesced range
    pub fn push_completion(&mut self, completion: Completion) {
        self.queued.push_back(completion);
    }

    fn closed_result(&self) -> io::Result<usize> {
        match self.close_with {
            None => Ok(0),
            Some(kind) => Err(io::Error::new(kind, "mock peer gone")),
        }
    }

    /// Common prologue; `Some` short-circuits the call
    fn before_send(&mut self) -> Option<io::Result<usize>> {
        self.calls += 1;
        if self.wire.len() >= self.close_after {
            return Some(self.closed_result());
        }
        if let Some(k) = self.interrupt_every {
            if self.calls % k == 0 {
                self.interrupts += 1;
                return Some(Err(io::Error::from_raw_os_error(libc::EINTR)));
            }
        }
        None
    }

    fn room(&self) -> usize {
        let left = self.close_after - self.wire.len();
        self.max_chunk.map_or(left, |c| c.min(left))
    }
}

impl Transport for MockTransport {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(result) = self.before_send() {
            return result;
        }
        let n = buf.len().min(self.room());
        self.wire.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn send_vectored(&mut self, bufs: &[IoSlice<'_>], mode: SendMode) -> io::Result<usize> {
        if let Some(result) = self.before_send() {
            return result;
        }

        let zerocopy = mode == SendMode::ZeroCopy && self.zerocopy_enabled;
        if zerocopy {
            if let Some(budget) = self.zerocopy_budget {
                if self.unacked() >= budget {
                    self.enobufs += 1;
                    return Err(io::Error::from_raw_os_error(libc::ENOBUFS));
                }
            }
        }

        let mut room = self.room();
        let mut n = 0;
        for buf in bufs {
            let take = buf.len().min(room);
            self.wire.extend_from_slice(&buf[..take]);
            n += take;
            room -= take;
            if room == 0 {
                break;
            }
        }

        if zerocopy && n > 0 {
            let completion = Completion {
                lo: self.next_id,
                hi: self.next_id,
                copied: false,
            };
            self.next_id = self.next_id.wrapping_add(1);
            self.zerocopy_sends += 1;
            if !self.lose_completions {
                if self.hold_completions {
                    self.held.push_back(completion);
                } else {
                    self.queued.push_back(completion);
                }
            }
            self.max_unacked = self.max_unacked.max(self.unacked());
        }
        Ok(n)
    }

    fn enable_zerocopy(&mut self) -> io::Result<()> {
        if !self.zerocopy_supported {
            return Err(io::Error::from_raw_os_error(libc::ENOPROTOOPT));
        }
        self.zerocopy_enabled = true;
        Ok(())
    }

    fn recv_completion(&mut self) -> io::Result<Option<Completion>> {
        let completion = self.queued.pop_front();
        if let Some(c) = completion {
            self.acknowledged += c.count();
        }
        Ok(completion)
    }

    fn wait_completion(&mut self, _timeout: Duration) -> io::Result<bool> {
        self.waits += 1;
        self.queued.extend(self.held.drain(..));
        Ok(!self.queued.is_empty())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        if let Some(drops) = &self.drops {
            drops.fetch_add(1, Ordering::SeqCst);
        }
    }
}
