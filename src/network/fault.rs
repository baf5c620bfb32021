//! Fault injection for the zero-copy backpressure path.
//!
//! Wraps a transport and fails every N-th zero-copy gathered send with
//! `ENOBUFS`, as if the kernel's pinned-buffer budget were exhausted.

use std::io::{self, IoSlice};
use std::time::Duration;

use super::transport::{Completion, SendMode, Transport};

pub struct FaultInjector<T> {
    inner: T,
    every: u64,
    attempts: u64,
    injected: u64,
}

impl<T: Transport> FaultInjector<T> {
    /// # Panics
    /// Panics if `every` is zero.
    pub fn new(inner: T, every: u64) -> Self {
        assert!(every > 0, "fault interval must be > 0");
        Self {
            inner,
            every,
            attempts: 0,
            injected: 0,
        }
    }

    /// Jumlah `ENOBUFS` yang sudah di-inject
    pub fn injected(&self) -> u64 {
        self.injected
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Transport> Transport for FaultInjector<T> {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.send(buf)
    }

    fn send_vectored(&mut self, bufs: &[IoSlice<'_>], mode: SendMode) -> io::Result<usize> {
        if mode == SendMode::ZeroCopy {
            self.attempts += 1;
            if self.attempts % self.every == 0 {
                self.injected += 1;
                return Err(io::Error::from_raw_os_error(libc::ENOBUFS));
            }
        }
        self.inner.send_vectored(bufs, mode)
    }

    fn enable_zerocopy(&mut self) -> io::Result<()> {
        self.inner.enable_zerocopy()
    }

    fn recv_completion(&mut self) -> io::Result<Option<Completion>> {
        self.inner.recv_completion()
    }

    fn wait_completion(&mut self, timeout: Duration) -> io::Result<bool> {
        self.inner.wait_completion(timeout)
    }
}
