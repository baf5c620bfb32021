//! Transport seam between the send strategies and the kernel.
//!
//! The three strategies only ever talk to a [`Transport`]: a plain send, a
//! gathered send (optionally zero-copy) and the completion side channel.

use std::io::{self, IoSlice};
use std::time::Duration;

/// How a gathered send should treat the caller's buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Kernel copies the bytes into the socket buffer before returning
    Copy,
    /// Kernel pins the pages and reports completion asynchronously
    ZeroCopy,
}

/// One zero-copy completion notification.
///
/// Acknowledges the inclusive range `lo..=hi` of zero-copy send ids. The
/// kernel numbers successful zero-copy sends from 0 and may coalesce
/// consecutive ids into one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub lo: u32,
    pub hi: u32,
    /// Kernel fell back to copying for this range
    pub copied: bool,
}

impl Completion {
    /// Number of sends acknowledged by this notification
    #[inline(always)]
    pub fn count(&self) -> u64 {
        self.hi.wrapping_sub(self.lo) as u64 + 1
    }
}

pub trait Transport {
    /// Single send of a contiguous buffer. May be partial.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Single gathered send over `bufs`. May be partial.
    fn send_vectored(&mut self, bufs: &[IoSlice<'_>], mode: SendMode) -> io::Result<usize>;

    /// Opt the socket into zero-copy sends.
    fn enable_zerocopy(&mut self) -> io::Result<()>;

    /// Read one queued completion without blocking; `None` if the side
    /// channel is empty.
    fn recv_completion(&mut self) -> io::Result<Option<Completion>>;

    /// Block up to `timeout` for the side channel to become readable.
    fn wait_completion(&mut self, timeout: Duration) -> io::Result<bool>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).send(buf)
    }

    fn send_vectored(&mut self, bufs: &[IoSlice<'_>], mode: SendMode) -> io::Result<usize> {
        (**self).send_vectored(bufs, mode)
    }

    fn enable_zerocopy(&mut self) -> io::Result<()> {
        (**self).enable_zerocopy()
    }

    fn recv_completion(&mut self) -> io::Result<Option<Completion>> {
        (**self).recv_completion()
    }

    fn wait_completion(&mut self, timeout: Duration) -> io::Result<bool> {
        (**self).wait_completion(timeout)
    }
}

/// `ENOBUFS`: too many zero-copy buffers pinned
#[inline]
pub fn is_exhaustion(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENOBUFS)
}

/// Peer went away mid-stream (reset or broken pipe)
#[inline]
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}
