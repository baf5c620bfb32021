//! One-copy path: one `sendmsg()` with an iovec per field.
//!
//! No user-space copy; the kernel gathers the fields straight into the
//! socket buffer. A partial send resumes from the first unsent byte, which
//! may sit in the middle of a field.

use std::io::{self, IoSlice};

use tracing::debug;

use super::{Exit, SendReport};
use crate::core::Message;
use crate::error::Result;
use crate::network::{SendMode, Transport};

pub(super) fn send_loop<T: Transport + ?Sized>(
    transport: &mut T,
    message: &Message,
) -> Result<SendReport> {
    let base = message.io_slices();
    let total = message.total_len();
    // Partial sends advance a copy; `base` stays intact for the next message
    let mut scratch: Vec<IoSlice<'_>> = Vec::with_capacity(base.len());
    let mut report = SendReport::new(Exit::PeerClosed);

    report.exit = 'messages: loop {
        scratch.clear();
        scratch.extend_from_slice(&base);
        let mut pending: &mut [IoSlice<'_>] = &mut scratch;
        let mut left = total;

        while left > 0 {
            match transport.send_vectored(pending, SendMode::Copy) {
                Ok(0) => break 'messages Exit::PeerClosed,
                Ok(n) => {
                    left -= n;
                    report.bytes += n as u64;
                    IoSlice::advance_slices(&mut pending, n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break 'messages Exit::Error(e.into()),
            }
        }
        report.messages += 1;
    };

    debug!(messages = report.messages, bytes = report.bytes, "one_copy done");
    Ok(report)
}
