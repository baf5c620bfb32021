//! Zero-copy path: `sendmsg(MSG_ZEROCOPY)` straight from the field buffers.
//!
//! The kernel pins the pages and acknowledges each send later on the
//! socket error queue. Acknowledgements are drained every `drain_batch`
//! sends and whenever the kernel reports `ENOBUFS`. `ENOBUFS` never ends the
//! loop: past `exhaustion_spin_limit` retries in a row the loop blocks on the
//! error queue instead of sleeping.
//!
//! Whatever is still outstanding is drained before the message goes back.
//! Sends that stay unacknowledged are reported as `pinned`, and the caller
//! must not free the message while that count is nonzero.

use std::io::{self, IoSlice};
use std::thread;

use tracing::{debug, warn};

use super::completion::CompletionDrainer;
use super::{Exit, SendReport};
use crate::core::{Message, TransferConfig};
use crate::error::Result;
use crate::network::{is_exhaustion, SendMode, Transport};

pub(super) fn send_loop<T: Transport + ?Sized>(
    transport: &mut T,
    message: &Message,
    config: &TransferConfig,
) -> Result<SendReport> {
    let mode = match transport.enable_zerocopy() {
        Ok(()) => SendMode::ZeroCopy,
        Err(e) => {
            warn!(error = %e, "SO_ZEROCOPY unavailable, falling back to copying sends");
            SendMode::Copy
        }
    };
    let zerocopy = mode == SendMode::ZeroCopy;

    let base = message.io_slices();
    let total = message.total_len();
    let mut scratch: Vec<IoSlice<'_>> = Vec::with_capacity(base.len());
    let mut drainer = CompletionDrainer::new();
    let mut report = SendReport::new(Exit::PeerClosed);
    let mut consecutive: u32 = 0;

    report.exit = 'messages: loop {
        scratch.clear();
        scratch.extend_from_slice(&base);
        let mut pending: &mut [IoSlice<'_>] = &mut scratch;
        let mut left = total;

        while left > 0 {
            match transport.send_vectored(pending, mode) {
                Ok(0) => break 'messages Exit::PeerClosed,
                Ok(n) => {
                    consecutive = 0;
                    left -= n;
                    report.bytes += n as u64;
                    IoSlice::advance_slices(&mut pending, n);

                    if zerocopy {
                        drainer.record_send();
                        if drainer.issued() % config.drain_batch == 0 {
                            if let Err(e) = drainer.drain(transport) {
                                break 'messages Exit::Error(e.into());
                            }
                        }
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if zerocopy && is_exhaustion(e) => {
                    consecutive = consecutive.saturating_add(1);
                    report.exhaustion_retries += 1;

                    // Slow peer: stop spinning, sleep in poll() until the
                    // kernel posts a completion
                    let woken = if consecutive >= config.exhaustion_spin_limit {
                        if consecutive == config.exhaustion_spin_limit {
                            debug!(
                                outstanding = drainer.outstanding(),
                                "ENOBUFS persists, blocking on completions"
                            );
                        }
                        match transport.wait_completion(config.exhaustion_wait) {
                            Ok(ready) => ready,
                            Err(e) => break 'messages Exit::Error(e.into()),
                        }
                    } else {
                        false
                    };

                    // Unpin what we can, then retry the same bytes
                    if let Err(e) = drainer.drain(transport) {
                        break 'messages Exit::Error(e.into());
                    }
                    if !woken && !config.exhaustion_backoff.is_zero() {
                        thread::sleep(config.exhaustion_backoff);
                    }
                }
                Err(e) => break 'messages Exit::Error(e.into()),
            }
        }
        report.messages += 1;
    };

    if zerocopy {
        match drainer.drain_all(
            transport,
            config.final_drain_timeout,
            config.exhaustion_backoff,
        ) {
            Ok(true) => {}
            Ok(false) => warn!(
                outstanding = drainer.outstanding(),
                "completions still outstanding after final drain"
            ),
            Err(e) => warn!(
                error = %e,
                outstanding = drainer.outstanding(),
                "final completion drain failed"
            ),
        }
        report.pinned = drainer.outstanding();
        report.zerocopy = Some(drainer.stats());
    }

    debug!(
        messages = report.messages,
        bytes = report.bytes,
        retries = report.exhaustion_retries,
        zerocopy,
        "zero_copy done"
    );
    Ok(report)
}
