//! Two-copy path: serialize into one flat buffer, then `send()` it.
//!
//! Copy 1 is `Message::serialize` (fields -> flat buffer, done once per
//! connection); copy 2 is the kernel copying the flat buffer into the
//! socket buffer on every send.

use std::io;

use tracing::debug;

use super::{Exit, SendReport};
use crate::core::Message;
use crate::error::Result;
use crate::network::Transport;

pub(super) fn send_loop<T: Transport + ?Sized>(
    transport: &mut T,
    message: &Message,
) -> Result<SendReport> {
    let flat = message.serialize()?;
    let mut report = SendReport::new(Exit::PeerClosed);

    report.exit = loop {
        match send_all(transport, &flat, &mut report.bytes) {
            Ok(true) => report.messages += 1,
            Ok(false) => break Exit::PeerClosed,
            Err(e) => break Exit::Error(e.into()),
        }
    };

    debug!(messages = report.messages, bytes = report.bytes, "two_copy done");
    Ok(report)
}

/// Send all of `buf`, retrying partial sends and `EINTR`.
///
/// `Ok(false)` if a send made no progress. Every accepted byte is added to
/// `bytes`, including those of an unfinished buffer.
fn send_all<T: Transport + ?Sized>(
    transport: &mut T,
    buf: &[u8],
    bytes: &mut u64,
) -> io::Result<bool> {
    let mut sent = 0;
    while sent < buf.len() {
        match transport.send(&buf[sent..]) {
            Ok(0) => return Ok(false),
            Ok(n) => {
                sent += n;
                *bytes += n as u64;
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldBacking;
    use crate::network::mock::MockTransport;

    #[test]
    fn test_flat_buffer_resent_until_close() {
        let message = Message::create(16, 4, FieldBacking::Heap).unwrap();
        let mut mock = MockTransport::closing_after(40);
        mock.max_chunk = Some(5);

        let report = send_loop(&mut mock, &message).unwrap();

        assert!(matches!(report.exit, Exit::PeerClosed));
        assert_eq!(report.messages, 2);
        assert_eq!(&mock.wire[..], b"AAAABBBBCCCCDDDDAAAABBBBCCCCDDDDAAAABBBB");
    }

    #[test]
    fn test_send_all_survives_partial_and_interrupted_sends() {
        let mut mock = MockTransport::new();
        mock.max_chunk = Some(3);
        mock.interrupt_every = Some(2);
        let mut bytes = 0;

        assert!(send_all(&mut mock, b"hello world", &mut bytes).unwrap());
        assert_eq!(bytes, 11);
        assert_eq!(mock.wire, b"hello world");
        assert!(mock.interrupts > 0);
    }

    #[test]
    fn test_send_all_reports_zero_progress() {
        let mut mock = MockTransport::closing_after(4);
        let mut bytes = 0;

        assert!(!send_all(&mut mock, b"abcdefgh", &mut bytes).unwrap());
        assert_eq!(bytes, 4);
    }

    #[test]
    fn test_never_uses_gathered_send() {
        let message = Message::create(64, 8, FieldBacking::Heap).unwrap();
        let mut mock = MockTransport::closing_after(64 * 4);
        mock.enable_zerocopy().unwrap();

        send_loop(&mut mock, &message).unwrap();
        assert_eq!(mock.zerocopy_sends, 0);
        // 4 full sends plus the one that saw the close
        assert_eq!(mock.calls, 5);
    }
}
