//! Per-connection handler: build the message, run the strategy, tear down.

use std::io;
use std::net::SocketAddr;

use tracing::{error, info, warn};

use super::connection::{ConnState, Connection};
use super::server::ServerConfig;
use super::transport::{is_disconnect, Transport};
use crate::core::Message;
use crate::error::TransferError;
use crate::strategy::{DrainStats, Exit};

/// What happened on one accepted connection
#[derive(Debug)]
pub struct HandlerReport {
    pub id: usize,
    pub peer: Option<SocketAddr>,
    /// `PeerClosed` or `Error`; the connection itself always ends `Closed`
    pub outcome: ConnState,
    pub messages: u64,
    pub bytes: u64,
    pub exhaustion_retries: u64,
    pub zerocopy: Option<DrainStats>,
    /// Zero-copy sends still unacknowledged at teardown
    pub pinned_sends: u64,
    /// `false` when the message was leaked to keep pinned pages valid
    pub message_freed: bool,
    pub error: Option<TransferError>,
}

impl HandlerReport {
    fn new(id: usize, peer: Option<SocketAddr>) -> Self {
        Self {
            id,
            peer,
            outcome: ConnState::Error,
            messages: 0,
            bytes: 0,
            exhaustion_retries: 0,
            zerocopy: None,
            pinned_sends: 0,
            message_freed: false,
            error: None,
        }
    }

    pub(crate) fn failed(id: usize, peer: Option<SocketAddr>, err: TransferError) -> Self {
        Self {
            error: Some(err),
            ..Self::new(id, peer)
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome == ConnState::Error
    }
}

/// Serve one connection to completion.
///
/// The message is created here, owned by this call, and destroyed before the
/// socket is released. If the kernel never acknowledged some zero-copy sends
/// the message is leaked instead of destroyed.
pub fn handle_connection<T: Transport>(
    id: usize,
    transport: T,
    peer: Option<SocketAddr>,
    config: &ServerConfig,
) -> HandlerReport {
    let mut conn = Connection::new(id, transport);

    let message = match Message::create(
        config.message_size,
        config.transfer.field_count,
        config.backing,
    ) {
        Ok(message) => message,
        Err(e) => {
            error!(conn = id, error = %e, "message allocation failed");
            let _ = conn.transition(ConnState::Error);
            conn.close();
            return HandlerReport::failed(id, peer, e);
        }
    };

    let mut report = HandlerReport::new(id, peer);

    let result = match conn.transition(ConnState::Sending) {
        Ok(()) => match conn.transport_mut() {
            Some(transport) => config
                .strategy
                .send_loop(transport, &message, &config.transfer),
            None => Err(io::Error::from(io::ErrorKind::NotConnected).into()),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(send) => {
            report.outcome = send.exit.state();
            report.messages = send.messages;
            report.bytes = send.bytes;
            report.exhaustion_retries = send.exhaustion_retries;
            report.zerocopy = send.zerocopy;
            report.pinned_sends = send.pinned;
            match send.exit {
                Exit::PeerClosed => {
                    info!(conn = id, messages = report.messages, "peer closed");
                }
                Exit::Error(e) => {
                    if matches!(&e, TransferError::Connection(io) if is_disconnect(io)) {
                        info!(conn = id, messages = report.messages, error = %e, "peer disconnected");
                    } else {
                        warn!(conn = id, messages = report.messages, error = %e, "send loop failed");
                    }
                    report.error = Some(e);
                }
            }
        }
        Err(e) => {
            error!(conn = id, error = %e, "send loop did not start");
            report.outcome = ConnState::Error;
            report.error = Some(e);
        }
    }

    if let Err(e) = conn.transition(report.outcome) {
        warn!(conn = id, error = %e, "unexpected state");
    }
    if report.pinned_sends > 0 {
        error!(
            conn = id,
            pinned = report.pinned_sends,
            bytes = message.total_len(),
            "zero-copy sends never acknowledged, leaking message buffers"
        );
        message.leak();
    } else {
        message.destroy();
        report.message_freed = true;
    }
    conn.close();

    report
}
