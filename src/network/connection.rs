//! Per-connection lifecycle
//!
//! ```text
//! CONNECTED ──> SENDING ──> PEER_CLOSED ──┐
//!     │            └──────> ERROR ────────┼──> CLOSED
//!     └───────────────────> ERROR ────────┘
//! ```
//!
//! Nothing leaves `CLOSED`. `close()` may be called from any state; from
//! `CONNECTED` or `SENDING` it passes through `ERROR` first. The transport is
//! dropped exactly once, on the first `close()` (or on drop if nobody closed
//! it).

use tracing::debug;

use super::transport::Transport;
use crate::error::{Result, TransferError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connected,
    Sending,
    PeerClosed,
    Error,
    Closed,
}

impl ConnState {
    pub fn can_transition(self, to: ConnState) -> bool {
        use ConnState::*;
        matches!(
            (self, to),
            (Connected, Sending)
                | (Connected, Error)
                | (Sending, PeerClosed)
                | (Sending, Error)
                | (PeerClosed, Closed)
                | (Error, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ConnState::Closed
    }
}

/// Owns one accepted socket for its whole life.
pub struct Connection<T: Transport> {
    id: usize,
    transport: Option<T>,
    state: ConnState,
}

impl<T: Transport> Connection<T> {
    pub fn new(id: usize, transport: T) -> Self {
        Self {
            id,
            transport: Some(transport),
            state: ConnState::Connected,
        }
    }

    #[inline(always)]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline(always)]
    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn transition(&mut self, to: ConnState) -> Result<()> {
        if !self.state.can_transition(to) {
            return Err(TransferError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!(conn = self.id, from = ?self.state, ?to, "state change");
        self.state = to;
        Ok(())
    }

    /// `None` once the connection is closed
    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    /// Release the socket.
    ///
    /// Returns the state the connection closed from (`PeerClosed` or
    /// `Error`), or `None` if it was already released.
    pub fn close(&mut self) -> Option<ConnState> {
        let transport = self.transport.take()?;
        if matches!(self.state, ConnState::Connected | ConnState::Sending) {
            // Closed mid-flight, e.g. a handler unwinding
            debug!(conn = self.id, from = ?self.state, "closing without an outcome");
            self.state = ConnState::Error;
        }
        let from = self.state;
        drop(transport);
        self.state = ConnState::Closed;
        debug!(conn = self.id, ?from, "closed");
        Some(from)
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.close();
    }
}
