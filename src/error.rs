//! Error taxonomy shared by server and client.
//!
//! Only [`TransferError::Argument`] ever becomes a process-level failure;
//! everything else is contained to the connection or client thread that
//! produced it.

use std::io;

use crate::network::ConnState;

pub type Result<T, E = TransferError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("failed to allocate {requested} bytes for message buffers")]
    Allocation { requested: usize },

    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    #[error("invalid connection transition {from:?} -> {to:?}")]
    InvalidTransition { from: ConnState, to: ConnState },
}

impl TransferError {
    /// True for failures that are scoped to a single connection.
    pub fn is_connection_scoped(&self) -> bool {
        !matches!(self, TransferError::Argument(_))
    }
}
