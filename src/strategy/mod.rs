//! Send strategies: how a message's bytes get from user memory to the socket
//!
//! | Strategy  | user copy      | user → kernel                 |
//! |-----------|----------------|-------------------------------|
//! | TwoCopy   | serialize once | `send()` copies the flat buf  |
//! | OneCopy   | none           | `sendmsg()` gathers fields    |
//! | ZeroCopy  | none           | `sendmsg(MSG_ZEROCOPY)`, DMA  |
//!
//! Every strategy runs until the peer stops accepting bytes or a hard error
//! occurs; the wire image is identical for all three.

mod completion;
mod one_copy;
mod two_copy;
mod zero_copy;

use std::fmt;

use crate::core::{Message, TransferConfig};
use crate::error::{Result, TransferError};
use crate::network::{ConnState, Transport};

pub use completion::{CompletionDrainer, DrainStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum Strategy {
    #[default]
    #[value(name = "two_copy", alias = "two-copy")]
    TwoCopy,
    #[value(name = "one_copy", alias = "one-copy")]
    OneCopy,
    #[value(name = "zero_copy", alias = "zero-copy")]
    ZeroCopy,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::TwoCopy, Strategy::OneCopy, Strategy::ZeroCopy];

    /// Name used in `RESULT` lines
    pub fn name(self) -> &'static str {
        match self {
            Strategy::TwoCopy => "two_copy",
            Strategy::OneCopy => "one_copy",
            Strategy::ZeroCopy => "zero_copy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Push `message` through `transport` until the connection ends.
    ///
    /// `Err` only for failures before the first send (e.g. the two-copy
    /// buffer could not be allocated); how the loop ended is in the report.
    pub fn send_loop<T: Transport + ?Sized>(
        self,
        transport: &mut T,
        message: &Message,
        config: &TransferConfig,
    ) -> Result<SendReport> {
        match self {
            Strategy::TwoCopy => two_copy::send_loop(transport, message),
            Strategy::OneCopy => one_copy::send_loop(transport, message),
            Strategy::ZeroCopy => zero_copy::send_loop(transport, message, config),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a send loop stopped
#[derive(Debug)]
pub enum Exit {
    /// A send made no progress
    PeerClosed,
    Error(TransferError),
}

impl Exit {
    /// Connection state this exit leads to
    pub fn state(&self) -> ConnState {
        match self {
            Exit::PeerClosed => ConnState::PeerClosed,
            Exit::Error(_) => ConnState::Error,
        }
    }
}

/// Outcome of one `send_loop`
#[derive(Debug)]
pub struct SendReport {
    pub exit: Exit,
    /// Complete messages handed to the kernel
    pub messages: u64,
    /// Bytes accepted by the kernel, partial messages included
    pub bytes: u64,
    /// ENOBUFS retries (zero-copy only)
    pub exhaustion_retries: u64,
    /// `None` unless zero-copy was actually in effect
    pub zerocopy: Option<DrainStats>,
    /// Zero-copy sends never acknowledged. While nonzero the kernel may
    /// still read the message pages, so they must not be freed.
    pub pinned: u64,
}

impl SendReport {
    fn new(exit: Exit) -> Self {
        Self {
            exit,
            messages: 0,
            bytes: 0,
            exhaustion_retries: 0,
            zerocopy: None,
            pinned: 0,
        }
    }
}
