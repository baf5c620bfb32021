//! copybench - TCP copy-path benchmark
//!
//! Send paths:
//! - Two-Copy: flatten fields, then `send()` copies into the socket buffer
//! - One-Copy: `sendmsg()` gathers the fields straight from their buffers
//! - Zero-Copy: `sendmsg(MSG_ZEROCOPY)`, buffers pinned until the kernel
//!   reports completion on the error queue
//!
//! The server side ([`network::Server`]) dispatches one handler thread per
//! connection; the client side ([`client::ClientHarness`]) measures what
//! arrives.

pub mod client;
pub mod core;
pub mod error;
pub mod logging;
pub mod network;
pub mod report;
pub mod strategy;

pub use error::{Result, TransferError};
