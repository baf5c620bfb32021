//! Client harness: parallel receivers that time what the server sends
//!
//! Each thread owns one connection and one [`ClientResult`]; the harness
//! only reads those results after joining the threads.

mod harness;
mod recv;
mod result;

pub use harness::{ClientConfig, ClientHarness, HarnessRun};
pub use recv::recv_all;
pub use result::{AggregateResult, ClientExit, ClientResult};
