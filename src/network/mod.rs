//! Network layer: sockets, connection lifecycle and the accept loop
//!
//! - [`Transport`] is the only thing the send strategies see
//! - [`TcpTransport`] drives the raw `send`/`sendmsg`/error-queue calls
//! - [`Server`] accepts and hands each socket to its own handler thread

mod connection;
mod fault;
mod handler;
#[cfg(test)]
pub(crate) mod mock;
mod server;
mod socket;
mod transport;

pub use connection::{ConnState, Connection};
pub use fault::FaultInjector;
pub use handler::{handle_connection, HandlerReport};
pub use server::{ServeSummary, Server, ServerConfig};
pub use socket::TcpTransport;
pub use transport::{is_disconnect, is_exhaustion, Completion, SendMode, Transport};
