//! Accept loop: one handler thread per connection.
//!
//! The listener accepts until `max_clients` handlers have been started,
//! then stops accepting and waits for every handler to finish.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{error, info, warn};

use super::fault::FaultInjector;
use super::handler::{handle_connection, HandlerReport};
use super::socket::TcpTransport;
use crate::core::{FieldBacking, MessageLayout, TransferConfig};
use crate::error::{Result, TransferError};
use crate::strategy::Strategy;

/// Pause after a failed accept() before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Requested message size; the effective size is a multiple of the
    /// field count
    pub message_size: usize,
    /// Handlers to start before the listener stops accepting
    pub max_clients: usize,
    pub strategy: Strategy,
    pub backing: FieldBacking,
    /// Fail every N-th zero-copy send with ENOBUFS
    pub inject_enobufs_every: Option<u64>,
    pub bind_ip: IpAddr,
    pub transfer: TransferConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            message_size: 4096,
            max_clients: 1,
            strategy: Strategy::default(),
            backing: FieldBacking::default(),
            inject_enobufs_every: None,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            transfer: TransferConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.message_size == 0 {
            return Err(TransferError::Argument("message_size must be > 0".into()));
        }
        if self.max_clients == 0 {
            return Err(TransferError::Argument("max_clients must be > 0".into()));
        }
        if self.inject_enobufs_every == Some(0) {
            return Err(TransferError::Argument(
                "inject_enobufs_every must be > 0".into(),
            ));
        }
        self.transfer.validate()
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.transfer.port)
    }

    /// Layout every handler's message will have
    pub fn layout(&self) -> MessageLayout {
        MessageLayout::new(self.message_size, self.transfer.field_count)
    }
}

/// Per-handler reports, in connection order
#[derive(Debug, Default)]
pub struct ServeSummary {
    pub reports: Vec<HandlerReport>,
}

impl ServeSummary {
    pub fn total_bytes(&self) -> u64 {
        self.reports.iter().map(|r| r.bytes).sum()
    }

    pub fn total_messages(&self) -> u64 {
        self.reports.iter().map(|r| r.messages).sum()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.is_error()).count()
    }
}

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
}

impl Server {
    /// Validate `config` and start listening.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let addr = config.bind_addr();

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(config.transfer.backlog)?;
        let listener: TcpListener = socket.into();

        info!(
            addr = %listener.local_addr()?,
            strategy = %config.strategy,
            message_size = config.message_size,
            max_clients = config.max_clients,
            "listening"
        );
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Accept `max_clients` connections, serve each on its own thread and
    /// wait for all of them.
    pub fn run(self) -> Result<ServeSummary> {
        let Server { listener, config } = self;
        let config = Arc::new(config);
        let mut handles = Vec::with_capacity(config.max_clients);
        let mut next_id = 0usize;

        while handles.len() < config.max_clients {
            let (stream, peer) = match listener.accept() {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    thread::sleep(ACCEPT_RETRY_DELAY);
                    continue;
                }
            };
            let id = next_id;
            next_id += 1;
            info!(conn = id, %peer, "accepted");

            let cfg = Arc::clone(&config);
            let spawned = thread::Builder::new()
                .name(format!("conn-{id}"))
                .spawn(move || serve_stream(id, stream, peer, &cfg));
            match spawned {
                Ok(handle) => handles.push(handle),
                // The closure (and the stream in it) is dropped: socket closed
                Err(e) => error!(conn = id, error = %e, "failed to spawn handler"),
            }
        }
        drop(listener);

        let mut summary = ServeSummary::default();
        for handle in handles {
            match handle.join() {
                Ok(report) => summary.reports.push(report),
                Err(_) => error!("handler thread panicked"),
            }
        }

        info!(
            connections = summary.reports.len(),
            failed = summary.failed(),
            bytes = summary.total_bytes(),
            "all handlers finished"
        );
        Ok(summary)
    }
}

fn serve_stream(
    id: usize,
    stream: TcpStream,
    peer: SocketAddr,
    config: &ServerConfig,
) -> HandlerReport {
    let transport = match TcpTransport::new(stream) {
        Ok(transport) => transport,
        Err(e) => {
            warn!(conn = id, error = %e, "socket setup failed");
            return HandlerReport::failed(id, Some(peer), e.into());
        }
    };

    match config.inject_enobufs_every {
        Some(every) => handle_connection(
            id,
            FaultInjector::new(transport, every),
            Some(peer),
            config,
        ),
        None => handle_connection(id, transport, Some(peer), config),
    }
}
