//! N concurrent receive loops against one server.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::recv::recv_all;
use super::result::{AggregateResult, ClientExit, ClientResult};
use crate::core::config::DEFAULT_DURATION;
use crate::core::{pattern_byte, MessageLayout, TransferConfig};
use crate::error::{Result, TransferError};
use crate::strategy::Strategy;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host`, `ip` or `ip:port`; the port defaults to `transfer.port`
    pub server: String,
    /// Requested size; reads use the effective size
    pub message_size: usize,
    pub threads: usize,
    pub duration: Duration,
    /// Label for the result line; the server decides the actual path
    pub strategy: Strategy,
    /// Check every received byte against the field pattern
    pub verify_payload: bool,
    pub transfer: TransferConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1".into(),
            message_size: 4096,
            threads: 1,
            duration: DEFAULT_DURATION,
            strategy: Strategy::default(),
            verify_payload: false,
            transfer: TransferConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.message_size == 0 {
            return Err(TransferError::Argument("message_size must be > 0".into()));
        }
        if self.threads == 0 {
            return Err(TransferError::Argument("thread_count must be > 0".into()));
        }
        if self.duration.is_zero() {
            return Err(TransferError::Argument("duration must be > 0".into()));
        }
        self.transfer.validate()
    }

    /// Resolve `server` to a socket address.
    pub fn resolve(&self) -> Result<SocketAddr> {
        if let Ok(addr) = self.server.parse::<SocketAddr>() {
            return Ok(addr);
        }
        let resolved = if self.server.contains(':') {
            self.server.to_socket_addrs()
        } else {
            (self.server.as_str(), self.transfer.port).to_socket_addrs()
        };
        resolved
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| TransferError::Argument(format!("cannot resolve {}", self.server)))
    }

    pub fn layout(&self) -> MessageLayout {
        MessageLayout::new(self.message_size, self.transfer.field_count)
    }
}

/// Everything one harness run produced
#[derive(Debug)]
pub struct HarnessRun {
    pub aggregate: AggregateResult,
    pub clients: Vec<ClientResult>,
}

impl HarnessRun {
    pub fn failed_clients(&self) -> usize {
        self.clients.iter().filter(|c| c.exit.is_failure()).count()
    }
}

pub struct ClientHarness {
    config: ClientConfig,
    addr: SocketAddr,
}

impl ClientHarness {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let addr = config.resolve()?;
        Ok(Self { config, addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run every client thread to completion and aggregate.
    pub fn run(&self) -> HarnessRun {
        let layout = self.config.layout();
        info!(
            server = %self.addr,
            threads = self.config.threads,
            message_size = self.config.message_size,
            effective_size = layout.total_len(),
            duration_s = self.config.duration.as_secs_f64(),
            "starting clients"
        );

        let mut handles = Vec::with_capacity(self.config.threads);
        for thread_id in 0..self.config.threads {
            let addr = self.addr;
            let duration = self.config.duration;
            let verify = self.config.verify_payload;
            let spawned = thread::Builder::new()
                .name(format!("client-{thread_id}"))
                .spawn(move || run_client(thread_id, addr, layout, duration, verify));
            match spawned {
                Ok(handle) => handles.push((thread_id, Some(handle))),
                Err(e) => {
                    warn!(thread_id, error = %e, "failed to spawn client thread");
                    handles.push((thread_id, None));
                }
            }
        }

        let clients: Vec<ClientResult> = handles
            .into_iter()
            .map(|(thread_id, handle)| match handle.map(|h| h.join()) {
                Some(Ok(result)) => result,
                Some(Err(_)) => {
                    warn!(thread_id, "client thread panicked");
                    ClientResult::failed(thread_id, ClientExit::SpawnFailed)
                }
                None => ClientResult::failed(thread_id, ClientExit::SpawnFailed),
            })
            .collect();

        let aggregate =
            AggregateResult::from_results(self.config.strategy, self.config.message_size, &clients);
        HarnessRun { aggregate, clients }
    }
}

fn run_client(
    thread_id: usize,
    addr: SocketAddr,
    layout: MessageLayout,
    duration: Duration,
    verify: bool,
) -> ClientResult {
    let mut stream = match TcpStream::connect(addr) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(thread_id, error = %e, "connect failed");
            return ClientResult::failed(thread_id, ClientExit::ConnectFailed(e));
        }
    };
    if let Err(e) = stream.set_nodelay(true) {
        debug!(thread_id, error = %e, "TCP_NODELAY not set");
    }

    let mut result = ClientResult::new(thread_id);
    let mut buf = vec![0u8; layout.total_len()];
    let start = Instant::now();
    let deadline = start + duration;

    result.exit = loop {
        if Instant::now() >= deadline {
            break ClientExit::Deadline;
        }
        let t0 = Instant::now();
        match recv_all(&mut stream, &mut buf) {
            Ok(0) => break ClientExit::PeerClosed,
            Ok(n) => {
                result.record(n, t0.elapsed());
                if verify && !payload_matches(&buf, layout) {
                    break ClientExit::Corrupt {
                        message_index: result.total_messages - 1,
                    };
                }
            }
            Err(e) => break ClientExit::Error(e),
        }
    };
    result.elapsed = start.elapsed();

    info!(
        thread_id,
        messages = result.total_messages,
        bytes = result.total_bytes,
        gbps = result.throughput_bps() / 1e9,
        avg_latency_us = result.avg_latency_us(),
        exit = ?result.exit,
        "client done"
    );
    result
}

/// Does `buf` hold one message laid out as `layout`?
pub(crate) fn payload_matches(buf: &[u8], layout: MessageLayout) -> bool {
    buf.len() == layout.total_len()
        && buf
            .chunks(layout.field_len())
            .enumerate()
            .all(|(i, field)| field.iter().all(|&b| b == pattern_byte(i)))
}
