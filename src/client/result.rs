//! Per-thread and aggregate measurements

use std::io;
use std::time::Duration;

use crate::strategy::Strategy;

/// Why a client thread stopped
#[derive(Debug)]
pub enum ClientExit {
    /// Ran for the full duration
    Deadline,
    /// Server closed the connection
    PeerClosed,
    Error(io::Error),
    ConnectFailed(io::Error),
    /// Payload check failed on this message
    Corrupt { message_index: u64 },
    SpawnFailed,
}

impl ClientExit {
    pub fn is_failure(&self) -> bool {
        !matches!(self, ClientExit::Deadline | ClientExit::PeerClosed)
    }
}

/// Accumulator per client thread. Hanya ditulis oleh thread-nya sendiri.
#[derive(Debug)]
pub struct ClientResult {
    pub thread_id: usize,
    pub total_bytes: u64,
    pub total_messages: u64,
    /// Total latency semua message yang diterima
    pub latency_sum: Duration,
    pub elapsed: Duration,
    pub exit: ClientExit,
}

impl ClientResult {
    pub fn new(thread_id: usize) -> Self {
        Self {
            thread_id,
            total_bytes: 0,
            total_messages: 0,
            latency_sum: Duration::ZERO,
            elapsed: Duration::ZERO,
            exit: ClientExit::Deadline,
        }
    }

    /// Empty result for a client that never ran
    pub fn failed(thread_id: usize, exit: ClientExit) -> Self {
        Self {
            exit,
            ..Self::new(thread_id)
        }
    }

    #[inline(always)]
    pub fn record(&mut self, bytes: usize, latency: Duration) {
        self.total_bytes += bytes as u64;
        self.total_messages += 1;
        self.latency_sum += latency;
    }

    /// bits per second
    pub fn throughput_bps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_bytes as f64 * 8.0 / secs
        } else {
            0.0
        }
    }

    /// Mean per-message latency in microseconds
    pub fn avg_latency_us(&self) -> f64 {
        if self.total_messages == 0 {
            return 0.0;
        }
        self.latency_sum.as_secs_f64() * 1e6 / self.total_messages as f64
    }
}

/// Totals over every client thread of one run
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    pub strategy: Strategy,
    /// Requested message size, as given on the command line
    pub message_size: usize,
    pub threads: usize,
    pub total_bytes: u64,
    pub total_messages: u64,
    /// Sum of per-thread throughput
    pub throughput_bps: f64,
    /// Per-thread mean latencies averaged over the thread count
    pub avg_latency_us: f64,
}

impl AggregateResult {
    pub fn from_results(strategy: Strategy, message_size: usize, results: &[ClientResult]) -> Self {
        let threads = results.len();
        let latency_total: f64 = results.iter().map(ClientResult::avg_latency_us).sum();

        Self {
            strategy,
            message_size,
            threads,
            total_bytes: results.iter().map(|r| r.total_bytes).sum(),
            total_messages: results.iter().map(|r| r.total_messages).sum(),
            throughput_bps: results.iter().map(ClientResult::throughput_bps).sum(),
            avg_latency_us: if threads > 0 {
                latency_total / threads as f64
            } else {
                0.0
            },
        }
    }

    pub fn throughput_gbps(&self) -> f64 {
        self.throughput_bps / 1e9
    }
}
