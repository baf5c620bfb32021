//! Result lines
//!
//! ```text
//! RESULT,<strategy>,<message_size>,<threads>,<gbps>,<avg_latency_us>,<total_bytes>,<total_messages>
//! ```
//!
//! Throughput has four decimals, latency two. One line per run on stdout,
//! easy to grep out of a sweep.

use std::fmt;
use std::str::FromStr;

use crate::client::AggregateResult;
use crate::error::TransferError;
use crate::strategy::Strategy;

const PREFIX: &str = "RESULT";

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub strategy: Strategy,
    pub message_size: usize,
    pub threads: usize,
    pub throughput_gbps: f64,
    pub avg_latency_us: f64,
    pub total_bytes: u64,
    pub total_messages: u64,
}

impl ResultRecord {
    /// One-line human summary
    pub fn summary(&self) -> String {
        format!(
            "{:<9} size={:>8}B threads={:>3}  {:>9.4} Gbps  {:>10.2} us/msg  {} msgs",
            self.strategy.name(),
            self.message_size,
            self.threads,
            self.throughput_gbps,
            self.avg_latency_us,
            self.total_messages,
        )
    }
}

impl From<&AggregateResult> for ResultRecord {
    fn from(agg: &AggregateResult) -> Self {
        Self {
            strategy: agg.strategy,
            message_size: agg.message_size,
            threads: agg.threads,
            throughput_gbps: agg.throughput_gbps(),
            avg_latency_us: agg.avg_latency_us,
            total_bytes: agg.total_bytes,
            total_messages: agg.total_messages,
        }
    }
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{:.4},{:.2},{},{}",
            PREFIX,
            self.strategy.name(),
            self.message_size,
            self.threads,
            self.throughput_gbps,
            self.avg_latency_us,
            self.total_bytes,
            self.total_messages,
        )
    }
}

impl FromStr for ResultRecord {
    type Err = TransferError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let bad = |what: &str| TransferError::Argument(format!("bad RESULT line ({what}): {line}"));

        let parts: Vec<&str> = line.trim().split(',').collect();
        if parts.len() != 8 || parts[0] != PREFIX {
            return Err(bad("shape"));
        }

        Ok(Self {
            strategy: Strategy::from_name(parts[1]).ok_or_else(|| bad("strategy"))?,
            message_size: parts[2].parse().map_err(|_| bad("message_size"))?,
            threads: parts[3].parse().map_err(|_| bad("threads"))?,
            throughput_gbps: parts[4].parse().map_err(|_| bad("throughput"))?,
            avg_latency_us: parts[5].parse().map_err(|_| bad("latency"))?,
            total_bytes: parts[6].parse().map_err(|_| bad("total_bytes"))?,
            total_messages: parts[7].parse().map_err(|_| bad("total_messages"))?,
        })
    }
}
