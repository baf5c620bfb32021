//! Transfer configuration shared by server and client.
//!
//! Everything that used to be a compile-time constant (port, field count,
//! backlog, zero-copy tuning) lives here and is passed in at construction.

use std::time::Duration;

use crate::error::{Result, TransferError};

pub const DEFAULT_PORT: u16 = 9876;
pub const DEFAULT_BACKLOG: i32 = 64;
pub const DEFAULT_FIELD_COUNT: usize = 8;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);

/// Zero-copy sends between two completion drains
pub const DEFAULT_DRAIN_BATCH: u64 = 64;

#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Listening port (server) / target port (client)
    pub port: u16,
    /// listen() backlog
    pub backlog: i32,
    /// Number of independently allocated fields per message
    pub field_count: usize,
    /// Drain completions after this many zero-copy sends
    pub drain_batch: u64,
    /// Sleep after draining on ENOBUFS
    pub exhaustion_backoff: Duration,
    /// Consecutive ENOBUFS retries with backoff before switching to
    /// blocking on the error queue
    pub exhaustion_spin_limit: u32,
    /// Poll timeout per blocked wait once the spin limit is reached
    pub exhaustion_wait: Duration,
    /// Upper bound on the wait for outstanding completions at teardown
    pub final_drain_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
            field_count: DEFAULT_FIELD_COUNT,
            drain_batch: DEFAULT_DRAIN_BATCH,
            exhaustion_backoff: Duration::from_micros(100),
            exhaustion_spin_limit: 10_000,
            exhaustion_wait: Duration::from_millis(100),
            final_drain_timeout: Duration::from_secs(2),
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<()> {
        if self.field_count == 0 {
            return Err(TransferError::Argument("field_count must be > 0".into()));
        }
        if self.drain_batch == 0 {
            return Err(TransferError::Argument("drain_batch must be > 0".into()));
        }
        if self.backlog <= 0 {
            return Err(TransferError::Argument("backlog must be > 0".into()));
        }
        Ok(())
    }
}

/// Command-line parser for strictly positive integers
pub fn parse_positive(s: &str) -> std::result::Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("must be a positive integer".into()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("not a positive integer: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = TransferConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.port, 9876);
        assert_eq!(cfg.field_count, 8);
        assert_eq!(cfg.drain_batch, 64);
    }

    #[test]
    fn test_zero_field_count_rejected() {
        let cfg = TransferConfig {
            field_count: 0,
            ..TransferConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(TransferError::Argument(_))));
    }

    #[test]
    fn test_parse_positive() {
        assert_eq!(parse_positive("800"), Ok(800));
        assert!(parse_positive("0").is_err());
        assert!(parse_positive("-3").is_err());
        assert!(parse_positive("abc").is_err());
    }
}
