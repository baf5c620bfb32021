//! copybench client
//!
//! Opens `thread_count` connections, receives fixed-size messages for
//! `duration_seconds` and prints one machine-readable `RESULT` line.
//!
//! # Usage
//!
//! ```text
//! copybench-client <server_address> <message_size> <thread_count> [duration_seconds]
//!                  [--strategy zero_copy] [--verify]
//! ```
//!
//! `message_size` must match the server's; `--strategy` only labels the
//! result line.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use copybench::client::{ClientConfig, ClientExit, ClientHarness};
use copybench::core::config::{parse_positive, DEFAULT_DURATION};
use copybench::logging;
use copybench::report::ResultRecord;
use copybench::strategy::Strategy;

#[derive(Parser)]
#[command(name = "copybench-client", version, about = "Copy-path benchmark client")]
struct Args {
    /// Server host or ip[:port] (port defaults to 9876)
    server_address: String,

    /// Requested message size in bytes, same value as the server
    #[arg(value_parser = parse_positive)]
    message_size: usize,

    /// Concurrent connections
    #[arg(value_parser = parse_positive)]
    thread_count: usize,

    /// Run time in seconds
    #[arg(value_parser = parse_positive, default_value_t = DEFAULT_DURATION.as_secs() as usize)]
    duration_seconds: usize,

    /// Send path the server runs (label for the RESULT line)
    #[arg(long, value_enum, default_value_t)]
    strategy: Strategy,

    /// Check every received message against the field pattern
    #[arg(long, default_value_t = false)]
    verify: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init();

    let config = ClientConfig {
        server: args.server_address.clone(),
        message_size: args.message_size,
        threads: args.thread_count,
        duration: Duration::from_secs(args.duration_seconds as u64),
        strategy: args.strategy,
        verify_payload: args.verify,
        ..ClientConfig::default()
    };
    let harness = ClientHarness::new(config)
        .with_context(|| format!("invalid client setup for {}", args.server_address))?;

    println!(
        "📡 {} x {} -> {} for {}s",
        args.thread_count,
        args.strategy,
        harness.addr(),
        args.duration_seconds
    );

    let run = harness.run();

    for client in &run.clients {
        if let ClientExit::Corrupt { message_index } = client.exit {
            eprintln!(
                "❌ client {} received a corrupt message (#{message_index})",
                client.thread_id
            );
        }
    }
    let failed = run.failed_clients();
    if failed > 0 {
        eprintln!("⚠️  {failed} of {} clients failed", run.clients.len());
    }

    let record = ResultRecord::from(&run.aggregate);
    println!("{}", record.summary());
    println!("{record}");

    Ok(())
}
