//! copybench - loopback sweep
//!
//! Runs every send path against an in-process server on 127.0.0.1 and
//! prints one `RESULT` line per path:
//! - Two-Copy: serialize + `send()`
//! - One-Copy: `sendmsg()` over the field buffers
//! - Zero-Copy: `sendmsg(MSG_ZEROCOPY)` + completion drain
//!
//! For separate hosts use `copybench-server` and `copybench-client`.

use std::net::{IpAddr, Ipv4Addr};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use copybench::client::{ClientConfig, ClientHarness};
use copybench::core::config::parse_positive;
use copybench::core::TransferConfig;
use copybench::logging;
use copybench::network::{Server, ServerConfig};
use copybench::report::ResultRecord;
use copybench::strategy::Strategy;

#[derive(Parser)]
#[command(name = "copybench", version, about = "Loopback sweep over all send paths")]
struct Args {
    /// Requested message size in bytes
    #[arg(long, value_parser = parse_positive, default_value_t = 65536)]
    message_size: usize,

    /// Client connections per run
    #[arg(long, value_parser = parse_positive, default_value_t = 1)]
    threads: usize,

    /// Seconds per run
    #[arg(long, value_parser = parse_positive, default_value_t = 2)]
    duration: usize,

    /// Only run these paths (default: all)
    #[arg(long, value_enum)]
    strategy: Vec<Strategy>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init();

    println!("🚀 copybench - loopback sweep");
    println!("=============================\n");

    let strategies = if args.strategy.is_empty() {
        Strategy::ALL.to_vec()
    } else {
        args.strategy.clone()
    };

    let mut records = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        println!("📊 {strategy}");
        let record = run_loopback(strategy, &args)
            .with_context(|| format!("{strategy} run failed"))?;
        println!("   {}", record.summary());
        records.push(record);
    }

    println!();
    for record in &records {
        println!("{record}");
    }
    println!("\n✅ Sweep complete");
    Ok(())
}

fn run_loopback(strategy: Strategy, args: &Args) -> Result<ResultRecord> {
    let transfer = TransferConfig {
        port: 0,
        ..TransferConfig::default()
    };

    let server = Server::bind(ServerConfig {
        message_size: args.message_size,
        max_clients: args.threads,
        strategy,
        bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        transfer: transfer.clone(),
        ..ServerConfig::default()
    })?;
    let addr = server.local_addr()?;
    let server_thread = thread::Builder::new()
        .name("server".into())
        .spawn(move || server.run())
        .context("failed to spawn server thread")?;

    let harness = ClientHarness::new(ClientConfig {
        server: addr.to_string(),
        message_size: args.message_size,
        threads: args.threads,
        duration: Duration::from_secs(args.duration as u64),
        strategy,
        verify_payload: false,
        transfer,
    })?;
    let run = harness.run();

    let summary = server_thread
        .join()
        .map_err(|_| anyhow!("server thread panicked"))??;
    if let Some(zc) = summary.reports.iter().find_map(|r| r.zerocopy) {
        println!(
            "   zerocopy: {}/{} acked, {} copied by kernel",
            zc.acknowledged, zc.sends, zc.copied
        );
    }

    Ok(ResultRecord::from(&run.aggregate))
}
