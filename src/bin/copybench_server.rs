//! copybench server
//!
//! Streams a synthetic message to every client until it disconnects, using
//! the selected send path.
//!
//! # Usage
//!
//! ```text
//! copybench-server <message_size> <max_clients> [--strategy zero_copy]
//!                  [--page-aligned] [--inject-enobufs-every N]
//! ```
//!
//! Logging is controlled by `COPYBENCH_LOG` (e.g. `COPYBENCH_LOG=debug`).

use anyhow::{Context, Result};
use clap::Parser;

use copybench::core::config::parse_positive;
use copybench::core::FieldBacking;
use copybench::logging;
use copybench::network::{Server, ServerConfig};
use copybench::strategy::Strategy;

#[derive(Parser)]
#[command(name = "copybench-server", version, about = "Copy-path benchmark server")]
struct Args {
    /// Requested message size in bytes (split across the message fields)
    #[arg(value_parser = parse_positive)]
    message_size: usize,

    /// Connections to serve before the server stops accepting
    #[arg(value_parser = parse_positive)]
    max_clients: usize,

    /// Send path
    #[arg(long, value_enum, default_value_t)]
    strategy: Strategy,

    /// Back each field with its own page-aligned anonymous mapping
    #[arg(long, default_value_t = false)]
    page_aligned: bool,

    /// Fail every N-th zero-copy send with ENOBUFS
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    inject_enobufs_every: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init();

    let config = ServerConfig {
        message_size: args.message_size,
        max_clients: args.max_clients,
        strategy: args.strategy,
        backing: if args.page_aligned {
            FieldBacking::Mapped
        } else {
            FieldBacking::Heap
        },
        inject_enobufs_every: args.inject_enobufs_every,
        ..ServerConfig::default()
    };

    let server = Server::bind(config).context("failed to start listener")?;
    let addr = server.local_addr()?;
    let layout = server.config().layout();

    println!("🔌 copybench server on {addr}");
    println!(
        "   strategy={} message={}B (effective {}B, {} x {}B) clients={}",
        args.strategy,
        args.message_size,
        layout.total_len(),
        layout.field_count(),
        layout.field_len(),
        args.max_clients,
    );
    if let Some(every) = args.inject_enobufs_every {
        println!("   ⚠️  injecting ENOBUFS every {every} zero-copy sends");
    }

    let summary = server.run().context("server failed")?;

    println!("\n📊 Served {} connections", summary.reports.len());
    for report in &summary.reports {
        let peer = report
            .peer
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".into());
        print!(
            "   [{}] {} {:?}: {} msgs, {} bytes",
            report.id, peer, report.outcome, report.messages, report.bytes
        );
        if report.exhaustion_retries > 0 {
            print!(", {} ENOBUFS retries", report.exhaustion_retries);
        }
        if let Some(zc) = report.zerocopy {
            print!(
                ", zerocopy {}/{} acked ({} copied)",
                zc.acknowledged, zc.sends, zc.copied
            );
        }
        println!();
    }

    Ok(())
}
