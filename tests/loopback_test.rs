//! Loopback tests dengan real server dan real clients di 127.0.0.1
//!
//! Usage:
//!   cargo test --release --test loopback_test -- --nocapture

use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use copybench::client::{ClientConfig, ClientHarness, HarnessRun};
use copybench::core::{FieldBacking, Message, TransferConfig};
use copybench::network::{ServeSummary, Server, ServerConfig};
use copybench::report::ResultRecord;
use copybench::strategy::Strategy;

fn transfer() -> TransferConfig {
    TransferConfig {
        port: 0,
        ..TransferConfig::default()
    }
}

fn server_config(strategy: Strategy, message_size: usize, max_clients: usize) -> ServerConfig {
    ServerConfig {
        message_size,
        max_clients,
        strategy,
        bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        transfer: transfer(),
        ..ServerConfig::default()
    }
}

fn start(config: ServerConfig) -> (SocketAddr, JoinHandle<ServeSummary>) {
    let server = Server::bind(config).unwrap();
    let addr = server.local_addr().unwrap();
    let handle = thread::spawn(move || server.run().unwrap());
    (addr, handle)
}

fn run_clients(
    addr: SocketAddr,
    strategy: Strategy,
    message_size: usize,
    threads: usize,
    duration: Duration,
) -> HarnessRun {
    ClientHarness::new(ClientConfig {
        server: addr.to_string(),
        message_size,
        threads,
        duration,
        strategy,
        verify_payload: true,
        transfer: transfer(),
    })
    .unwrap()
    .run()
}

#[test]
fn test_wire_bytes_identical_across_strategies() {
    let expected = Message::create(800, 8, FieldBacking::Heap)
        .unwrap()
        .serialize()
        .unwrap()
        .repeat(20);

    for strategy in Strategy::ALL {
        let (addr, server) = start(server_config(strategy, 800, 1));

        let mut stream = TcpStream::connect(addr).unwrap();
        let mut got = vec![0u8; expected.len()];
        stream.read_exact(&mut got).unwrap();
        drop(stream);

        assert_eq!(got, expected, "{strategy}");
        let summary = server.join().unwrap();
        assert_eq!(summary.reports.len(), 1);
    }
}

#[test]
fn test_two_copy_single_client_result_line() {
    let (addr, server) = start(server_config(Strategy::TwoCopy, 800, 1));

    let run = run_clients(addr, Strategy::TwoCopy, 800, 1, Duration::from_secs(2));
    server.join().unwrap();

    let line = ResultRecord::from(&run.aggregate).to_string();
    println!("{line}");
    assert!(line.starts_with("RESULT,two_copy,800,1,"), "{line}");

    let parsed: ResultRecord = line.parse().unwrap();
    assert!(parsed.total_bytes > 0);
    assert_eq!(parsed.total_bytes, parsed.total_messages * 800);
    assert_eq!(run.failed_clients(), 0);
}

#[test]
fn test_zero_copy_with_injected_exhaustion() {
    let mut config = server_config(Strategy::ZeroCopy, 4096, 1);
    config.inject_enobufs_every = Some(10);
    let (addr, server) = start(config);

    let run = run_clients(addr, Strategy::ZeroCopy, 4096, 1, Duration::from_secs(1));
    let summary = server.join().unwrap();

    // --verify is on: a corrupt message would show up as a failed client
    assert_eq!(run.failed_clients(), 0);
    assert!(run.aggregate.total_messages > 0);
    assert_eq!(
        run.aggregate.total_bytes,
        run.aggregate.total_messages * 4096
    );

    let report = &summary.reports[0];
    if let Some(zc) = report.zerocopy {
        // SO_ZEROCOPY was available, so the fault path was exercised
        assert!(report.exhaustion_retries > 0);
        assert!(zc.acknowledged <= zc.sends);
    }
}

#[test]
fn test_tiny_message_uses_effective_size() {
    let (addr, server) = start(server_config(Strategy::OneCopy, 3, 1));

    let run = run_clients(addr, Strategy::OneCopy, 3, 1, Duration::from_millis(500));
    server.join().unwrap();

    assert_eq!(run.failed_clients(), 0);
    assert!(run.aggregate.total_messages > 0);
    // 8 fields x 1 byte
    assert_eq!(run.aggregate.total_bytes, run.aggregate.total_messages * 8);
    // The result line still carries the requested size
    assert!(ResultRecord::from(&run.aggregate)
        .to_string()
        .starts_with("RESULT,one_copy,3,1,"));
}

#[test]
fn test_many_clients_each_get_a_handler() {
    let (addr, server) = start(server_config(Strategy::OneCopy, 16 * 1024, 4));

    let run = run_clients(addr, Strategy::OneCopy, 16 * 1024, 4, Duration::from_secs(1));
    let summary = server.join().unwrap();

    assert_eq!(run.clients.len(), 4);
    assert_eq!(summary.reports.len(), 4);
    for client in &run.clients {
        assert!(client.total_bytes > 0, "client {}", client.thread_id);
    }
    assert_eq!(run.aggregate.threads, 4);
    assert_eq!(
        run.aggregate.total_bytes,
        run.clients.iter().map(|c| c.total_bytes).sum::<u64>()
    );
}

#[test]
fn test_page_aligned_fields() {
    let mut config = server_config(Strategy::ZeroCopy, 64 * 1024, 1);
    config.backing = FieldBacking::Mapped;
    let (addr, server) = start(config);

    let run = run_clients(addr, Strategy::ZeroCopy, 64 * 1024, 1, Duration::from_millis(500));
    server.join().unwrap();

    assert_eq!(run.failed_clients(), 0);
    assert!(run.aggregate.total_bytes > 0);
}
