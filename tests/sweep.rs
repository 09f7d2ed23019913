//! End-to-end runs through the public API: validate a request, enumerate
//! it, probe it and check the finished report.
use std::io;
use std::net::Ipv4Addr;
use std::time::Duration;

use hostsweep::address::{decode, encode};
use hostsweep::input::ScanRequest;
use hostsweep::range::AddressRole;
use hostsweep::scanner::liveness::TcpConnect;
use hostsweep::scanner::resolver::HostnameLookup;
use hostsweep::scanner::{Liveness, ReachabilityStatus, ReverseLookup, Scanner, Summary};
use tokio::net::TcpListener;

/// Every host whose last octet is odd answers.
struct OddHostsUp;

impl Liveness for OddHostsUp {
    async fn is_alive(&self, address: Ipv4Addr, _timeout: Duration) -> io::Result<bool> {
        tokio::time::sleep(Duration::from_millis(u64::from(address.octets()[3] % 5))).await;
        Ok(address.octets()[3] % 2 == 1)
    }
}

/// Names every host after its last octet.
struct OctetNames;

impl ReverseLookup for OctetNames {
    async fn hostname(&self, address: Ipv4Addr) -> anyhow::Result<Option<String>> {
        Ok(Some(format!("node{}.example", address.octets()[3])))
    }
}

#[tokio::test]
async fn sweep_across_a_block_boundary() {
    let range = ScanRequest::parse("192.168.1.254", "3", "24").unwrap().enumerate();
    let scanner = Scanner::new(
        OddHostsUp,
        OctetNames,
        20,
        Duration::from_millis(200),
        Duration::from_millis(200),
    )
    .unwrap();

    let report = scanner.run(range.entries(), |_| {}).await.unwrap();
    let rows: Vec<String> = report
        .results()
        .iter()
        .map(|r| format!("{} {} {}", decode(r.address()), r.label(), r.hostname_or_marker()))
        .collect();

    assert_eq!(
        rows,
        [
            "192.168.1.254 DOWN node254.example",
            "192.168.1.255 BCAST -",
            "192.168.2.0 NTWRK -",
            "192.168.2.1 UP node1.example",
            "192.168.2.2 DOWN node2.example",
        ]
    );
    assert_eq!(
        report.summary(),
        Summary {
            up: 1,
            down: 2,
            network: 1,
            broadcast: 1,
            total: 5
        }
    );
}

#[tokio::test]
async fn large_sweep_stays_sorted_and_complete() {
    let range = ScanRequest::parse("10.0.0.0", "500", "26").unwrap().enumerate();
    let scanner = Scanner::new(
        OddHostsUp,
        HostnameLookup::Disabled,
        20,
        Duration::from_millis(200),
        Duration::from_millis(200),
    )
    .unwrap();
    let mut last_progress = 0;

    let report = scanner
        .run(range.entries(), |progress| {
            assert_eq!(progress.completed, last_progress + 1);
            last_progress = progress.completed;
        })
        .await
        .unwrap();

    assert_eq!(last_progress, range.entries().len());
    assert_eq!(report.results().len(), range.entries().len());
    assert!(report
        .results()
        .windows(2)
        .all(|pair| pair[0].address() < pair[1].address()));

    for result in report.results() {
        match result.role() {
            AddressRole::Host => {
                assert_ne!(result.status(), ReachabilityStatus::NotApplicable);
                assert_eq!(result.hostname(), None);
            }
            AddressRole::Network | AddressRole::Broadcast => {
                assert_eq!(result.status(), ReachabilityStatus::NotApplicable);
                assert_eq!(result.hostname_or_marker(), "-");
            }
        }
    }

    let summary = report.summary();
    assert_eq!(summary.up + summary.down, 500);
    assert_eq!(summary.total, range.entries().len());
}

#[tokio::test]
async fn tcp_probe_finds_local_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let range = ScanRequest::parse("127.0.0.1", "1", "32").unwrap().enumerate();
    let scanner = Scanner::new(
        TcpConnect::new(vec![port]),
        HostnameLookup::Disabled,
        1,
        Duration::from_secs(2),
        Duration::from_secs(1),
    )
    .unwrap();

    let report = scanner.run(range.entries(), |_| {}).await.unwrap();
    assert_eq!(report.results().len(), 1);
    assert_eq!(report.results()[0].address(), encode("127.0.0.1").unwrap());
    assert_eq!(report.results()[0].status(), ReachabilityStatus::Up);
}

#[test]
fn truncated_range_is_flagged() {
    let range = ScanRequest::parse("255.255.255.254", "10", "24").unwrap().enumerate();
    assert!(range.is_truncated());
    assert_eq!(range.hosts(), 1);
    assert_eq!(range.entries().len(), 2);
}

#[test]
fn invalid_requests_are_rejected() {
    assert!(ScanRequest::parse("10.0.0", "5", "24").is_err());
    assert!(ScanRequest::parse("10.0.0.1", "0", "24").is_err());
    assert!(ScanRequest::parse("10.0.0.1", "5", "40").is_err());
}
