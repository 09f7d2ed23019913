//! This crate exposes the internal functionality of the `hostsweep`
//! network host scanner.
//!
//! hostsweep walks an IPv4 range from a starting address until it has
//! covered a requested number of host addresses, classifies every address
//! it passes as network, broadcast or host for a given CIDR prefix, and then
//! probes the hosts concurrently for reachability and reverse-DNS names.
//!
//! ## Architecture Overview
//!
//! The flow through the crate is:
//!
//! 1. **Input Processing**: [`input::ScanRequest`] validates the starting
//!    address, host count and prefix length
//! 2. **Enumeration**: [`range::enumerate`] walks the range and tags each
//!    address with an [`range::AddressRole`]
//! 3. **Probing**: [`scanner::Scanner`] pings and reverse-resolves host
//!    entries with bounded concurrency, skipping network and broadcast
//!    addresses
//! 4. **Result Processing**: the [`scanner::ScanReport`] is sorted by
//!    address and carries the summary counts for presentation
//!
//! ## Basic Usage Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use hostsweep::input::ScanRequest;
//! use hostsweep::scanner::liveness::TcpConnect;
//! use hostsweep::scanner::resolver::HostnameLookup;
//! use hostsweep::scanner::Scanner;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 10.0.0.0 is the network address of its /24, so 6 entries come back
//!     let range = ScanRequest::parse("10.0.0.0", "5", "24")?.enumerate();
//!
//!     let scanner = Scanner::new(
//!         TcpConnect::default(),       // Liveness probe
//!         HostnameLookup::Disabled,    // No reverse DNS
//!         20,                          // Hosts probed at the same time
//!         Duration::from_secs(1),      // Probe timeout
//!         Duration::from_secs(2),      // Lookup timeout
//!     )?;
//!
//!     let report = scanner.run(range.entries(), |_| {}).await?;
//!     println!("{} of {} hosts are up", report.summary().up, range.hosts());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Invalid input surfaces as [`address::FormatError`]. Failures of a single
//! host (no reply, no PTR record, timeouts) are folded into the report as
//! `DOWN` or an absent hostname. Only conditions that make the whole run
//! meaningless abort it with a [`scanner::ScanError`].
#![allow(clippy::needless_doctest_main)]

pub mod tui;

pub mod input;

pub mod scanner;

pub mod range;

pub mod address;
