//! Core functionality for actual probing behaviour.
//!
//! [`Scanner`] takes the classified entries of a range and produces one
//! [`ProbeResult`] per entry. Network and broadcast entries are answered
//! inline without any I/O; host entries go through a bounded pool of
//! concurrent probes, each running a liveness check and a reverse lookup
//! side by side.
//!
//! Per-host failures never surface as errors. A probe that fails or times
//! out reports the host as [`ReachabilityStatus::Down`]; a lookup that fails
//! or times out leaves the hostname absent. The only errors a run can return
//! are the ones that make the whole result set unusable, see [`ScanError`].
pub mod liveness;
pub mod resolver;

use std::{
    fmt,
    future::{self, Future},
    io,
    net::Ipv4Addr,
    num::NonZeroUsize,
    pin::pin,
    time::Duration,
};

use futures::stream::{self, StreamExt};
use log::debug;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tokio::time;

use crate::address::{decode, to_ipv4, Address};
use crate::range::{AddressEntry, AddressRole};

/// Shown in place of a hostname when there is none.
pub const ABSENT_HOSTNAME: &str = "-";

/// Extra time granted on top of the probe timeout before a liveness check
/// is abandoned. Covers process start-up for the `ping` based probe.
const PROBE_GRACE: Duration = Duration::from_millis(500);

/// Checks whether a host answers at all.
#[allow(async_fn_in_trait)]
pub trait Liveness {
    /// `Ok(true)` if the host responded within `timeout`, `Ok(false)` if it
    /// did not. Errors are reserved for local failures.
    async fn is_alive(&self, address: Ipv4Addr, timeout: Duration) -> io::Result<bool>;
}

/// Maps an address back to a hostname.
#[allow(async_fn_in_trait)]
pub trait ReverseLookup {
    /// `Ok(None)` when the address simply has no name.
    async fn hostname(&self, address: Ipv4Addr) -> anyhow::Result<Option<String>>;
}

/// Errors that abort a whole run. No partial results are returned with
/// any of them.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Nothing to scan: the address list is empty.")]
    EmptyRange,

    #[error("Could not start the probe workers: {0}")]
    WorkerPool(String),

    #[error("Ran out of system resources while probing {address}: {source}. Please reduce the concurrency or raise the ulimit.")]
    ResourceExhaustion {
        address: Ipv4Addr,
        #[source]
        source: io::Error,
    },

    #[error("Scan cancelled after {completed} of {total} addresses.")]
    Cancelled { completed: usize, total: usize },
}

/// Whether a host answered its liveness probe.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReachabilityStatus {
    Up,
    Down,
    /// Network and broadcast addresses are never probed.
    NotApplicable,
}

impl fmt::Display for ReachabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::NotApplicable => "N/A",
        };
        f.write_str(label)
    }
}

/// The outcome for a single address.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    #[serde(serialize_with = "serialize_address")]
    address: Address,
    role: AddressRole,
    status: ReachabilityStatus,
    hostname: Option<String>,
}

fn serialize_address<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&decode(*address))
}

impl ProbeResult {
    pub const fn new(
        address: Address,
        role: AddressRole,
        status: ReachabilityStatus,
        hostname: Option<String>,
    ) -> Self {
        Self {
            address,
            role,
            status,
            hostname,
        }
    }

    /// The result for an entry that is not probed.
    pub const fn not_applicable(entry: AddressEntry) -> Self {
        Self::new(
            entry.address(),
            entry.role(),
            ReachabilityStatus::NotApplicable,
            None,
        )
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    pub const fn role(&self) -> AddressRole {
        self.role
    }

    pub const fn status(&self) -> ReachabilityStatus {
        self.status
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// The hostname, or [`ABSENT_HOSTNAME`] if there is none.
    pub fn hostname_or_marker(&self) -> &str {
        self.hostname().unwrap_or(ABSENT_HOSTNAME)
    }

    /// Short label for reports: `UP`, `DOWN`, `NTWRK` or `BCAST`.
    pub fn label(&self) -> String {
        match self.status {
            ReachabilityStatus::NotApplicable => self.role.to_string(),
            status => status.to_string(),
        }
    }
}

/// Counts derived from a finished result set.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub up: usize,
    pub down: usize,
    pub network: usize,
    pub broadcast: usize,
    pub total: usize,
}

impl Summary {
    pub fn from_results(results: &[ProbeResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            match (result.status, result.role) {
                (ReachabilityStatus::Up, _) => summary.up += 1,
                (ReachabilityStatus::Down, _) => summary.down += 1,
                (ReachabilityStatus::NotApplicable, AddressRole::Network) => summary.network += 1,
                (ReachabilityStatus::NotApplicable, AddressRole::Broadcast) => {
                    summary.broadcast += 1;
                }
                (ReachabilityStatus::NotApplicable, AddressRole::Host) => {}
            }
            summary.total += 1;
            summary
        })
    }
}

/// A finished run: every result, sorted by address, plus the counts.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    results: Vec<ProbeResult>,
    summary: Summary,
}

impl ScanReport {
    /// Sorts `results` ascending by numeric address and derives the summary.
    pub fn new(mut results: Vec<ProbeResult>) -> Self {
        results.sort_unstable_by_key(ProbeResult::address);
        let summary = Summary::from_results(&results);
        Self { results, summary }
    }

    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    pub const fn summary(&self) -> Summary {
        self.summary
    }

    pub fn into_results(self) -> Vec<ProbeResult> {
        self.results
    }
}

/// Reported after every finished entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// Probes classified entries with at most `concurrency` hosts in flight.
#[derive(Debug)]
pub struct Scanner<L, R> {
    liveness: L,
    resolver: R,
    concurrency: NonZeroUsize,
    probe_timeout: Duration,
    resolve_timeout: Duration,
}

impl<L: Liveness, R: ReverseLookup> Scanner<L, R> {
    pub fn new(
        liveness: L,
        resolver: R,
        concurrency: usize,
        probe_timeout: Duration,
        resolve_timeout: Duration,
    ) -> Result<Self, ScanError> {
        let concurrency = NonZeroUsize::new(concurrency)
            .ok_or_else(|| ScanError::WorkerPool("concurrency must be at least 1".to_owned()))?;

        Ok(Self {
            liveness,
            resolver,
            concurrency,
            probe_timeout,
            resolve_timeout,
        })
    }

    pub const fn concurrency(&self) -> usize {
        self.concurrency.get()
    }

    /// Probes every entry and returns the sorted report.
    ///
    /// `on_progress` is called once per entry as it finishes, in completion
    /// order, with a counter that increases by one each time.
    pub async fn run<F>(&self, entries: &[AddressEntry], on_progress: F) -> Result<ScanReport, ScanError>
    where
        F: FnMut(Progress),
    {
        self.run_until(entries, on_progress, future::pending()).await
    }

    /// Like [`run`](Self::run), but gives up with [`ScanError::Cancelled`]
    /// as soon as `shutdown` resolves. Probes still in flight are dropped,
    /// which also kills any child process they started.
    pub async fn run_until<F, S>(
        &self,
        entries: &[AddressEntry],
        mut on_progress: F,
        shutdown: S,
    ) -> Result<ScanReport, ScanError>
    where
        F: FnMut(Progress),
        S: Future<Output = ()>,
    {
        if entries.is_empty() {
            return Err(ScanError::EmptyRange);
        }

        let total = entries.len();
        let mut completed = 0;
        let mut results = Vec::with_capacity(total);

        let (hosts, unprobed): (Vec<AddressEntry>, Vec<AddressEntry>) =
            entries.iter().copied().partition(|entry| entry.role().is_host());

        for entry in unprobed {
            results.push(ProbeResult::not_applicable(entry));
            completed += 1;
            on_progress(Progress { completed, total });
        }

        debug!(
            "Start probing hosts.\nConcurrency {}\nHosts {}\nEntries all together {}",
            self.concurrency,
            hosts.len(),
            total
        );

        let mut probes = stream::iter(hosts)
            .map(|entry| self.probe_host(entry))
            .buffer_unordered(self.concurrency.get());
        let mut shutdown = pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    debug!("Shutdown requested after {completed} of {total} entries");
                    return Err(ScanError::Cancelled { completed, total });
                }
                next = probes.next() => match next {
                    Some(result) => {
                        results.push(result?);
                        completed += 1;
                        on_progress(Progress { completed, total });
                    }
                    None => break,
                },
            }
        }

        let report = ScanReport::new(results);
        debug!("Probing finished: {:?}", report.summary());
        Ok(report)
    }

    async fn probe_host(&self, entry: AddressEntry) -> Result<ProbeResult, ScanError> {
        let ip = to_ipv4(entry.address());
        let (alive, hostname) = tokio::join!(self.check_liveness(ip), self.lookup_hostname(ip));

        let status = if alive? {
            ReachabilityStatus::Up
        } else {
            ReachabilityStatus::Down
        };

        Ok(ProbeResult::new(entry.address(), entry.role(), status, hostname))
    }

    /// Any failure other than resource exhaustion counts as "no response".
    async fn check_liveness(&self, ip: Ipv4Addr) -> Result<bool, ScanError> {
        let deadline = self.probe_timeout + PROBE_GRACE;
        match time::timeout(deadline, self.liveness.is_alive(ip, self.probe_timeout)).await {
            Ok(Ok(alive)) => Ok(alive),
            Ok(Err(e)) if is_resource_exhaustion(&e) => {
                Err(ScanError::ResourceExhaustion { address: ip, source: e })
            }
            Ok(Err(e)) => {
                debug!("Liveness probe to {ip} failed, marking down: {e}");
                Ok(false)
            }
            Err(_) => {
                debug!("Liveness probe to {ip} timed out after {deadline:?}");
                Ok(false)
            }
        }
    }

    async fn lookup_hostname(&self, ip: Ipv4Addr) -> Option<String> {
        match time::timeout(self.resolve_timeout, self.resolver.hostname(ip)).await {
            Ok(Ok(hostname)) => hostname,
            Ok(Err(e)) => {
                debug!("Reverse lookup of {ip} failed: {e}");
                None
            }
            Err(_) => {
                debug!("Reverse lookup of {ip} timed out");
                None
            }
        }
    }
}

/// `errno` values for "no more processes" (EAGAIN and ENOMEM from fork)
/// and the per-process and system-wide descriptor limits (EMFILE, ENFILE).
#[cfg(target_os = "linux")]
const EXHAUSTION_ERRNOS: [i32; 4] = [11, 12, 24, 23];
#[cfg(all(unix, not(target_os = "linux")))]
const EXHAUSTION_ERRNOS: [i32; 4] = [35, 12, 24, 23];
/// ERROR_NOT_ENOUGH_MEMORY, WSAEMFILE
#[cfg(windows)]
const EXHAUSTION_ERRNOS: [i32; 2] = [8, 10024];
#[cfg(not(any(unix, windows)))]
const EXHAUSTION_ERRNOS: [i32; 0] = [];

/// Too many open descriptors or processes. Retrying other hosts would only
/// fail the same way, so these abort the run.
pub fn is_resource_exhaustion(error: &io::Error) -> bool {
    if let Some(code) = error.raw_os_error() {
        return EXHAUSTION_ERRNOS.contains(&code);
    }

    error.kind() == io::ErrorKind::OutOfMemory
        || error
            .to_string()
            .to_lowercase()
            .contains("too many open files")
}
