use log::warn;

use super::{AddressEntry, Classifier};
use crate::address::{decode, Address};

/// Walks upward from a starting address, classifying every address it
/// passes, until enough hosts have been seen or the address space ends.
///
/// Network and broadcast addresses met along the way are yielded but do not
/// count towards the host target. The walk is fused: once it stops it keeps
/// returning `None`.
#[derive(Debug, Clone)]
pub struct AddressWalk {
    classifier: Classifier,
    next: Option<Address>,
    desired_hosts: u64,
    hosts_seen: u64,
}

impl AddressWalk {
    pub fn new(start: Address, desired_hosts: u64, prefix: u8) -> Self {
        Self {
            classifier: Classifier::new(prefix),
            next: Some(start),
            desired_hosts,
            hosts_seen: 0,
        }
    }

    /// Host addresses yielded so far.
    pub const fn hosts_seen(&self) -> u64 {
        self.hosts_seen
    }

    /// True once the walk stopped at the top of the address space before
    /// reaching its host target.
    pub const fn is_exhausted(&self) -> bool {
        self.next.is_none() && self.hosts_seen < self.desired_hosts
    }
}

impl Iterator for AddressWalk {
    type Item = AddressEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.hosts_seen >= self.desired_hosts {
            return None;
        }

        let address = self.next?;
        let role = self.classifier.classify(address);
        if role.is_host() {
            self.hosts_seen += 1;
        }
        self.next = address.checked_add(1);

        Some(AddressEntry::new(address, role))
    }
}

impl std::iter::FusedIterator for AddressWalk {}

/// The ordered entries of a scan range plus how many of them are hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumeration {
    entries: Vec<AddressEntry>,
    hosts: u64,
    desired_hosts: u64,
}

impl Enumeration {
    pub fn entries(&self) -> &[AddressEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<AddressEntry> {
        self.entries
    }

    /// Number of host-role entries.
    pub const fn hosts(&self) -> u64 {
        self.hosts
    }

    /// True if the walk hit `255.255.255.255` before finding the requested
    /// number of hosts, in which case `entries` is shorter than asked for.
    pub const fn is_truncated(&self) -> bool {
        self.hosts < self.desired_hosts
    }

    pub fn first(&self) -> Option<&AddressEntry> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&AddressEntry> {
        self.entries.last()
    }
}

/// Enumerates the addresses needed to cover `desired_hosts` host addresses
/// starting at `start`, classified for `prefix`.
///
/// The start address is always the first entry, even when it is a network
/// or broadcast address.
///
/// ```rust
/// # use hostsweep::address::{decode, encode};
/// # use hostsweep::range::enumerate;
/// let range = enumerate(encode("192.168.1.254").unwrap(), 3, 24);
/// let listed: Vec<String> = range.entries().iter().map(ToString::to_string).collect();
/// assert_eq!(
///     listed,
///     [
///         "192.168.1.254:HOST",
///         "192.168.1.255:BCAST",
///         "192.168.2.0:NTWRK",
///         "192.168.2.1:HOST",
///         "192.168.2.2:HOST",
///     ]
/// );
/// ```
pub fn enumerate(start: Address, desired_hosts: u64, prefix: u8) -> Enumeration {
    let mut walk = AddressWalk::new(start, desired_hosts, prefix);
    let entries: Vec<AddressEntry> = walk.by_ref().collect();

    if walk.is_exhausted() {
        warn!(
            "Address space ended at {} after {} of {} hosts",
            decode(Address::MAX),
            walk.hosts_seen(),
            desired_hosts
        );
    }

    Enumeration {
        entries,
        hosts: walk.hosts_seen(),
        desired_hosts,
    }
}
