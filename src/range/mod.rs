//! Provides the block arithmetic used to classify addresses within a CIDR
//! prefix, and the walk that enumerates a scan range.
mod walk;

pub use walk::{enumerate, AddressWalk, Enumeration};

use std::fmt;

use serde::Serialize;

use crate::address::{decode, Address};

/// Prefix lengths at or above this value have no distinct network or
/// broadcast address (RFC 3021 point-to-point links and single hosts).
const DEGENERATE_PREFIX: u8 = 31;

/// The role an address plays inside its block.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AddressRole {
    Network,
    Broadcast,
    Host,
}

impl AddressRole {
    /// Whether an address with this role should be probed.
    pub const fn is_host(self) -> bool {
        matches!(self, Self::Host)
    }
}

impl fmt::Display for AddressRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Network => "NTWRK",
            Self::Broadcast => "BCAST",
            Self::Host => "HOST",
        };
        f.write_str(label)
    }
}

/// An address paired with its role. Produced once by the walk and never
/// changed afterwards.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressEntry {
    address: Address,
    role: AddressRole,
}

impl AddressEntry {
    pub const fn new(address: Address, role: AddressRole) -> Self {
        Self { address, role }
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    pub const fn role(&self) -> AddressRole {
        self.role
    }
}

impl fmt::Display for AddressEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", decode(self.address), self.role)
    }
}

/// Computes block boundaries for a fixed prefix length.
///
/// Block sizes are kept as `u64` so that a `/0` block (2^32 addresses) does
/// not overflow. Prefix lengths above 32 are treated as 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    prefix: u8,
    block_size: u64,
}

impl Classifier {
    pub fn new(prefix: u8) -> Self {
        debug_assert!(prefix <= 32, "prefix length {prefix} is not IPv4");
        let prefix = prefix.min(32);
        Self {
            prefix,
            block_size: 1u64 << (32 - u32::from(prefix)),
        }
    }

    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses in one block, `2^(32 - prefix)`.
    pub const fn block_size(&self) -> u64 {
        self.block_size
    }

    /// First address of the block containing `address`.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn network_address(&self, address: Address) -> Address {
        // block_size divides 2^32, so the product always fits back in a u32
        ((address as u64 / self.block_size) * self.block_size) as Address
    }

    /// Last address of the block containing `address`.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn broadcast_address(&self, address: Address) -> Address {
        (self.network_address(address) as u64 + self.block_size - 1) as Address
    }

    /// Classifies `address` within its block.
    ///
    /// ```rust
    /// # use hostsweep::range::{AddressRole, Classifier};
    /// let classifier = Classifier::new(24);
    /// assert_eq!(classifier.classify(0xC0A8_0100), AddressRole::Network);
    /// assert_eq!(classifier.classify(0xC0A8_01FF), AddressRole::Broadcast);
    /// assert_eq!(Classifier::new(31).classify(0xC0A8_0100), AddressRole::Host);
    /// ```
    pub const fn classify(&self, address: Address) -> AddressRole {
        if self.prefix >= DEGENERATE_PREFIX {
            return AddressRole::Host;
        }

        if address == self.network_address(address) {
            AddressRole::Network
        } else if address == self.broadcast_address(address) {
            AddressRole::Broadcast
        } else {
            AddressRole::Host
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AddressEntry, AddressRole, Classifier};
    use crate::address::encode;
    use cidr_utils::cidr::Ipv4Cidr;
    use parameterized::parameterized;
    use std::net::Ipv4Addr;

    #[test]
    fn block_sizes() {
        assert_eq!(Classifier::new(8).block_size(), 16_777_216);
        assert_eq!(Classifier::new(24).block_size(), 256);
        assert_eq!(Classifier::new(30).block_size(), 4);
        assert_eq!(Classifier::new(32).block_size(), 1);
        assert_eq!(Classifier::new(0).block_size(), 1 << 32);
    }

    #[test]
    fn network_and_broadcast_for_slash_24() {
        let classifier = Classifier::new(24);
        let address = encode("192.168.1.77").unwrap();

        assert_eq!(classifier.network_address(address), encode("192.168.1.0").unwrap());
        assert_eq!(classifier.broadcast_address(address), encode("192.168.1.255").unwrap());
    }

    #[test]
    fn top_of_address_space_does_not_overflow() {
        let classifier = Classifier::new(8);
        assert_eq!(classifier.broadcast_address(u32::MAX), u32::MAX);
        assert_eq!(classifier.network_address(u32::MAX), 0xFF00_0000);
        assert_eq!(classifier.classify(u32::MAX), AddressRole::Broadcast);

        let everything = Classifier::new(0);
        assert_eq!(everything.network_address(12345), 0);
        assert_eq!(everything.broadcast_address(12345), u32::MAX);
    }

    #[test]
    fn boundaries_agree_with_cidr_utils() {
        let samples = ["10.20.30.40", "192.168.1.254", "172.31.255.1", "0.0.0.9", "255.255.255.255"];
        for prefix in 8..=32u8 {
            let classifier = Classifier::new(prefix);
            for sample in samples {
                let address = encode(sample).unwrap();
                let network = classifier.network_address(address);
                let cidr = Ipv4Cidr::new(Ipv4Addr::from(network), prefix).unwrap();

                assert_eq!(u32::from(cidr.first_address()), network);
                assert_eq!(
                    u32::from(cidr.last_address()),
                    classifier.broadcast_address(address)
                );
            }
        }
    }

    #[parameterized(prefix = { 24, 25, 26, 27, 28, 29, 30 })]
    fn one_network_and_one_broadcast_per_block(prefix: u8) {
        let classifier = Classifier::new(prefix);
        let start = encode("10.1.2.0").unwrap();
        let roles: Vec<AddressRole> = (start..start + 256).map(|a| classifier.classify(a)).collect();

        let blocks = 256 / classifier.block_size() as usize;
        for block in roles.chunks(classifier.block_size() as usize) {
            assert_eq!(block[0], AddressRole::Network);
            assert_eq!(block[block.len() - 1], AddressRole::Broadcast);
            assert!(block[1..block.len() - 1].iter().all(|r| r.is_host()));
        }
        assert_eq!(roles.iter().filter(|r| **r == AddressRole::Network).count(), blocks);
        assert_eq!(roles.iter().filter(|r| **r == AddressRole::Broadcast).count(), blocks);
    }

    #[test]
    fn wide_prefixes_have_single_network_and_broadcast() {
        let classifier = Classifier::new(16);
        let network = encode("172.16.0.0").unwrap();
        let broadcast = encode("172.16.255.255").unwrap();

        assert_eq!(classifier.classify(network), AddressRole::Network);
        assert_eq!(classifier.classify(broadcast), AddressRole::Broadcast);
        for address in [network + 1, network + 255, network + 256, broadcast - 1] {
            assert_eq!(classifier.classify(address), AddressRole::Host);
        }
    }

    #[parameterized(prefix = { 31, 32 })]
    fn degenerate_blocks_are_all_hosts(prefix: u8) {
        let classifier = Classifier::new(prefix);
        let start = encode("192.168.1.0").unwrap();
        for address in start..=start + 7 {
            assert_eq!(classifier.classify(address), AddressRole::Host);
        }
        assert_eq!(classifier.classify(0), AddressRole::Host);
        assert_eq!(classifier.classify(u32::MAX), AddressRole::Host);
    }

    #[test]
    fn roles_render_like_report_labels() {
        assert_eq!(AddressRole::Network.to_string(), "NTWRK");
        assert_eq!(AddressRole::Broadcast.to_string(), "BCAST");
        assert_eq!(AddressRole::Host.to_string(), "HOST");
        assert_eq!(
            AddressEntry::new(encode("10.0.0.0").unwrap(), AddressRole::Network).to_string(),
            "10.0.0.0:NTWRK"
        );
    }
}
