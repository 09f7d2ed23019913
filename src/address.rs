//! Provides functions to convert IPv4 addresses between dotted-quad text
//! and their 32-bit integer form.
//!
//! All range arithmetic in this crate happens on plain `u32` values, which
//! keeps block maths (division, addition, overflow checks) trivial. Text only
//! appears at the edges: user input on the way in and reports on the way out.

use std::net::Ipv4Addr;

use thiserror::Error;

/// A single IPv4 host as a 32-bit unsigned integer.
///
/// Every value in `0..=u32::MAX` is a valid address.
pub type Address = u32;

/// Errors raised while validating user supplied scan parameters.
///
/// These are always recoverable: an interactive caller re-prompts, a
/// programmatic caller gets the error back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The address did not split into exactly four dot-separated parts.
    #[error("Invalid IP format '{input}'. Please use format: x.x.x.x (4 octets required)")]
    OctetCount { input: String, found: usize },

    /// One of the parts was not a decimal number.
    #[error("Invalid IP format. Octet '{octet}' is not a number. Please use format: x.x.x.x")]
    InvalidOctet { octet: String },

    /// One of the parts was a number outside of `0..=255`.
    #[error("Invalid IP format. Each octet must be between 0-255, got {value}")]
    OctetOutOfRange { value: String },

    /// The host count was not a number.
    #[error("Invalid number '{0}'. Please enter a numeric value.")]
    InvalidHostCount(String),

    /// The host count was below one.
    #[error("Number of hosts must be at least 1.")]
    HostCountTooSmall,

    /// The prefix length was not a number.
    #[error("Invalid CIDR '{0}'. Please enter a number.")]
    InvalidPrefix(String),

    /// The prefix length was outside of the supported `8..=32`.
    #[error("CIDR must be between {min} and {max}, got {value}.")]
    PrefixOutOfRange { value: String, min: u8, max: u8 },
}

/// Parses a dotted quad into an [`Address`].
///
/// Each of the four parts must consist of ASCII digits only and hold a value
/// in `0..=255`. Surrounding whitespace around the whole input is ignored.
///
/// ```rust
/// # use hostsweep::address::encode;
/// assert_eq!(encode("10.0.0.1"), Ok(0x0A00_0001));
/// assert!(encode("10.0.1").is_err());
/// ```
pub fn encode(dotted_quad: &str) -> Result<Address, FormatError> {
    let input = dotted_quad.trim();
    let parts: Vec<&str> = input.split('.').collect();
    if parts.len() != 4 {
        return Err(FormatError::OctetCount {
            input: input.to_owned(),
            found: parts.len(),
        });
    }

    parts.iter().try_fold(0u32, |acc, part| {
        parse_octet(part).map(|octet| (acc << 8) | u32::from(octet))
    })
}

fn parse_octet(part: &str) -> Result<u8, FormatError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FormatError::InvalidOctet {
            octet: part.to_owned(),
        });
    }

    // Only digits are left, so the one way to fail is overflow.
    part.parse::<u8>().map_err(|_| FormatError::OctetOutOfRange {
        value: part.to_owned(),
    })
}

/// Formats an [`Address`] as a dotted quad. Never fails.
///
/// ```rust
/// # use hostsweep::address::decode;
/// assert_eq!(decode(0xC0A8_0101), "192.168.1.1");
/// ```
pub fn decode(address: Address) -> String {
    format!(
        "{}.{}.{}.{}",
        (address >> 24) & 255,
        (address >> 16) & 255,
        (address >> 8) & 255,
        address & 255
    )
}

/// Converts an [`Address`] into the standard library representation, which
/// is what socket and resolver APIs want.
pub const fn to_ipv4(address: Address) -> Ipv4Addr {
    Ipv4Addr::from_bits(address)
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, to_ipv4, FormatError};
    use parameterized::parameterized;
    use std::net::Ipv4Addr;

    #[parameterized(input = {
        "0.0.0.0", "10.0.0.1", "192.168.1.254", "255.255.255.255", "172.16.40.9"
    })]
    fn valid_quads_round_trip(input: &str) {
        let encoded = encode(input).unwrap();
        assert_eq!(decode(encoded), input);
    }

    #[test]
    fn encode_matches_std_parser() {
        for text in ["1.2.3.4", "127.0.0.1", "8.8.4.4", "100.64.0.0"] {
            let std_value = u32::from(text.parse::<Ipv4Addr>().unwrap());
            assert_eq!(encode(text), Ok(std_value));
        }
    }

    #[test]
    fn decode_then_encode_is_identity() {
        let samples = [0, 1, 255, 256, 0x0A00_0000, 0x7FFF_FFFF, 0xFFFF_FFFE, u32::MAX];
        for address in samples {
            assert_eq!(encode(&decode(address)), Ok(address));
        }
        for address in (0..u32::MAX).step_by(16_777_259) {
            assert_eq!(encode(&decode(address)), Ok(address));
        }
    }

    #[test]
    fn encode_ignores_surrounding_whitespace() {
        assert_eq!(encode("  10.0.0.1\n"), Ok(0x0A00_0001));
    }

    #[test]
    fn encode_accepts_leading_zeros() {
        assert_eq!(encode("010.000.000.001"), Ok(0x0A00_0001));
    }

    #[parameterized(input = { "10.0.0", "10.0.0.0.1", "", "10" }, found = { 3, 5, 1, 1 })]
    fn wrong_number_of_octets(input: &str, found: usize) {
        match encode(input) {
            Err(FormatError::OctetCount { found: f, .. }) => assert_eq!(f, found),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[parameterized(input = { "10.0.a.1", "10..0.1", "10.0.-1.1", "10.0.+1.1", "10.0. 1.1" })]
    fn non_numeric_octets(input: &str) {
        assert!(matches!(encode(input), Err(FormatError::InvalidOctet { .. })));
    }

    #[parameterized(input = { "256.0.0.1", "10.0.0.300", "1.2.3.99999999999" })]
    fn out_of_range_octets(input: &str) {
        assert!(matches!(
            encode(input),
            Err(FormatError::OctetOutOfRange { .. })
        ));
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = encode("10.0.0").unwrap_err();
        assert!(err.to_string().contains("4 octets required"));

        let err = encode("10.0.0.256").unwrap_err();
        assert!(err.to_string().contains("between 0-255"));
    }

    #[test]
    fn to_ipv4_matches_decode() {
        assert_eq!(to_ipv4(0xC0A8_0102), Ipv4Addr::new(192, 168, 1, 2));
        assert_eq!(to_ipv4(0xC0A8_0102).to_string(), decode(0xC0A8_0102));
    }
}
