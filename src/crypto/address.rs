//! TRON address representation and utilities.

use std::fmt;

use sha2::{Digest, Sha256};

/// Version byte of mainnet TRON addresses. Renders as the leading `T`.
pub const ADDRESS_VERSION: u8 = 0x41;

/// Length of a Base58Check rendered address.
pub const ADDRESS_LEN: usize = 34;

/// A TRON address (version byte + 20-byte account hash).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 21]);

impl Address {
    /// Creates an address from the last 20 bytes of a public key hash.
    #[inline]
    pub fn from_hash(hash: [u8; 20]) -> Self {
        let mut bytes = [0u8; 21];
        bytes[0] = ADDRESS_VERSION;
        bytes[1..].copy_from_slice(&hash);
        Self(bytes)
    }

    /// Returns the address as raw bytes, version byte first.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 21] {
        &self.0
    }

    /// Returns the raw address as a lowercase hex string (`41...`).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns the human-readable Base58Check form (`T...`, 34 characters).
    ///
    /// The payload is the 21 address bytes followed by the first four bytes
    /// of `sha256(sha256(address))`.
    #[inline]
    pub fn to_base58check(&self) -> String {
        let checksum = double_sha256(&self.0);

        let mut payload = [0u8; 25];
        payload[..21].copy_from_slice(&self.0);
        payload[21..].copy_from_slice(&checksum[..4]);

        bs58::encode(payload).into_string()
    }
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);

    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58check())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58check())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_address(hex_str: &str) -> Address {
        let hash: [u8; 20] = hex::decode(hex_str).unwrap().try_into().unwrap();
        Address::from_hash(hash)
    }

    #[test]
    fn test_base58check_address() {
        // Account hash of private key 1
        let addr = make_address("7e5f4552091a69125d5dfcb7b8c2659029395bdf");
        assert_eq!(addr.to_base58check(), "TMVQGm1qAQYVdetCeGRRkTWYYrLXuHK2HC");
        assert_eq!(addr.to_string().len(), ADDRESS_LEN);
    }

    #[test]
    fn test_hex_output() {
        let addr = make_address("0000000000000000000000000000000000000000");
        assert_eq!(addr.to_hex(), "41".to_string() + &"0".repeat(40));
        assert_eq!(addr.as_bytes()[0], ADDRESS_VERSION);
    }

    #[test]
    fn test_version_byte_renders_as_t() {
        for hash in ["00", "ff", "7f"] {
            let addr = make_address(&hash.repeat(20));
            let rendered = addr.to_base58check();
            assert!(rendered.starts_with('T'), "{rendered}");
            assert_eq!(rendered.len(), ADDRESS_LEN);
        }
    }
}
