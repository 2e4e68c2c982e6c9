//! Private key to TRON address derivation.

use secp256k1::{PublicKey, Secp256k1, SecretKey, SignOnly};
use tiny_keccak::{Hasher, Keccak};

use super::Address;

/// Errors produced while deriving an address from a candidate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DerivationError {
    /// The candidate is zero or not below the secp256k1 group order.
    #[error("candidate is not a valid secp256k1 private key")]
    InvalidKey,
}

/// Turns 32-byte candidates into TRON addresses.
///
/// Holds a signing-only secp256k1 context, which is immutable after
/// construction. Clone one per worker or share it by reference; both are
/// safe across threads.
#[derive(Debug, Clone)]
pub struct AddressCodec {
    secp: Secp256k1<SignOnly>,
}

impl Default for AddressCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressCodec {
    /// Creates a codec with a fresh signing context.
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::signing_only(),
        }
    }

    /// Derives the Base58Check address string for `private_key`.
    #[inline]
    pub fn derive(&self, private_key: &[u8; 32]) -> Result<String, DerivationError> {
        self.derive_address(private_key)
            .map(|address| address.to_base58check())
    }

    /// Derives the raw address for `private_key`.
    ///
    /// Process:
    /// 1. Multiply the generator point by the private key
    /// 2. Serialize the public key uncompressed and drop the 0x04 tag
    /// 3. Hash the remaining 64 bytes with Keccak-256
    /// 4. Keep the last 20 bytes behind the 0x41 version byte
    #[inline]
    pub fn derive_address(&self, private_key: &[u8; 32]) -> Result<Address, DerivationError> {
        let secret_key =
            SecretKey::from_slice(private_key).map_err(|_| DerivationError::InvalidKey)?;
        let public_key = PublicKey::from_secret_key(&self.secp, &secret_key);
        let public_key_bytes = public_key.serialize_uncompressed();

        let mut hasher = Keccak::v256();
        hasher.update(&public_key_bytes[1..]);

        let mut hash = [0u8; 32];
        hasher.finalize(&mut hash);

        let mut account_hash = [0u8; 20];
        account_hash.copy_from_slice(&hash[12..]);

        Ok(Address::from_hash(account_hash))
    }
}
