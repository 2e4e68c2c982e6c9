//! Cryptographic operations for TRON address derivation.
//!
//! This module provides:
//! - TRON address representation with Base58Check rendering
//! - Private key to address derivation (secp256k1, Keccak-256)

mod address;
mod codec;

pub use address::{Address, ADDRESS_LEN, ADDRESS_VERSION};
pub use codec::{AddressCodec, DerivationError};
