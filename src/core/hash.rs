//! Canonical Hashing
//!
//! Order-sensitive hashing used for:
//! - Replay content hashes (SHA-256, embedded in vouchers)
//! - Voucher hashes (Keccak-256, verified by the settlement contract)
//!
//! Field order and encoding are wire contracts. Both sides of every hash
//! must feed fields in the same order with the same prefixes.

use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// Hash output type (256 bits / 32 bytes)
pub type Hash256 = [u8; 32];

/// Order-sensitive SHA-256 hasher with a domain separator.
///
/// The helpers length-prefix variable-size fields so adjacent fields can
/// never be confused for each other.
pub struct ContentHasher {
    hasher: Sha256,
}

impl ContentHasher {
    /// Create a new hasher with a domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create the hasher used for replay content hashes.
    pub fn for_replay() -> Self {
        Self::new(b"CLAWCADE_REPLAY_V1")
    }

    /// Update with a length-prefixed string.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.update_u32(value.len() as u32);
        self.hasher.update(value.as_bytes());
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an f64 value (IEEE-754 bits, little-endian).
    #[inline]
    pub fn update_f64(&mut self, value: f64) {
        self.hasher.update(value.to_bits().to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> Hash256 {
        self.hasher.finalize().into()
    }
}

/// Compute a SHA-256 hash of arbitrary bytes.
pub fn sha256(data: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute a Keccak-256 hash of arbitrary bytes (EVM-compatible).
pub fn keccak256(data: &[u8]) -> Hash256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

// =============================================================================
// TESTS
// =============================================================================
