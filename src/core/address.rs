//! Player Wallet Address
//!
//! 20-byte EVM-style address, case-normalized on parse.
//! Implements Ord so BTreeMap iteration over addresses is deterministic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 20-byte wallet address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

/// Address parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    /// Missing 0x prefix or wrong length.
    #[error("invalid address format: {0}")]
    InvalidFormat(String),

    /// Non-hex characters.
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),
}

impl Address {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parse from a 0x-prefixed hex string. Mixed case is accepted and
    /// normalized; the canonical form is lowercase.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let trimmed = s.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressError::InvalidFormat(trimmed.to_string()))?;

        if hex_part.len() != 40 {
            return Err(AddressError::InvalidFormat(trimmed.to_string()));
        }

        let bytes = hex::decode(hex_part)
            .map_err(|_| AddressError::InvalidHex(trimmed.to_string()))?;

        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Trait-generation seed: first 4 bytes interpreted as a big-endian
    /// integer. The same slice must be used wherever traits are derived.
    pub fn trait_seed(&self) -> u64 {
        u32::from_be_bytes(self.0[0..4].try_into().unwrap()) as u64
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    #[test]
    fn test_parse_normalizes_case() {
        let upper = Address::parse(ADDR).unwrap();
        let lower = Address::parse(&ADDR.to_lowercase()).unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), ADDR.to_lowercase());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Address::parse("52908400098527886E0F7030069857D2E4169EE7").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xZZ908400098527886E0F7030069857D2E4169EE7").is_err());
    }

    #[test]
    fn test_trait_seed_stable() {
        let addr = Address::parse(ADDR).unwrap();
        // First 4 bytes are 0x52 0x90 0x84 0x00
        assert_eq!(addr.trait_seed(), 0x5290_8400);
        assert_eq!(addr.trait_seed(), addr.trait_seed());
    }

    #[test]
    fn test_serde_round_trip() {
        let addr = Address::parse(ADDR).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);
    }
}
