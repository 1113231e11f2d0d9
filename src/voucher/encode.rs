//! Canonical Voucher Encoding
//!
//! The voucher hash is the value the oracle signs and the settlement
//! layer re-derives, so this encoding is a wire contract. Fields are
//! concatenated in fixed order with big-endian length prefixes on the
//! variable-length ones, then hashed with Keccak-256 to match the
//! EVM-style verifier on the other side.

use crate::core::hash::{keccak256, Hash256};
use crate::voucher::WinVoucher;

/// Domain tag prepended to every voucher encoding.
pub const VOUCHER_DOMAIN: &[u8] = b"CLAWCADE_VOUCHER_V1";

/// Compute the canonical voucher hash.
///
/// Layout: domain tag, 20-byte player address, length-prefixed prize id,
/// length-prefixed metadata URI, 32-byte replay hash, difficulty byte,
/// big-endian u64 nonce.
pub fn voucher_hash(voucher: &WinVoucher) -> Hash256 {
    let mut buf = Vec::with_capacity(
        VOUCHER_DOMAIN.len()
            + 20
            + 4
            + voucher.prize_id.len()
            + 4
            + voucher.metadata_uri.len()
            + 32
            + 1
            + 8,
    );
    buf.extend_from_slice(VOUCHER_DOMAIN);
    buf.extend_from_slice(&voucher.player.0);
    buf.extend_from_slice(&(voucher.prize_id.len() as u32).to_be_bytes());
    buf.extend_from_slice(voucher.prize_id.as_bytes());
    buf.extend_from_slice(&(voucher.metadata_uri.len() as u32).to_be_bytes());
    buf.extend_from_slice(voucher.metadata_uri.as_bytes());
    buf.extend_from_slice(&voucher.replay_hash);
    buf.push(voucher.difficulty);
    buf.extend_from_slice(&voucher.nonce.to_be_bytes());
    keccak256(&buf)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::Address;

    fn voucher() -> WinVoucher {
        WinVoucher {
            player: Address::parse("0x52908400098527886E0F7030069857D2E4169EE7").unwrap(),
            prize_id: "plush-bear".to_string(),
            metadata_uri: "ipfs://bafytest".to_string(),
            replay_hash: [7u8; 32],
            difficulty: 5,
            nonce: 123456789,
        }
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(voucher_hash(&voucher()), voucher_hash(&voucher()));
    }

    #[test]
    fn test_every_field_feeds_the_hash() {
        let base = voucher_hash(&voucher());

        let mut v = voucher();
        v.player = Address::parse("0x8617E340B3D01FA5F11F306F4090FD50E238070D").unwrap();
        assert_ne!(voucher_hash(&v), base);

        let mut v = voucher();
        v.prize_id = "plush-cat".to_string();
        assert_ne!(voucher_hash(&v), base);

        let mut v = voucher();
        v.metadata_uri = "ipfs://bafyother".to_string();
        assert_ne!(voucher_hash(&v), base);

        let mut v = voucher();
        v.replay_hash[0] ^= 1;
        assert_ne!(voucher_hash(&v), base);

        let mut v = voucher();
        v.difficulty = 6;
        assert_ne!(voucher_hash(&v), base);

        let mut v = voucher();
        v.nonce += 1;
        assert_ne!(voucher_hash(&v), base);
    }

    #[test]
    fn test_length_prefix_blocks_field_shifting() {
        // Moving a byte across the prize-id/URI boundary must not collide
        let mut a = voucher();
        a.prize_id = "ab".to_string();
        a.metadata_uri = "c".to_string();

        let mut b = voucher();
        b.prize_id = "a".to_string();
        b.metadata_uri = "bc".to_string();

        assert_ne!(voucher_hash(&a), voucher_hash(&b));
    }
}
