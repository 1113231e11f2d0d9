//! Win Vouchers
//!
//! The anti-cheat oracle: validates a submitted replay against its
//! session, scores its difficulty, and issues a signed voucher the
//! settlement layer can verify and consume exactly once. Validation
//! always runs before signing; a failed validation is never signed.

pub mod encode;
pub mod signer;
pub mod traits;
pub mod validate;

use thiserror::Error;
use tracing::info;

use crate::cabinet::config::CabinetConfig;
use crate::core::address::Address;
use crate::core::hash::Hash256;
use crate::game::replay::ReplayData;

pub use encode::{voucher_hash, VOUCHER_DOMAIN};
pub use signer::{recover_signer, OracleSigner, SignError, ORACLE_KEY_ENV};
pub use traits::{generate_custom_traits, CustomTraits};
pub use validate::{score_difficulty, validate_replay, ValidationError};

/// The claim a voucher attests to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WinVoucher {
    /// Winning player.
    pub player: Address,
    /// Catalog key of the won prize.
    pub prize_id: String,
    /// Where the prize metadata was pinned.
    pub metadata_uri: String,
    /// Content hash of the validated replay.
    pub replay_hash: Hash256,
    /// Difficulty score, 1-10.
    pub difficulty: u8,
    /// Single-use nonce.
    pub nonce: u64,
}

/// A voucher together with its canonical hash and oracle signature.
#[derive(Clone, Debug)]
pub struct SignedVoucher {
    /// The attested claim.
    pub voucher: WinVoucher,
    /// Canonical hash of the claim.
    pub voucher_hash: Hash256,
    /// 65-byte recoverable signature over the hash.
    pub signature: [u8; 65],
}

/// Why voucher issuance failed.
#[derive(Debug, Error)]
pub enum VoucherError {
    /// The replay did not validate.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Signing failed.
    #[error(transparent)]
    Sign(#[from] SignError),
}

impl VoucherError {
    /// Stable machine-readable reason string for API responses.
    pub fn reason(&self) -> &'static str {
        match self {
            VoucherError::Validation(e) => e.reason(),
            VoucherError::Sign(_) => "signing_failed",
        }
    }
}

/// Generate a voucher nonce: millisecond timestamp in the high bits, 20
/// random bits below. Collisions under concurrent issuance are ruled out
/// by the random tail; reuse is additionally policed by the settlement
/// layer's consumed-hash set.
pub fn generate_nonce(now_ms: u64) -> u64 {
    (now_ms << 20) | u64::from(rand::random::<u32>() & 0xF_FFFF)
}

/// Validate a replay and issue a signed voucher for it.
///
/// The replay must belong to `session_id`, show a win, and name the same
/// prize the caller is claiming. Only after all checks pass is anything
/// signed.
#[allow(clippy::too_many_arguments)]
pub fn issue_voucher(
    signer: &OracleSigner,
    config: &CabinetConfig,
    player: Address,
    session_id: &str,
    replay: &ReplayData,
    prize_id: &str,
    metadata_uri: &str,
    now_ms: u64,
) -> Result<SignedVoucher, VoucherError> {
    validate_replay(replay, session_id)?;

    let claimed_matches = replay
        .won_prize
        .as_ref()
        .map_or(false, |won| won.key == prize_id);
    if !claimed_matches {
        return Err(ValidationError::MalformedReplay("claimed prize does not match replay").into());
    }

    let difficulty = score_difficulty(config, replay);
    let voucher = WinVoucher {
        player,
        prize_id: prize_id.to_string(),
        metadata_uri: metadata_uri.to_string(),
        replay_hash: replay.content_hash(),
        difficulty,
        nonce: generate_nonce(now_ms),
    };

    let hash = voucher_hash(&voucher);
    let signature = signer.sign(&hash)?;
    info!(
        player = %voucher.player,
        prize = %voucher.prize_id,
        difficulty,
        voucher_hash = %hex::encode(hash),
        "voucher issued"
    );

    Ok(SignedVoucher {
        voucher,
        voucher_hash: hash,
        signature,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::replay::{
        GameInput, PathSample, PhysicsSummary, PlayResult, TimedInput, WonPrize,
    };

    fn winning_replay(session_id: &str) -> ReplayData {
        let inputs = vec![
            TimedInput {
                input: GameInput::Right,
                t_ms: 100,
            },
            TimedInput {
                input: GameInput::Drop,
                t_ms: 800,
            },
        ];
        let claw_path = inputs
            .iter()
            .map(|i| PathSample {
                x: 1.0,
                y: 170.0,
                t_ms: i.t_ms,
            })
            .collect();
        ReplayData {
            session_id: session_id.to_string(),
            started_at_ms: 1700000000000,
            inputs,
            initial_prizes: Vec::new(),
            claw_path,
            physics: Some(PhysicsSummary {
                drop_depth: 40.0,
                drop_height: 120.0,
                grab_strength: 0.03,
            }),
            result: PlayResult::Won,
            won_prize: Some(WonPrize {
                key: "plush-bear".to_string(),
                rarity: "common".to_string(),
                accuracy: 0.03,
            }),
        }
    }

    fn player() -> Address {
        Address::parse("0x52908400098527886E0F7030069857D2E4169EE7").unwrap()
    }

    #[test]
    fn test_issue_signs_valid_win() {
        let signer = OracleSigner::ephemeral();
        let config = CabinetConfig::default();
        let replay = winning_replay("sess-1");

        let signed = issue_voucher(
            &signer,
            &config,
            player(),
            "sess-1",
            &replay,
            "plush-bear",
            "ipfs://bafytest",
            1700000001000,
        )
        .unwrap();

        assert_eq!(signed.voucher.player, player());
        assert_eq!(signed.voucher.replay_hash, replay.content_hash());
        assert!((1..=10).contains(&signed.voucher.difficulty));
        assert_eq!(signed.voucher_hash, voucher_hash(&signed.voucher));
        assert_eq!(
            recover_signer(&signed.voucher_hash, &signed.signature).unwrap(),
            signer.address()
        );
    }

    #[test]
    fn test_issue_refuses_failed_validation() {
        let signer = OracleSigner::ephemeral();
        let config = CabinetConfig::default();
        let mut replay = winning_replay("sess-1");
        replay.result = PlayResult::Loss;
        replay.won_prize = None;

        let err = issue_voucher(
            &signer,
            &config,
            player(),
            "sess-1",
            &replay,
            "plush-bear",
            "ipfs://bafytest",
            1700000001000,
        )
        .unwrap_err();
        assert_eq!(err.reason(), "not_a_win");
    }

    #[test]
    fn test_issue_refuses_prize_mismatch() {
        let signer = OracleSigner::ephemeral();
        let config = CabinetConfig::default();
        let replay = winning_replay("sess-1");

        let err = issue_voucher(
            &signer,
            &config,
            player(),
            "sess-1",
            &replay,
            "gilded-claw",
            "ipfs://bafytest",
            1700000001000,
        )
        .unwrap_err();
        assert_eq!(err.reason(), "malformed_replay");
    }

    #[test]
    fn test_nonce_embeds_timestamp_and_varies() {
        let now_ms = 1700000001000u64;
        let a = generate_nonce(now_ms);
        let b = generate_nonce(now_ms);
        assert_eq!(a >> 20, now_ms);
        assert_eq!(b >> 20, now_ms);
        // 20 random bits collide with probability 2^-20 per pair; a flake
        // here means the entropy source is broken
        assert_ne!(a & 0xF_FFFF, b & 0xF_FFFF);
    }

    #[test]
    fn test_reissue_changes_nonce_and_hash() {
        let signer = OracleSigner::ephemeral();
        let config = CabinetConfig::default();
        let replay = winning_replay("sess-1");

        let issue = || {
            issue_voucher(
                &signer,
                &config,
                player(),
                "sess-1",
                &replay,
                "plush-bear",
                "ipfs://bafytest",
                1700000001000,
            )
            .unwrap()
        };
        let first = issue();
        let second = issue();
        assert_ne!(first.voucher.nonce, second.voucher.nonce);
        assert_ne!(first.voucher_hash, second.voucher_hash);
    }
}
