//! Settlement Interface
//!
//! Trait for the external settlement layer that escrows play tokens and
//! consumes win vouchers, plus an in-process mock that behaves like the
//! on-chain verifier: it re-derives the voucher hash from the claim,
//! recovers the signer, and burns each voucher hash exactly once.

pub mod storage;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::core::address::Address;
use crate::core::hash::Hash256;
use crate::voucher::{recover_signer, voucher_hash, SignedVoucher};

pub use storage::{pin_with_retry, IpfsMockStorage, MetadataStorage, StorageError, PIN_RETRIES};

/// Tokens escrowed per game start and per extra grab.
pub const GRAB_COST: u64 = 1;

/// Settlement-side failures.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SettlementError {
    /// The wallet has no active on-chain game.
    #[error("no active on-chain game for this wallet")]
    NoActiveGame,
    /// The wallet already has an active on-chain game.
    #[error("wallet already has an active game")]
    GameAlreadyActive,
    /// Not enough balance or allowance for the escrow.
    #[error("insufficient token balance or allowance")]
    InsufficientFunds,
    /// The voucher failed verification.
    #[error("voucher rejected: {0}")]
    VoucherRejected(&'static str),
    /// No minted prize with that token id.
    #[error("unknown token id {0}")]
    UnknownToken(u64),
}

/// A wallet's active escrow, as the settlement layer sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveGame {
    /// Tokens locked so far.
    pub tokens_escrowed: u64,
}

/// A prize minted by a consumed voucher.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintedPrize {
    /// Token id, assigned sequentially by the settlement layer.
    pub token_id: u64,
    /// Owning wallet.
    pub owner: Address,
    /// Catalog key of the prize.
    pub prize_id: String,
    /// Pinned metadata URI.
    pub metadata_uri: String,
    /// Replay content hash the voucher attested to, hex.
    pub replay_hash: String,
    /// Difficulty the oracle scored.
    pub difficulty: u8,
    /// Mint time.
    pub minted_at: DateTime<Utc>,
}

/// The external settlement layer.
#[async_trait]
pub trait SettlementClient: Send + Sync {
    /// Escrow the game cost and open an active game for the wallet.
    async fn start_game(&self, wallet: &Address) -> Result<ActiveGame, SettlementError>;

    /// Escrow one more grab during an active game.
    async fn pay_for_grab(&self, wallet: &Address) -> Result<ActiveGame, SettlementError>;

    /// Abandon the active game, forfeiting the escrow.
    async fn forfeit_game(&self, wallet: &Address) -> Result<(), SettlementError>;

    /// Verify a voucher, burn its hash and mint the prize. Closes the
    /// wallet's active game.
    async fn claim_prize(
        &self,
        wallet: &Address,
        voucher: &SignedVoucher,
    ) -> Result<MintedPrize, SettlementError>;

    /// The wallet's token balance.
    async fn token_balance(&self, wallet: &Address) -> u64;

    /// How much the wallet has approved for escrow.
    async fn allowance(&self, wallet: &Address) -> u64;

    /// The wallet's active game, if any.
    async fn active_session(&self, wallet: &Address) -> Option<ActiveGame>;

    /// Look up a minted prize by token id.
    async fn minted_prize(&self, token_id: u64) -> Option<MintedPrize>;

    /// All prizes owned by a wallet.
    async fn collection(&self, owner: &Address) -> Vec<MintedPrize>;
}

#[derive(Default)]
struct MockState {
    balances: BTreeMap<Address, u64>,
    allowances: BTreeMap<Address, u64>,
    active: BTreeMap<Address, ActiveGame>,
    consumed_vouchers: BTreeSet<Hash256>,
    minted: BTreeMap<u64, MintedPrize>,
    next_token_id: u64,
}

/// In-process settlement mock with the verifier semantics of the real
/// contract.
pub struct MockSettlement {
    oracle: Address,
    state: RwLock<MockState>,
}

impl MockSettlement {
    /// A settlement layer that accepts vouchers signed by `oracle`.
    pub fn new(oracle: Address) -> Self {
        Self {
            oracle,
            state: RwLock::new(MockState {
                next_token_id: 1,
                ..MockState::default()
            }),
        }
    }

    /// Credit a wallet with tokens. Test and dev hook.
    pub async fn fund(&self, wallet: &Address, tokens: u64) {
        let mut state = self.state.write().await;
        *state.balances.entry(*wallet).or_insert(0) += tokens;
    }

    /// Approve tokens for escrow. Test and dev hook.
    pub async fn approve(&self, wallet: &Address, tokens: u64) {
        let mut state = self.state.write().await;
        state.allowances.insert(*wallet, tokens);
    }

    fn escrow(state: &mut MockState, wallet: &Address, cost: u64) -> Result<(), SettlementError> {
        let balance = state.balances.get(wallet).copied().unwrap_or(0);
        let allowance = state.allowances.get(wallet).copied().unwrap_or(0);
        if balance < cost || allowance < cost {
            return Err(SettlementError::InsufficientFunds);
        }
        state.balances.insert(*wallet, balance - cost);
        state.allowances.insert(*wallet, allowance - cost);
        Ok(())
    }
}

#[async_trait]
impl SettlementClient for MockSettlement {
    async fn start_game(&self, wallet: &Address) -> Result<ActiveGame, SettlementError> {
        let mut state = self.state.write().await;
        if state.active.contains_key(wallet) {
            return Err(SettlementError::GameAlreadyActive);
        }
        Self::escrow(&mut state, wallet, GRAB_COST)?;
        let game = ActiveGame {
            tokens_escrowed: GRAB_COST,
        };
        state.active.insert(*wallet, game);
        debug!(wallet = %wallet, "game escrow opened");
        Ok(game)
    }

    async fn pay_for_grab(&self, wallet: &Address) -> Result<ActiveGame, SettlementError> {
        let mut state = self.state.write().await;
        if !state.active.contains_key(wallet) {
            return Err(SettlementError::NoActiveGame);
        }
        Self::escrow(&mut state, wallet, GRAB_COST)?;
        let game = state
            .active
            .get_mut(wallet)
            .ok_or(SettlementError::NoActiveGame)?;
        game.tokens_escrowed += GRAB_COST;
        Ok(*game)
    }

    async fn forfeit_game(&self, wallet: &Address) -> Result<(), SettlementError> {
        let mut state = self.state.write().await;
        state
            .active
            .remove(wallet)
            .map(|_| ())
            .ok_or(SettlementError::NoActiveGame)
    }

    async fn claim_prize(
        &self,
        wallet: &Address,
        voucher: &SignedVoucher,
    ) -> Result<MintedPrize, SettlementError> {
        let mut state = self.state.write().await;
        if !state.active.contains_key(wallet) {
            return Err(SettlementError::NoActiveGame);
        }

        // Verify exactly what the contract would: re-derive the hash from
        // the claimed fields, recover the signer, burn the hash once.
        if voucher.voucher.player != *wallet {
            return Err(SettlementError::VoucherRejected("wrong_player"));
        }
        let derived = voucher_hash(&voucher.voucher);
        if derived != voucher.voucher_hash {
            return Err(SettlementError::VoucherRejected("hash_mismatch"));
        }
        let signer = recover_signer(&derived, &voucher.signature)
            .map_err(|_| SettlementError::VoucherRejected("bad_signature"))?;
        if signer != self.oracle {
            return Err(SettlementError::VoucherRejected("unknown_signer"));
        }
        if !state.consumed_vouchers.insert(derived) {
            return Err(SettlementError::VoucherRejected("voucher_consumed"));
        }

        state.active.remove(wallet);
        let token_id = state.next_token_id;
        state.next_token_id += 1;
        let minted = MintedPrize {
            token_id,
            owner: *wallet,
            prize_id: voucher.voucher.prize_id.clone(),
            metadata_uri: voucher.voucher.metadata_uri.clone(),
            replay_hash: hex::encode(voucher.voucher.replay_hash),
            difficulty: voucher.voucher.difficulty,
            minted_at: Utc::now(),
        };
        state.minted.insert(token_id, minted.clone());
        info!(wallet = %wallet, token_id, prize = %minted.prize_id, "prize minted");
        Ok(minted)
    }

    async fn token_balance(&self, wallet: &Address) -> u64 {
        self.state
            .read()
            .await
            .balances
            .get(wallet)
            .copied()
            .unwrap_or(0)
    }

    async fn allowance(&self, wallet: &Address) -> u64 {
        self.state
            .read()
            .await
            .allowances
            .get(wallet)
            .copied()
            .unwrap_or(0)
    }

    async fn active_session(&self, wallet: &Address) -> Option<ActiveGame> {
        self.state.read().await.active.get(wallet).copied()
    }

    async fn minted_prize(&self, token_id: u64) -> Option<MintedPrize> {
        self.state.read().await.minted.get(&token_id).cloned()
    }

    async fn collection(&self, owner: &Address) -> Vec<MintedPrize> {
        self.state
            .read()
            .await
            .minted
            .values()
            .filter(|p| p.owner == *owner)
            .cloned()
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
