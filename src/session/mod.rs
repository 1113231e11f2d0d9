//! Game Sessions
//!
//! Server-issued sessions tie a play to the wallet that escrowed tokens
//! for it. A session is single-use: it is created at game start, must be
//! active and unexpired at win submission, and is consumed by completion.
//! A periodic sweep retires sessions older than the TTL.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::address::Address;

/// How long a session stays claimable after it is created.
pub const SESSION_TTL_SECS: i64 = 3600;

/// How often the background sweep retires expired sessions.
pub const SWEEP_INTERVAL_SECS: u64 = 300;

/// One escrow-backed play session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    /// Server-issued identifier.
    pub id: String,
    /// Wallet the session belongs to.
    pub wallet: Address,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Tokens locked for this play.
    pub tokens_escrowed: u64,
    /// Chain the escrow lives on.
    pub network: String,
    /// False once completed or expired.
    pub active: bool,
    /// Prize the session was consumed for, set at completion.
    pub prize_id: Option<String>,
    /// Set when the session was consumed by a win submission.
    pub completed_at: Option<DateTime<Utc>>,
}

impl GameSession {
    fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.started_at > ttl
    }
}

/// Why a session failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No session with that id.
    #[error("session not found")]
    NotFound,
    /// Session belongs to a different wallet.
    #[error("session belongs to a different wallet")]
    AddressMismatch,
    /// Session outlived its TTL.
    #[error("session expired")]
    Expired,
    /// Session was already completed or retired.
    #[error("session is no longer active")]
    Inactive,
}

impl SessionError {
    /// Stable machine-readable reason string for API responses.
    pub fn reason(&self) -> &'static str {
        match self {
            SessionError::NotFound => "not_found",
            SessionError::AddressMismatch => "address_mismatch",
            SessionError::Expired => "expired",
            SessionError::Inactive => "inactive",
        }
    }
}

/// Session persistence seam. The in-memory store is the only production
/// implementation today; the trait exists so a database-backed store can
/// slot in without touching the handlers.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a fresh active session for a wallet.
    async fn create(&self, wallet: Address, tokens_escrowed: u64, network: &str) -> GameSession;

    /// Look up a session by id.
    async fn get(&self, id: &str) -> Option<GameSession>;

    /// Check that a session exists, is active, is unexpired and belongs
    /// to `wallet`. Expired sessions are retired as a side effect.
    async fn validate(&self, id: &str, wallet: &Address) -> Result<GameSession, SessionError>;

    /// Consume a session after a successful win submission.
    async fn complete(&self, id: &str, prize_id: &str) -> Result<GameSession, SessionError>;

    /// Retire every expired session, returning how many were retired.
    async fn sweep_expired(&self) -> usize;
}

/// In-memory session store.
pub struct InMemorySessionStore {
    sessions: RwLock<BTreeMap<String, GameSession>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    /// Store with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(SESSION_TTL_SECS))
    }

    /// Store with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            ttl,
        }
    }

    /// Validation against an explicit clock.
    pub async fn validate_at(
        &self,
        id: &str,
        wallet: &Address,
        now: DateTime<Utc>,
    ) -> Result<GameSession, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id).ok_or(SessionError::NotFound)?;

        if session.wallet != *wallet {
            return Err(SessionError::AddressMismatch);
        }
        if session.active && session.is_expired_at(now, self.ttl) {
            session.active = false;
            debug!(session_id = %id, "session expired at validation");
            return Err(SessionError::Expired);
        }
        if !session.active {
            return Err(SessionError::Inactive);
        }
        Ok(session.clone())
    }

    /// Sweep against an explicit clock.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut retired = 0;
        for session in sessions.values_mut() {
            if session.active && session.is_expired_at(now, self.ttl) {
                session.active = false;
                retired += 1;
            }
        }
        if retired > 0 {
            info!(retired, "retired expired sessions");
        }
        retired
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, wallet: Address, tokens_escrowed: u64, network: &str) -> GameSession {
        let session = GameSession {
            id: Uuid::new_v4().to_string(),
            wallet,
            started_at: Utc::now(),
            tokens_escrowed,
            network: network.to_string(),
            active: true,
            prize_id: None,
            completed_at: None,
        };
        debug!(session_id = %session.id, wallet = %session.wallet, "session created");
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        session
    }

    async fn get(&self, id: &str) -> Option<GameSession> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn validate(&self, id: &str, wallet: &Address) -> Result<GameSession, SessionError> {
        self.validate_at(id, wallet, Utc::now()).await
    }

    async fn complete(&self, id: &str, prize_id: &str) -> Result<GameSession, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id).ok_or(SessionError::NotFound)?;
        if !session.active {
            return Err(SessionError::Inactive);
        }
        session.active = false;
        session.prize_id = Some(prize_id.to_string());
        session.completed_at = Some(Utc::now());
        debug!(session_id = %id, "session completed");
        Ok(session.clone())
    }

    async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now()).await
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet() -> Address {
        Address::parse("0x52908400098527886E0F7030069857D2E4169EE7").unwrap()
    }

    fn other_wallet() -> Address {
        Address::parse("0x8617E340B3D01FA5F11F306F4090FD50E238070D").unwrap()
    }

    #[tokio::test]
    async fn test_create_and_validate() {
        let store = InMemorySessionStore::new();
        let session = store.create(wallet(), 1, "base-sepolia").await;

        assert!(session.active);
        assert_eq!(session.tokens_escrowed, 1);

        let validated = store.validate(&session.id, &wallet()).await.unwrap();
        assert_eq!(validated.id, session.id);
    }

    #[tokio::test]
    async fn test_validate_unknown_session() {
        let store = InMemorySessionStore::new();
        let err = store.validate("missing", &wallet()).await.unwrap_err();
        assert_eq!(err, SessionError::NotFound);
        assert_eq!(err.reason(), "not_found");
    }

    #[tokio::test]
    async fn test_validate_wrong_wallet() {
        let store = InMemorySessionStore::new();
        let session = store.create(wallet(), 1, "base-sepolia").await;
        let err = store
            .validate(&session.id, &other_wallet())
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::AddressMismatch);
    }

    #[tokio::test]
    async fn test_complete_consumes_session() {
        let store = InMemorySessionStore::new();
        let session = store.create(wallet(), 1, "base-sepolia").await;

        let completed = store.complete(&session.id, "plush-bear").await.unwrap();
        assert!(!completed.active);
        assert!(completed.completed_at.is_some());

        let err = store.validate(&session.id, &wallet()).await.unwrap_err();
        assert_eq!(err, SessionError::Inactive);

        let err = store.complete(&session.id, "plush-bear").await.unwrap_err();
        assert_eq!(err, SessionError::Inactive);
    }

    #[tokio::test]
    async fn test_expiry_retires_session() {
        let store = InMemorySessionStore::with_ttl(Duration::seconds(10));
        let session = store.create(wallet(), 1, "base-sepolia").await;

        let later = Utc::now() + Duration::seconds(11);
        let err = store
            .validate_at(&session.id, &wallet(), later)
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::Expired);

        // The expiry flipped the session inactive, so a second check
        // reports inactive rather than expired
        let err = store
            .validate_at(&session.id, &wallet(), later)
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::Inactive);
    }

    #[tokio::test]
    async fn test_validate_at_expiry_boundary() {
        let store = InMemorySessionStore::with_ttl(Duration::seconds(10));
        let session = store.create(wallet(), 1, "base-sepolia").await;

        // Just under and exactly at the window the session still validates
        let just_under = session.started_at + Duration::seconds(9);
        assert!(store
            .validate_at(&session.id, &wallet(), just_under)
            .await
            .is_ok());
        let at_window = session.started_at + Duration::seconds(10);
        assert!(store
            .validate_at(&session.id, &wallet(), at_window)
            .await
            .is_ok());

        // One second past it the session expires
        let past = session.started_at + Duration::seconds(11);
        let err = store
            .validate_at(&session.id, &wallet(), past)
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::Expired);
    }

    #[tokio::test]
    async fn test_sweep_retires_only_expired() {
        let store = InMemorySessionStore::with_ttl(Duration::seconds(10));
        let old = store.create(wallet(), 1, "base-sepolia").await;
        let fresh = store.create(other_wallet(), 1, "base-sepolia").await;

        // Backdate one session past the TTL
        {
            let mut sessions = store.sessions.write().await;
            if let Some(s) = sessions.get_mut(&old.id) {
                s.started_at = Utc::now() - Duration::seconds(60);
            }
        }

        let retired = store.sweep_expired().await;
        assert_eq!(retired, 1);
        assert!(!store.get(&old.id).await.unwrap().active);
        assert!(store.get(&fresh.id).await.unwrap().active);

        // Sweeping again retires nothing new
        assert_eq!(store.sweep_expired().await, 0);
    }
}
