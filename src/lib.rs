//! Clawcade
//!
//! A claw-machine game core with an anti-cheat win oracle. The game side
//! simulates a perspective cabinet: a claw steered over a trapezoid play
//! area, probability-gated grabs and a staged return to the prize chute,
//! all recorded into a deterministic replay. The server side validates
//! submitted replays, scores their difficulty, and issues signed win
//! vouchers an EVM-style settlement layer can verify and consume exactly
//! once.

pub mod api;
pub mod cabinet;
pub mod chain;
pub mod core;
pub mod game;
pub mod session;
pub mod voucher;

pub use cabinet::{CabinetConfig, PrizeCatalog};
pub use self::core::{Address, ContentHasher, GameRng, Hash256, Vec2};
pub use game::{ClawEngine, ClawPhase, GameEvent, GameInput, PlayResult, ReplayData};
pub use session::{GameSession, InMemorySessionStore, SessionStore};
pub use voucher::{issue_voucher, OracleSigner, SignedVoucher, WinVoucher};

/// Crate version, reported by the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Grab success probability at zero distance and difficulty 1. Every
/// grab chance scales down from here.
pub const GRAB_CHANCE_CEILING: f64 = 0.12;
