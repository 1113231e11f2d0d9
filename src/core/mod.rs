//! Deterministic primitives: vectors, RNG, hashing, addresses.

pub mod address;
pub mod hash;
pub mod rng;
pub mod vec2;

pub use address::Address;
pub use hash::{ContentHasher, Hash256};
pub use rng::GameRng;
pub use vec2::Vec2;
