//! Static cabinet geometry and the perspective/coordinate engine.

pub mod config;
pub mod perspective;

pub use config::{CabinetConfig, ConfigError, PrizeCatalog, PrizeDef};
pub use perspective::{ProjectionMode, Projected, XBounds};
