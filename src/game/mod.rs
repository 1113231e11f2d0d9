//! Gameplay: prizes, the claw cycle and replay recording.

pub mod claw;
pub mod prize;
pub mod replay;

pub use claw::{grab_chance, ClawEngine, ClawPhase, ClawState, GameEvent};
pub use prize::{spawn_prizes, PrizeInstance};
pub use replay::{
    GameInput, PathSample, PhysicsSummary, PlayResult, ReplayData, ReplayRecorder, TimedInput,
    WonPrize,
};
