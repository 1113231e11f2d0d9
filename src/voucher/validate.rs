//! Replay Validation and Difficulty Scoring
//!
//! Structural checks on a submitted replay, binding it to the claimed
//! session, and the 1-10 difficulty score derived from the recorded
//! physics. Every rejection carries a stable machine-readable reason.

use thiserror::Error;
use tracing::debug;

use crate::cabinet::config::CabinetConfig;
use crate::game::replay::{GameInput, PlayResult, ReplayData};

/// Why a replay was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The replay is structurally unusable.
    #[error("replay is malformed: {0}")]
    MalformedReplay(&'static str),
    /// The replay does not belong to the claimed session.
    #[error("replay does not belong to this session")]
    SessionMismatch,
    /// The replay does not show a win.
    #[error("replay does not show a win")]
    NotAWin,
}

impl ValidationError {
    /// Stable machine-readable reason string for API responses.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::MalformedReplay(_) => "malformed_replay",
            ValidationError::SessionMismatch => "session_mismatch",
            ValidationError::NotAWin => "not_a_win",
        }
    }
}

/// Check that a replay is well-formed, belongs to `session_id` and shows
/// a win. Malformed checks run first so a corrupt replay never reports a
/// softer reason.
pub fn validate_replay(replay: &ReplayData, session_id: &str) -> Result<(), ValidationError> {
    if replay.session_id.is_empty() || replay.started_at_ms == 0 {
        return Err(ValidationError::MalformedReplay("missing session header"));
    }
    if replay.inputs.is_empty() {
        return Err(ValidationError::MalformedReplay("no inputs"));
    }
    if replay.claw_path.len() != replay.inputs.len() {
        return Err(ValidationError::MalformedReplay(
            "path and input counts disagree",
        ));
    }
    let monotone = replay
        .inputs
        .windows(2)
        .all(|pair| pair[0].t_ms <= pair[1].t_ms);
    if !monotone {
        return Err(ValidationError::MalformedReplay(
            "input timestamps go backwards",
        ));
    }
    if !replay.inputs.iter().any(|i| i.input == GameInput::Drop) {
        return Err(ValidationError::MalformedReplay("no drop input"));
    }

    if replay.session_id != session_id {
        debug!(
            claimed = %session_id,
            recorded = %replay.session_id,
            "replay bound to a different session"
        );
        return Err(ValidationError::SessionMismatch);
    }

    if replay.result != PlayResult::Won {
        return Err(ValidationError::NotAWin);
    }
    let won = replay
        .won_prize
        .as_ref()
        .ok_or(ValidationError::MalformedReplay("win without a prize"))?;
    if won.key.is_empty() {
        return Err(ValidationError::MalformedReplay("win without a prize"));
    }
    let physics = replay
        .physics
        .ok_or(ValidationError::MalformedReplay("win without physics"))?;
    if !(physics.grab_strength > 0.0) {
        return Err(ValidationError::MalformedReplay(
            "win with zero grab strength",
        ));
    }

    Ok(())
}

// Scoring buckets. Tuned constants, not a model.
const DROP_HEIGHT_BUCKETS: [f64; 3] = [0.75, 0.5, 0.25];
const GRAB_STRENGTH_BUCKETS: [f64; 3] = [0.01, 0.02, 0.04];
const PATH_LENGTH_BUCKETS: [usize; 3] = [40, 20, 8];

/// Score a validated winning replay on the 1-10 difficulty scale.
///
/// Three independent buckets contribute 0-3 points each: how far the
/// claw descended (normalized to the cabinet's tallest descent), how
/// slim the recorded grab chance was, and how long the maneuvering path
/// ran. The result is `clamp(1 + score, 1, 10)`.
pub fn score_difficulty(config: &CabinetConfig, replay: &ReplayData) -> u8 {
    let (drop_bucket, strength_bucket) = match replay.physics {
        Some(p) => {
            let span = max_descent_span(config);
            let normalized = if span > 0.0 {
                (p.drop_height / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            (
                bucket_at_least(normalized, &DROP_HEIGHT_BUCKETS),
                bucket_at_most(p.grab_strength, &GRAB_STRENGTH_BUCKETS),
            )
        }
        None => (0, 0),
    };
    let path_bucket = PATH_LENGTH_BUCKETS
        .iter()
        .position(|&min| replay.claw_path.len() >= min)
        .map_or(0, |i| (3 - i) as u8);

    let score = drop_bucket + strength_bucket + path_bucket;
    (1 + score).clamp(1, 10)
}

/// Tallest idle-to-floor descent anywhere in the cabinet.
fn max_descent_span(config: &CabinetConfig) -> f64 {
    let front = config.visual.idle_height.front - config.visual.drop_height.front;
    let back = config.visual.idle_height.back - config.visual.drop_height.back;
    front.max(back)
}

fn bucket_at_least(value: f64, thresholds: &[f64; 3]) -> u8 {
    thresholds
        .iter()
        .position(|&min| value >= min)
        .map_or(0, |i| (3 - i) as u8)
}

fn bucket_at_most(value: f64, thresholds: &[f64; 3]) -> u8 {
    thresholds
        .iter()
        .position(|&max| value <= max)
        .map_or(0, |i| (3 - i) as u8)
}

// =============================================================================
// TESTS
// =============================================================================
