//! Replay Recording
//!
//! Captures a deterministic, serializable trace of one play: inputs,
//! sampled claw path, initial prize layout and outcome. The completed
//! `ReplayData` is the sole evidence submitted for win validation.
//!
//! One recorder exists per active play and is owned by the engine
//! instance, never shared between plays.

use serde::{Deserialize, Serialize};

use crate::core::hash::{ContentHasher, Hash256};
use crate::core::vec2::Vec2;
use crate::game::prize::PrizeInstance;

/// A directional or drop input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameInput {
    /// Move the claw laterally toward negative x.
    Left,
    /// Move the claw laterally toward positive x.
    Right,
    /// Move the claw deeper into the cabinet.
    Forward,
    /// Move the claw toward the front glass.
    Backward,
    /// Commit to a drop at the current column.
    Drop,
}

impl GameInput {
    /// Stable tag byte for content hashing.
    pub fn tag(self) -> u8 {
        match self {
            GameInput::Left => 0,
            GameInput::Right => 1,
            GameInput::Forward => 2,
            GameInput::Backward => 3,
            GameInput::Drop => 4,
        }
    }
}

/// One recorded input with its timestamp relative to recording start.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedInput {
    /// The input.
    pub input: GameInput,
    /// Milliseconds since recording start.
    pub t_ms: u64,
}

/// A prize position captured at play start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialPrize {
    /// Catalog key.
    pub key: String,
    /// Spawn position.
    pub position: Vec2,
}

/// One sampled claw screen position, appended on every recorded input.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathSample {
    /// Screen x.
    pub x: f64,
    /// Screen y.
    pub y: f64,
    /// Milliseconds since recording start.
    pub t_ms: u64,
}

/// Physics measurements captured at the grab attempt, used for difficulty
/// scoring on the validation side.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicsSummary {
    /// Depth column the drop happened at.
    pub drop_depth: f64,
    /// Visual height descended from the idle rail to the basin floor.
    pub drop_height: f64,
    /// The grab chance the winning roll was drawn against.
    pub grab_strength: f64,
}

/// Final outcome of a play.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayResult {
    /// A prize was delivered to the chute.
    Won,
    /// The claw came back empty.
    Loss,
}

/// Details of the prize that was won.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WonPrize {
    /// Catalog key.
    pub key: String,
    /// Rarity tag.
    pub rarity: String,
    /// The grab chance that produced the win (positional accuracy proxy).
    pub accuracy: f64,
}

/// The complete trace of one play. Immutable once the play ends.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayData {
    /// Session identifier this play belongs to.
    pub session_id: String,
    /// Unix milliseconds at recording start.
    pub started_at_ms: u64,
    /// Ordered, timestamped inputs.
    pub inputs: Vec<TimedInput>,
    /// Prize layout at play start.
    pub initial_prizes: Vec<InitialPrize>,
    /// Sampled claw screen path.
    pub claw_path: Vec<PathSample>,
    /// Grab-attempt physics, present once a drop has resolved.
    pub physics: Option<PhysicsSummary>,
    /// Outcome.
    pub result: PlayResult,
    /// Won-prize details, present iff `result == Won`.
    pub won_prize: Option<WonPrize>,
}

impl ReplayData {
    /// Canonical content hash over every field, in fixed order.
    ///
    /// This value is embedded in the voucher, so the encoding is a wire
    /// contract: any field change must change the hash.
    pub fn content_hash(&self) -> Hash256 {
        let mut h = ContentHasher::for_replay();
        h.update_str(&self.session_id);
        h.update_u64(self.started_at_ms);

        h.update_u32(self.inputs.len() as u32);
        for input in &self.inputs {
            h.update_u8(input.input.tag());
            h.update_u64(input.t_ms);
        }

        h.update_u32(self.initial_prizes.len() as u32);
        for prize in &self.initial_prizes {
            h.update_str(&prize.key);
            h.update_f64(prize.position.x);
            h.update_f64(prize.position.y);
        }

        h.update_u32(self.claw_path.len() as u32);
        for sample in &self.claw_path {
            h.update_f64(sample.x);
            h.update_f64(sample.y);
            h.update_u64(sample.t_ms);
        }

        match &self.physics {
            Some(p) => {
                h.update_bool(true);
                h.update_f64(p.drop_depth);
                h.update_f64(p.drop_height);
                h.update_f64(p.grab_strength);
            }
            None => h.update_bool(false),
        }

        h.update_u8(match self.result {
            PlayResult::Won => 1,
            PlayResult::Loss => 0,
        });

        match &self.won_prize {
            Some(w) => {
                h.update_bool(true);
                h.update_str(&w.key);
                h.update_str(&w.rarity);
                h.update_f64(w.accuracy);
            }
            None => h.update_bool(false),
        }

        h.finalize()
    }
}

// =============================================================================
// RECORDER
// =============================================================================

/// Records exactly one play. Opened when the machine enters IDLE for a new
/// play, closed when the play completes; mutation is rejected after close.
#[derive(Clone, Debug)]
pub struct ReplayRecorder {
    data: ReplayData,
    open: bool,
}

impl ReplayRecorder {
    /// Start a new recording.
    ///
    /// `session_id` is the server-issued session when playing online;
    /// offline plays pass a locally generated id (see [`local_session_id`]).
    pub fn start(session_id: String, started_at_ms: u64, prizes: &[PrizeInstance]) -> Self {
        let initial_prizes = prizes
            .iter()
            .map(|p| InitialPrize {
                key: p.key.clone(),
                position: p.position,
            })
            .collect();

        Self {
            data: ReplayData {
                session_id,
                started_at_ms,
                inputs: Vec::new(),
                initial_prizes,
                claw_path: Vec::new(),
                physics: None,
                result: PlayResult::Loss,
                won_prize: None,
            },
            open: true,
        }
    }

    /// Is the recording still open?
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Session id this recording is bound to.
    pub fn session_id(&self) -> &str {
        &self.data.session_id
    }

    /// Record an input and the claw's screen position at that moment.
    /// Ignored once the recording is closed.
    pub fn record_input(&mut self, input: GameInput, t_ms: u64, screen_x: f64, screen_y: f64) {
        if !self.open {
            return;
        }
        self.data.inputs.push(TimedInput { input, t_ms });
        self.data.claw_path.push(PathSample {
            x: screen_x,
            y: screen_y,
            t_ms,
        });
    }

    /// Physics measurements recorded so far.
    pub fn physics(&self) -> Option<PhysicsSummary> {
        self.data.physics
    }

    /// Record the grab-attempt physics measurements.
    pub fn record_physics(&mut self, physics: PhysicsSummary) {
        if !self.open {
            return;
        }
        self.data.physics = Some(physics);
    }

    /// Close the recording with its final outcome and return the trace.
    /// Further mutation is impossible; the recorder is consumed.
    pub fn finish(mut self, result: PlayResult, won_prize: Option<WonPrize>) -> ReplayData {
        self.data.result = result;
        self.data.won_prize = won_prize;
        self.open = false;
        self.data
    }
}

/// Generate a locally unique session id: millisecond timestamp plus a
/// random suffix.
pub fn local_session_id(now_ms: u64) -> String {
    format!("{}-{:08x}", now_ms, rand::random::<u32>())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_prizes() -> Vec<PrizeInstance> {
        vec![PrizeInstance {
            key: "plush-bear".to_string(),
            rarity: "common".to_string(),
            grab_difficulty: 1.0,
            position: Vec2::new(10.0, 40.0),
            grabbed: false,
        }]
    }

    fn sample_replay() -> ReplayData {
        let mut rec = ReplayRecorder::start("sess-1".to_string(), 1700000000000, &sample_prizes());
        rec.record_input(GameInput::Left, 100, -5.0, 170.0);
        rec.record_input(GameInput::Drop, 900, -10.0, 170.0);
        rec.record_physics(PhysicsSummary {
            drop_depth: 40.0,
            drop_height: 120.0,
            grab_strength: 0.08,
        });
        rec.finish(
            PlayResult::Won,
            Some(WonPrize {
                key: "plush-bear".to_string(),
                rarity: "common".to_string(),
                accuracy: 0.08,
            }),
        )
    }

    #[test]
    fn test_recorder_open_until_finished() {
        let mut rec = ReplayRecorder::start("sess-1".to_string(), 1700000000000, &sample_prizes());
        assert!(rec.is_open());
        assert_eq!(rec.session_id(), "sess-1");

        rec.record_input(GameInput::Drop, 100, 0.0, 170.0);
        let replay = rec.finish(PlayResult::Loss, None);

        // A cloned recorder that was closed rejects further mutation
        let mut closed = ReplayRecorder {
            data: replay,
            open: false,
        };
        closed.record_input(GameInput::Left, 200, 0.0, 170.0);
        closed.record_physics(PhysicsSummary {
            drop_depth: 1.0,
            drop_height: 1.0,
            grab_strength: 0.1,
        });
        assert_eq!(closed.data.inputs.len(), 1);
        assert!(closed.data.physics.is_none());
    }

    #[test]
    fn test_recorder_captures_layout_and_inputs() {
        let replay = sample_replay();
        assert_eq!(replay.initial_prizes.len(), 1);
        assert_eq!(replay.inputs.len(), 2);
        assert_eq!(replay.claw_path.len(), 2);
        assert_eq!(replay.result, PlayResult::Won);
        assert!(replay.physics.is_some());
    }

    #[test]
    fn test_input_and_path_timestamps_align() {
        let replay = sample_replay();
        for (input, sample) in replay.inputs.iter().zip(replay.claw_path.iter()) {
            assert_eq!(input.t_ms, sample.t_ms);
        }
    }

    #[test]
    fn test_content_hash_stable() {
        let a = sample_replay();
        let b = sample_replay();
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_content_hash_sensitive_to_fields() {
        let base = sample_replay();

        let mut changed = base.clone();
        changed.session_id = "sess-2".to_string();
        assert_ne!(base.content_hash(), changed.content_hash());

        let mut changed = base.clone();
        changed.result = PlayResult::Loss;
        assert_ne!(base.content_hash(), changed.content_hash());

        let mut changed = base.clone();
        changed.inputs[0].t_ms += 1;
        assert_ne!(base.content_hash(), changed.content_hash());

        let mut changed = base.clone();
        changed.physics = None;
        assert_ne!(base.content_hash(), changed.content_hash());
    }

    #[test]
    fn test_local_session_ids_unique() {
        let a = local_session_id(1700000000000);
        let b = local_session_id(1700000000000);
        assert_ne!(a, b);
        assert!(a.starts_with("1700000000000-"));
    }

    #[test]
    fn test_replay_json_round_trip() {
        let replay = sample_replay();
        let json = serde_json::to_string(&replay).unwrap();
        let back: ReplayData = serde_json::from_str(&json).unwrap();
        assert_eq!(replay.content_hash(), back.content_hash());
    }
}
