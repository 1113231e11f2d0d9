//! Claw State Machine
//!
//! Drives one play from the idle rail through drop, grab resolution and
//! the staged return to the chute. The engine owns the prize layout, the
//! play RNG and the replay recorder; callers feed it inputs and fixed
//! time steps and drain the events it emits.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cabinet::config::{CabinetConfig, PrizeCatalog};
use crate::cabinet::perspective::{
    can_grab, clamp_to_play_area, drop_zone_center, is_in_drop_zone, normalized_depth, project,
    ProjectionMode,
};
use crate::core::rng::{derive_play_seed, GameRng};
use crate::core::vec2::Vec2;
use crate::game::prize::{spawn_prizes, PrizeInstance};
use crate::game::replay::{
    GameInput, PhysicsSummary, PlayResult, ReplayData, ReplayRecorder, WonPrize,
};
use crate::GRAB_CHANCE_CEILING;

/// Seconds of travel applied per discrete directional input.
const INPUT_STEP_SECS: f64 = 0.1;

/// Where the claw is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum ClawPhase {
    /// On the rail, accepting directional input.
    Idle,
    /// Descending at the committed column.
    Dropping,
    /// At the floor, fingers closing. Resolves when the delay expires.
    Grabbing {
        /// Seconds until the grab resolves.
        delay: f64,
    },
    /// Carrying laterally toward the chute column.
    ReturningLateral,
    /// Carrying in depth toward the chute.
    ReturningDepth,
    /// Rising back to the rail.
    ReturningUp,
    /// Play over; presentation delay before the next play can begin.
    Complete {
        /// Final outcome.
        result: PlayResult,
        /// Seconds until the machine resets.
        delay: f64,
    },
}

/// The claw's kinematic state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClawState {
    /// Planar (lateral, depth) position.
    pub position: Vec2,
    /// Current visual height.
    pub height: f64,
}

/// Events emitted by [`ClawEngine::update`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum GameEvent {
    /// A new play began recording.
    PlayStarted {
        /// Session the play is bound to.
        session_id: String,
    },
    /// The player committed to a drop.
    DropCommitted,
    /// The grab attempt resolved.
    GrabResolved {
        /// Whether a prize attached.
        success: bool,
        /// Key of the attached prize, if any.
        prize: Option<String>,
    },
    /// A carried prize reached the chute.
    PrizeDelivered {
        /// Catalog key of the delivered prize.
        key: String,
    },
    /// The play finished and its replay is available.
    PlayCompleted {
        /// Final outcome.
        result: PlayResult,
    },
}

/// Probability that a grab attempt at `distance` from a prize succeeds.
///
/// Linear falloff from the ceiling at zero distance to zero at the grab
/// radius, divided by the prize's difficulty.
pub fn grab_chance(distance: f64, grab_radius: f64, grab_difficulty: f64) -> f64 {
    let proximity = (1.0 - distance / grab_radius).max(0.0);
    proximity * GRAB_CHANCE_CEILING / grab_difficulty
}

/// One cabinet running one play at a time.
pub struct ClawEngine {
    config: CabinetConfig,
    catalog: PrizeCatalog,
    rng: GameRng,
    prizes: Vec<PrizeInstance>,
    claw: ClawState,
    phase: ClawPhase,
    recorder: Option<ReplayRecorder>,
    held_prize: Option<usize>,
    elapsed_secs: f64,
    /// Engine-lifetime seconds at which the current recording opened.
    recording_base_secs: f64,
    started_at_ms: u64,
    last_replay: Option<ReplayData>,
}

impl ClawEngine {
    /// Create an engine and begin the first play.
    pub fn new(
        config: CabinetConfig,
        catalog: PrizeCatalog,
        session_id: String,
        started_at_ms: u64,
        seed: u64,
    ) -> Self {
        let mut rng = GameRng::new(seed);
        let prizes = spawn_prizes(&config, &catalog, &mut rng);
        let start = config.claw_start;
        let height = config.visual.idle_height.at(normalized_depth(&config, start.y));
        let recorder = ReplayRecorder::start(session_id, started_at_ms, &prizes);

        Self {
            config,
            catalog,
            rng,
            prizes,
            claw: ClawState {
                position: start,
                height,
            },
            phase: ClawPhase::Idle,
            recorder: Some(recorder),
            held_prize: None,
            elapsed_secs: 0.0,
            recording_base_secs: 0.0,
            started_at_ms,
            last_replay: None,
        }
    }

    /// Create an engine whose seed is derived from the session itself,
    /// so the layout is reproducible from data embedded in the replay.
    pub fn for_session(
        config: CabinetConfig,
        catalog: PrizeCatalog,
        session_id: String,
        started_at_ms: u64,
    ) -> Self {
        let seed = derive_play_seed(&session_id, started_at_ms);
        Self::new(config, catalog, session_id, started_at_ms, seed)
    }

    /// Current phase.
    pub fn phase(&self) -> ClawPhase {
        self.phase
    }

    /// Current claw state.
    pub fn claw(&self) -> ClawState {
        self.claw
    }

    /// Prizes currently in the cabinet.
    pub fn prizes(&self) -> &[PrizeInstance] {
        &self.prizes
    }

    /// Replay of the most recently completed play, if any. Consumes it.
    pub fn take_replay(&mut self) -> Option<ReplayData> {
        self.last_replay.take()
    }

    /// Milliseconds since the current recording opened, not since engine
    /// creation. Replay timestamps are relative to their own play.
    fn elapsed_ms(&self) -> u64 {
        ((self.elapsed_secs - self.recording_base_secs) * 1000.0) as u64
    }

    /// Apply one discrete input. Directional inputs move the claw along
    /// the rail; [`GameInput::Drop`] commits the descent. Inputs outside
    /// the idle phase are ignored.
    pub fn handle_input(&mut self, input: GameInput) -> Option<GameEvent> {
        if self.phase != ClawPhase::Idle {
            return None;
        }

        let step = self.config.physics.move_speed * INPUT_STEP_SECS;
        let pos = self.claw.position;
        let target = match input {
            GameInput::Left => Vec2::new(pos.x - step, pos.y),
            GameInput::Right => Vec2::new(pos.x + step, pos.y),
            GameInput::Forward => Vec2::new(pos.x, pos.y + step),
            GameInput::Backward => Vec2::new(pos.x, pos.y - step),
            GameInput::Drop => pos,
        };

        // The rail never leaves the play area, whatever the input says
        let clamped = clamp_to_play_area(&self.config, target);
        // Player steering never enters the chute exclusion zone; only the
        // scripted return after a grab may pass through it
        if input != GameInput::Drop && is_in_drop_zone(&self.config, clamped) {
            return None;
        }
        self.claw.position = clamped;
        self.claw.height = self
            .config
            .visual
            .idle_height
            .at(normalized_depth(&self.config, self.claw.position.y));

        let t_ms = self.elapsed_ms();
        let screen = project(&self.config, self.claw.position, ProjectionMode::Idle);
        if let Some(rec) = self.recorder.as_mut() {
            rec.record_input(input, t_ms, screen.x, self.claw.height);
        }

        if input == GameInput::Drop {
            debug!(x = self.claw.position.x, y = self.claw.position.y, "drop committed");
            self.phase = ClawPhase::Dropping;
            return Some(GameEvent::DropCommitted);
        }
        None
    }

    /// Advance the machine by `dt` seconds, returning any events.
    pub fn update(&mut self, dt: f64) -> Vec<GameEvent> {
        self.elapsed_secs += dt;
        let mut events = Vec::new();

        match self.phase {
            ClawPhase::Idle => {}
            ClawPhase::Dropping => self.update_dropping(dt),
            ClawPhase::Grabbing { delay } => self.update_grabbing(delay, dt, &mut events),
            ClawPhase::ReturningLateral => self.update_return_lateral(dt),
            ClawPhase::ReturningDepth => self.update_return_depth(dt),
            ClawPhase::ReturningUp => self.update_return_up(dt, &mut events),
            ClawPhase::Complete { result, delay } => {
                self.update_complete(result, delay, dt, &mut events)
            }
        }

        events
    }

    fn floor_height(&self) -> f64 {
        let t = normalized_depth(&self.config, self.claw.position.y);
        self.config.visual.drop_height.at(t)
    }

    fn rail_height(&self) -> f64 {
        let t = normalized_depth(&self.config, self.claw.position.y);
        self.config.visual.idle_height.at(t)
    }

    fn update_dropping(&mut self, dt: f64) {
        let floor = self.floor_height();
        self.claw.height -= self.config.physics.descent_speed * dt;
        if self.claw.height <= floor + self.config.physics.arrival_tolerance {
            self.claw.height = floor;
            self.phase = ClawPhase::Grabbing {
                delay: self.config.physics.grab_delay,
            };
        }
    }

    fn update_grabbing(&mut self, delay: f64, dt: f64, events: &mut Vec<GameEvent>) {
        let remaining = delay - dt;
        if remaining > 0.0 {
            self.phase = ClawPhase::Grabbing { delay: remaining };
            return;
        }
        self.resolve_grab(events);
    }

    /// Pick the best reachable prize, roll against its grab chance and
    /// route the claw accordingly.
    fn resolve_grab(&mut self, events: &mut Vec<GameEvent>) {
        let pos = self.claw.position;
        let radius = self.config.physics.grab_radius;

        let mut best: Option<(usize, f64)> = None;
        for (i, prize) in self.prizes.iter().enumerate() {
            if prize.grabbed || !can_grab(&self.config, pos, prize.position) {
                continue;
            }
            let d = pos.distance(prize.position);
            let chance = grab_chance(d, radius, prize.grab_difficulty);
            if best.map_or(true, |(_, c)| chance > c) {
                best = Some((i, chance));
            }
        }

        let drop_height = self.rail_height() - self.floor_height();
        let chance = best.map_or(0.0, |(_, c)| c);
        if let Some(rec) = self.recorder.as_mut() {
            rec.record_physics(PhysicsSummary {
                drop_depth: pos.y,
                drop_height,
                grab_strength: chance,
            });
        }

        let success = match best {
            Some((i, chance)) if self.rng.roll(chance) => {
                self.prizes[i].grabbed = true;
                self.held_prize = Some(i);
                Some(i)
            }
            _ => None,
        };

        match success {
            Some(i) => {
                let key = self.prizes[i].key.clone();
                debug!(prize = %key, chance, "grab succeeded");
                events.push(GameEvent::GrabResolved {
                    success: true,
                    prize: Some(key),
                });
                self.phase = ClawPhase::ReturningLateral;
            }
            None => {
                debug!(chance, "grab failed");
                events.push(GameEvent::GrabResolved {
                    success: false,
                    prize: None,
                });
                self.phase = ClawPhase::ReturningUp;
            }
        }
    }

    fn update_return_lateral(&mut self, dt: f64) {
        let chute = drop_zone_center(&self.config);
        let step = self.config.physics.return_speed * dt;
        let target = Vec2::new(chute.x, self.claw.position.y);
        let (next, arrived) = self.claw.position.step_toward(target, step);
        self.claw.position = next;
        self.carry_held_prize();
        if arrived {
            self.phase = ClawPhase::ReturningDepth;
        }
    }

    fn update_return_depth(&mut self, dt: f64) {
        let chute = drop_zone_center(&self.config);
        let step = self.config.physics.return_speed * dt;
        let (next, arrived) = self.claw.position.step_toward(chute, step);
        self.claw.position = next;
        self.claw.height = self.floor_height();
        self.carry_held_prize();
        if arrived {
            self.phase = ClawPhase::ReturningUp;
        }
    }

    fn update_return_up(&mut self, dt: f64, events: &mut Vec<GameEvent>) {
        let rail = self.rail_height();
        self.claw.height += self.config.physics.rise_speed * dt;
        if self.claw.height < rail - self.config.physics.arrival_tolerance {
            return;
        }
        self.claw.height = rail;

        match self.held_prize.take() {
            Some(i) => {
                let key = self.prizes[i].key.clone();
                events.push(GameEvent::PrizeDelivered { key });
                self.complete_play(PlayResult::Won, Some(i), events);
            }
            None => self.complete_play(PlayResult::Loss, None, events),
        }
    }

    fn complete_play(
        &mut self,
        result: PlayResult,
        won_index: Option<usize>,
        events: &mut Vec<GameEvent>,
    ) {
        let physics = self.recorder.as_ref().and_then(|r| r.physics());
        let won_prize = won_index.map(|i| {
            let prize = &self.prizes[i];
            WonPrize {
                key: prize.key.clone(),
                rarity: prize.rarity.clone(),
                accuracy: physics.map_or(0.0, |p| p.grab_strength),
            }
        });

        if let Some(rec) = self.recorder.take() {
            self.last_replay = Some(rec.finish(result, won_prize));
        }
        // Delivered prizes leave the cabinet
        if let Some(i) = won_index {
            self.prizes.remove(i);
        }

        events.push(GameEvent::PlayCompleted { result });
        let delay = match result {
            PlayResult::Won => self.config.physics.win_presentation_delay,
            PlayResult::Loss => self.config.physics.loss_reset_delay,
        };
        self.phase = ClawPhase::Complete { result, delay };
    }

    fn update_complete(
        &mut self,
        result: PlayResult,
        delay: f64,
        dt: f64,
        events: &mut Vec<GameEvent>,
    ) {
        let remaining = delay - dt;
        if remaining > 0.0 {
            self.phase = ClawPhase::Complete {
                result,
                delay: remaining,
            };
            return;
        }
        self.reset_for_next_play(events);
    }

    /// Reset the machine for the next play: claw back to start, a fresh
    /// layout, a new recording under a locally generated session id.
    fn reset_for_next_play(&mut self, events: &mut Vec<GameEvent>) {
        self.prizes = spawn_prizes(&self.config, &self.catalog, &mut self.rng);
        self.claw.position = self.config.claw_start;
        self.claw.height = self.rail_height();
        self.held_prize = None;

        let now_ms = self.started_at_ms + (self.elapsed_secs * 1000.0) as u64;
        self.recording_base_secs = self.elapsed_secs;
        let session_id = crate::game::replay::local_session_id(now_ms);
        self.recorder = Some(ReplayRecorder::start(
            session_id.clone(),
            now_ms,
            &self.prizes,
        ));
        self.phase = ClawPhase::Idle;
        events.push(GameEvent::PlayStarted { session_id });
    }

    fn carry_held_prize(&mut self) {
        if let Some(i) = self.held_prize {
            self.prizes[i].position = self.claw.position;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
