//! In-Play Prizes
//!
//! Prize instances spawned at the start of every play, placed by
//! geometry-aware rejection sampling that avoids the drop-zone exclusion
//! area and keeps padding between prizes.

use serde::{Deserialize, Serialize};

use crate::cabinet::config::{CabinetConfig, PrizeCatalog};
use crate::cabinet::perspective::{is_in_drop_zone, is_in_play_area, x_bounds_at_depth};
use crate::core::rng::GameRng;
use crate::core::vec2::Vec2;

/// One prize currently sitting in the cabinet.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrizeInstance {
    /// Catalog key this instance was stamped from.
    pub key: String,
    /// Rarity tag copied from the catalog.
    pub rarity: String,
    /// Grab-difficulty divisor copied from the catalog.
    pub grab_difficulty: f64,
    /// Spawned floor position.
    pub position: Vec2,
    /// Set when the claw has attached this prize.
    pub grabbed: bool,
}

impl PrizeInstance {
    /// Placement attempts per prize before giving up on padding.
    const MAX_PLACEMENT_ATTEMPTS: u32 = 64;
    /// Floor samples per placement before giving up entirely.
    const MAX_FLOOR_SAMPLES: u32 = 1024;
}

/// Spawn a fresh prize layout for one play.
///
/// Count is drawn from the configured range; positions are sampled inside
/// the play area, outside the drop zone, and at least `padding` apart.
/// If padding cannot be satisfied after bounded attempts the last valid
/// (unpadded) sample is used rather than failing the play.
pub fn spawn_prizes(
    config: &CabinetConfig,
    catalog: &PrizeCatalog,
    rng: &mut GameRng,
) -> Vec<PrizeInstance> {
    let count = rng.next_int_range(config.spawn.min_prizes, config.spawn.max_prizes);
    let mut prizes: Vec<PrizeInstance> = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let def = match rng.choose(&catalog.prizes) {
            Some(def) => def.clone(),
            None => break,
        };

        let mut chosen: Option<Vec2> = None;
        let mut fallback: Option<Vec2> = None;

        for _ in 0..PrizeInstance::MAX_PLACEMENT_ATTEMPTS {
            let Some(pos) = sample_floor_position(config, rng) else {
                break;
            };
            if fallback.is_none() {
                fallback = Some(pos);
            }
            let padded = prizes
                .iter()
                .all(|p| p.position.distance(pos) >= config.spawn.padding);
            if padded {
                chosen = Some(pos);
                break;
            }
        }

        let position = match chosen.or(fallback) {
            Some(pos) => pos,
            None => continue,
        };

        prizes.push(PrizeInstance {
            key: def.key,
            rarity: def.rarity,
            grab_difficulty: def.grab_difficulty,
            position,
            grabbed: false,
        });
    }

    prizes
}

/// Sample one valid floor position: in the play area (with wall padding
/// where the bounds allow it) and outside the drop zone.
///
/// Validated configs leave free floor outside the zone, so the bounded
/// rejection sampling below fails only for degenerate geometry. Returning
/// `None` then spawns fewer prizes instead of spinning forever.
fn sample_floor_position(config: &CabinetConfig, rng: &mut GameRng) -> Option<Vec2> {
    for _ in 0..PrizeInstance::MAX_FLOOR_SAMPLES {
        let y = rng.next_range(config.play_area.y_min, config.play_area.y_max);
        let bounds = x_bounds_at_depth(config, y);

        let pad = config.spawn.padding.min((bounds.max - bounds.min) / 4.0);
        let x = rng.next_range(bounds.min + pad, bounds.max - pad);
        let pos = Vec2::new(x, y);

        if is_in_play_area(config, pos) && !is_in_drop_zone(config, pos) {
            return Some(pos);
        }
    }
    None
}

// =============================================================================
// TESTS
// =============================================================================
