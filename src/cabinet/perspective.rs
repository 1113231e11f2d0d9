//! Coordinate / Perspective Engine
//!
//! Maps 2D (lateral, depth) game positions to rendered positions, scales
//! and depth-sort values, and answers containment and grab-range queries.
//! Every function is pure: output depends only on the config and inputs.

use serde::{Deserialize, Serialize};

use crate::cabinet::config::CabinetConfig;
use crate::core::vec2::Vec2;

/// Which depth-interpolated visual-height table a projection uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMode {
    /// Claw at its idle rail height.
    Idle,
    /// Claw lowered to the basin floor.
    Drop,
    /// Prize resting on the basin floor.
    Prize,
}

/// A projected screen-space point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projected {
    /// Screen x.
    pub x: f64,
    /// Screen y (the mode's visual height at this depth).
    pub y: f64,
    /// Sprite scale.
    pub scale: f64,
    /// Depth-sort value; larger draws in front.
    pub depth_order: f64,
}

/// Lateral bounds at a given depth.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct XBounds {
    /// Minimum lateral coordinate.
    pub min: f64,
    /// Maximum lateral coordinate.
    pub max: f64,
}

/// Normalized depth t = (y - y_min) / (y_max - y_min), clamped to [0, 1].
#[inline]
pub fn normalized_depth(config: &CabinetConfig, y: f64) -> f64 {
    let span = config.play_area.y_max - config.play_area.y_min;
    ((y - config.play_area.y_min) / span).clamp(0.0, 1.0)
}

/// Sprite scale at a depth. Linear between the configured front/back scales.
#[inline]
pub fn scale_at_depth(config: &CabinetConfig, y: f64) -> f64 {
    config.visual.scale.at(normalized_depth(config, y))
}

/// Lateral play-area bounds at a depth.
#[inline]
pub fn x_bounds_at_depth(config: &CabinetConfig, y: f64) -> XBounds {
    let t = normalized_depth(config, y);
    XBounds {
        min: config.play_area.x_min.at(t),
        max: config.play_area.x_max.at(t),
    }
}

/// Project a game position to screen space using the mode's height table.
pub fn project(config: &CabinetConfig, pos: Vec2, mode: ProjectionMode) -> Projected {
    let t = normalized_depth(config, pos.y);
    let height = match mode {
        ProjectionMode::Idle => config.visual.idle_height.at(t),
        ProjectionMode::Drop => config.visual.drop_height.at(t),
        ProjectionMode::Prize => config.visual.prize_height.at(t),
    };
    Projected {
        x: pos.x * config.visual.scale.at(normalized_depth(config, pos.y)),
        y: height,
        scale: scale_at_depth(config, pos.y),
        // Front of the cabinet draws over the back
        depth_order: config.play_area.y_max - pos.y,
    }
}

/// Is a position inside the play area (bounds interpolated at its depth)?
pub fn is_in_play_area(config: &CabinetConfig, pos: Vec2) -> bool {
    if pos.y < config.play_area.y_min || pos.y > config.play_area.y_max {
        return false;
    }
    let bounds = x_bounds_at_depth(config, pos.y);
    pos.x >= bounds.min && pos.x <= bounds.max
}

/// Is a position inside the drop-zone exclusion region?
pub fn is_in_drop_zone(config: &CabinetConfig, pos: Vec2) -> bool {
    if pos.y < config.drop_zone.y_min || pos.y > config.drop_zone.y_max {
        return false;
    }
    // Interpolate the zone's lateral extents by the zone's own depth span
    let span = config.drop_zone.y_max - config.drop_zone.y_min;
    let t = if span > 0.0 {
        ((pos.y - config.drop_zone.y_min) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    pos.x >= config.drop_zone.x_min.at(t) && pos.x <= config.drop_zone.x_max.at(t)
}

/// Geometric center of the drop zone at its chute depth. The claw is
/// autopiloted here after a successful grab.
pub fn drop_zone_center(config: &CabinetConfig) -> Vec2 {
    let zone = &config.drop_zone;
    let span = zone.y_max - zone.y_min;
    let t = if span > 0.0 {
        ((zone.chute_depth - zone.y_min) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let x = (zone.x_min.at(t) + zone.x_max.at(t)) / 2.0;
    Vec2::new(x, zone.chute_depth)
}

/// Can the claw grab a prize at this position? True iff the planar distance
/// is within the grab radius and the depth offset within tolerance.
pub fn can_grab(config: &CabinetConfig, claw_pos: Vec2, prize_pos: Vec2) -> bool {
    if (claw_pos.y - prize_pos.y).abs() > config.physics.grab_depth_tolerance {
        return false;
    }
    claw_pos.distance(prize_pos) <= config.physics.grab_radius
}

/// Clamp a position into the play area at its depth.
pub fn clamp_to_play_area(config: &CabinetConfig, pos: Vec2) -> Vec2 {
    let y = pos.y.clamp(config.play_area.y_min, config.play_area.y_max);
    let bounds = x_bounds_at_depth(config, y);
    Vec2::new(pos.x.clamp(bounds.min, bounds.max), y)
}

// =============================================================================
// TESTS
// =============================================================================
