//! Cabinet and Prize Configuration
//!
//! Static geometry for the claw cabinet plus the prize catalog.
//! Loaded once at startup and never mutated. Malformed configuration is a
//! fatal setup error; a missing file falls back to the built-in default.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::vec2::Vec2;

/// Configuration errors. Fatal at setup, never downgraded silently.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid JSON for the expected schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Values fail geometric or numeric sanity checks.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// =============================================================================
// DEPTH-INTERPOLATED VALUES
// =============================================================================

/// A scalar that varies linearly between the cabinet front and back.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DepthSpan {
    /// Value at the front of the cabinet (y = y_min).
    pub front: f64,
    /// Value at the back of the cabinet (y = y_max).
    pub back: f64,
}

impl DepthSpan {
    /// Interpolate at normalized depth t in [0, 1]. Callers clamp t.
    #[inline]
    pub fn at(&self, t: f64) -> f64 {
        self.front + (self.back - self.front) * t
    }

    /// Constant value regardless of depth.
    pub const fn flat(value: f64) -> Self {
        Self {
            front: value,
            back: value,
        }
    }
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// Play-area bounds. Lateral extents narrow toward the back because of the
/// cabinet's perspective; depth extents are fixed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayArea {
    /// Front depth coordinate.
    pub y_min: f64,
    /// Back depth coordinate.
    pub y_max: f64,
    /// Minimum lateral coordinate, interpolated by depth.
    pub x_min: DepthSpan,
    /// Maximum lateral coordinate, interpolated by depth.
    pub x_max: DepthSpan,
}

/// Drop-zone exclusion region. Prizes never spawn here; the claw only
/// enters it during the scripted return-to-chute maneuver.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DropZone {
    /// Front depth extent of the zone.
    pub y_min: f64,
    /// Back depth extent of the zone.
    pub y_max: f64,
    /// Minimum lateral coordinate, interpolated by depth.
    pub x_min: DepthSpan,
    /// Maximum lateral coordinate, interpolated by depth.
    pub x_max: DepthSpan,
    /// Depth at which grabbed prizes are delivered.
    pub chute_depth: f64,
}

/// Depth-to-screen visual mapping.
///
/// Heights are screen-space values selected by projection mode: the claw's
/// idle rail, the basin floor it drops to, and the prize resting plane.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VisualMapping {
    /// Sprite scale, interpolated by depth.
    pub scale: DepthSpan,
    /// Claw idle-rail height, interpolated by depth.
    pub idle_height: DepthSpan,
    /// Basin-floor height the claw descends to, interpolated by depth.
    pub drop_height: DepthSpan,
    /// Prize resting height, interpolated by depth.
    pub prize_height: DepthSpan,
}

/// Motion and grab tunables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhysicsTunables {
    /// Lateral/depth movement speed in IDLE (units per second).
    pub move_speed: f64,
    /// Vertical descent speed while DROPPING (screen units per second).
    pub descent_speed: f64,
    /// Vertical rise speed while returning up (screen units per second).
    pub rise_speed: f64,
    /// Autopilot speed toward the chute (units per second).
    pub return_speed: f64,
    /// Planar radius within which a prize can be grabbed.
    pub grab_radius: f64,
    /// Depth tolerance for grab candidacy.
    pub grab_depth_tolerance: f64,
    /// Pause before the grab resolves (close animation), seconds.
    pub grab_delay: f64,
    /// Pause on a win before the overlay is shown, seconds.
    pub win_presentation_delay: f64,
    /// Pause on a loss before the machine resets, seconds.
    pub loss_reset_delay: f64,
    /// Arrival tolerance for height/position targets.
    pub arrival_tolerance: f64,
}

/// Prize spawn settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpawnConfig {
    /// Minimum prizes per play.
    pub min_prizes: u32,
    /// Maximum prizes per play.
    pub max_prizes: u32,
    /// Minimum spacing between spawned prizes and from walls.
    pub padding: f64,
}

/// Complete cabinet geometry. Immutable after load.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CabinetConfig {
    /// Play-area bounds.
    pub play_area: PlayArea,
    /// Drop-zone exclusion region.
    pub drop_zone: DropZone,
    /// Claw start position, also the reset position for every play.
    pub claw_start: Vec2,
    /// Depth-to-screen visual mapping.
    pub visual: VisualMapping,
    /// Motion and grab tunables.
    pub physics: PhysicsTunables,
    /// Prize spawn settings.
    pub spawn: SpawnConfig,
}

impl Default for CabinetConfig {
    fn default() -> Self {
        Self {
            play_area: PlayArea {
                y_min: 0.0,
                y_max: 100.0,
                x_min: DepthSpan {
                    front: -80.0,
                    back: -56.0,
                },
                x_max: DepthSpan {
                    front: 80.0,
                    back: 56.0,
                },
            },
            drop_zone: DropZone {
                y_min: 0.0,
                y_max: 28.0,
                x_min: DepthSpan {
                    front: -80.0,
                    back: -76.0,
                },
                x_max: DepthSpan {
                    front: -52.0,
                    back: -50.0,
                },
                chute_depth: 14.0,
            },
            claw_start: Vec2::new(0.0, 50.0),
            visual: VisualMapping {
                scale: DepthSpan {
                    front: 1.0,
                    back: 0.62,
                },
                idle_height: DepthSpan {
                    front: 170.0,
                    back: 210.0,
                },
                drop_height: DepthSpan {
                    front: 40.0,
                    back: 95.0,
                },
                prize_height: DepthSpan {
                    front: 48.0,
                    back: 100.0,
                },
            },
            physics: PhysicsTunables {
                move_speed: 60.0,
                descent_speed: 110.0,
                rise_speed: 130.0,
                return_speed: 75.0,
                grab_radius: 14.0,
                grab_depth_tolerance: 10.0,
                grab_delay: 0.45,
                win_presentation_delay: 1.2,
                loss_reset_delay: 0.8,
                arrival_tolerance: 0.5,
            },
            spawn: SpawnConfig {
                min_prizes: 5,
                max_prizes: 8,
                padding: 12.0,
            },
        }
    }
}

impl CabinetConfig {
    /// Load from a JSON file. Malformed content is a fatal error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file, falling back to the built-in default when the
    /// file is missing. A file that exists but fails validation is still a
    /// fatal error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("cabinet config {:?} not found, using default geometry", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Check geometric and numeric sanity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.play_area.y_max <= self.play_area.y_min {
            return Err(ConfigError::Invalid(
                "play area depth range is empty".into(),
            ));
        }
        if self.play_area.x_max.front <= self.play_area.x_min.front
            || self.play_area.x_max.back <= self.play_area.x_min.back
        {
            return Err(ConfigError::Invalid(
                "play area lateral bounds are inverted".into(),
            ));
        }
        if self.visual.scale.front <= 0.0 || self.visual.scale.back <= 0.0 {
            return Err(ConfigError::Invalid("scale must be positive".into()));
        }
        if self.physics.grab_radius <= 0.0 {
            return Err(ConfigError::Invalid("grab radius must be positive".into()));
        }
        if self.physics.move_speed <= 0.0
            || self.physics.descent_speed <= 0.0
            || self.physics.rise_speed <= 0.0
            || self.physics.return_speed <= 0.0
        {
            return Err(ConfigError::Invalid("speeds must be positive".into()));
        }
        if self.spawn.min_prizes == 0 || self.spawn.max_prizes < self.spawn.min_prizes {
            return Err(ConfigError::Invalid("prize count range is invalid".into()));
        }
        if self.drop_zone.chute_depth < self.drop_zone.y_min
            || self.drop_zone.chute_depth > self.drop_zone.y_max
        {
            return Err(ConfigError::Invalid(
                "chute depth lies outside the drop zone".into(),
            ));
        }
        // Prize spawning samples the floor outside the exclusion zone, so
        // the zone must not swallow the whole play area
        let covers_depth = self.drop_zone.y_min <= self.play_area.y_min
            && self.drop_zone.y_max >= self.play_area.y_max;
        let covers_lateral = self.drop_zone.x_min.front <= self.play_area.x_min.front
            && self.drop_zone.x_min.back <= self.play_area.x_min.back
            && self.drop_zone.x_max.front >= self.play_area.x_max.front
            && self.drop_zone.x_max.back >= self.play_area.x_max.back;
        if covers_depth && covers_lateral {
            return Err(ConfigError::Invalid(
                "drop zone covers the entire play area".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// PRIZE CATALOG
// =============================================================================

/// One prize definition from the catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrizeDef {
    /// Catalog key, unique within the catalog.
    pub key: String,
    /// Rarity tag (e.g. "common", "rare", "legendary").
    pub rarity: String,
    /// Grab-difficulty divisor; higher is harder. Must be >= 1.
    pub grab_difficulty: f64,
    /// Optional trait categories; each lists options in increasing rarity.
    /// BTreeMap so trait derivation iterates categories in a fixed order.
    #[serde(default)]
    pub trait_categories: BTreeMap<String, Vec<String>>,
}

/// The static prize catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrizeCatalog {
    /// All prize definitions.
    pub prizes: Vec<PrizeDef>,
}

impl Default for PrizeCatalog {
    fn default() -> Self {
        let traits_plush: BTreeMap<String, Vec<String>> = [
            (
                "fur".to_string(),
                vec![
                    "tan".to_string(),
                    "cocoa".to_string(),
                    "silver".to_string(),
                    "golden".to_string(),
                ],
            ),
            (
                "eyes".to_string(),
                vec![
                    "button".to_string(),
                    "glass".to_string(),
                    "starlit".to_string(),
                ],
            ),
        ]
        .into_iter()
        .collect();

        Self {
            prizes: vec![
                PrizeDef {
                    key: "plush-bear".to_string(),
                    rarity: "common".to_string(),
                    grab_difficulty: 1.0,
                    trait_categories: traits_plush,
                },
                PrizeDef {
                    key: "plush-cat".to_string(),
                    rarity: "common".to_string(),
                    grab_difficulty: 1.5,
                    trait_categories: BTreeMap::new(),
                },
                PrizeDef {
                    key: "arcade-orb".to_string(),
                    rarity: "rare".to_string(),
                    grab_difficulty: 2.5,
                    trait_categories: [(
                        "glow".to_string(),
                        vec![
                            "dim".to_string(),
                            "bright".to_string(),
                            "radiant".to_string(),
                        ],
                    )]
                    .into_iter()
                    .collect(),
                },
                PrizeDef {
                    key: "gilded-claw".to_string(),
                    rarity: "legendary".to_string(),
                    grab_difficulty: 4.0,
                    trait_categories: BTreeMap::new(),
                },
            ],
        }
    }
}

impl PrizeCatalog {
    /// Load from a JSON file. Malformed content is a fatal error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let catalog: Self = serde_json::from_str(&text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load with default fallback when the file is missing.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("prize catalog {:?} not found, using default catalog", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Check catalog sanity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prizes.is_empty() {
            return Err(ConfigError::Invalid("prize catalog is empty".into()));
        }
        for prize in &self.prizes {
            if prize.key.is_empty() {
                return Err(ConfigError::Invalid("prize key is empty".into()));
            }
            if prize.grab_difficulty < 1.0 {
                return Err(ConfigError::Invalid(format!(
                    "prize {} has grab_difficulty < 1",
                    prize.key
                )));
            }
            if prize.trait_categories.values().any(|opts| opts.is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "prize {} has an empty trait category",
                    prize.key
                )));
            }
        }
        Ok(())
    }

    /// Look up a prize by catalog key.
    pub fn get(&self, key: &str) -> Option<&PrizeDef> {
        self.prizes.iter().find(|p| p.key == key)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        CabinetConfig::default().validate().unwrap();
        PrizeCatalog::default().validate().unwrap();
    }

    #[test]
    fn test_depth_span_interpolation() {
        let span = DepthSpan {
            front: 10.0,
            back: 20.0,
        };
        assert_eq!(span.at(0.0), 10.0);
        assert_eq!(span.at(1.0), 20.0);
        assert_eq!(span.at(0.5), 15.0);
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = CabinetConfig::default();
        config.play_area.x_max = DepthSpan::flat(-100.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_depth_range() {
        let mut config = CabinetConfig::default();
        config.play_area.y_max = config.play_area.y_min;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_spawn_range() {
        let mut config = CabinetConfig::default();
        config.spawn.min_prizes = 6;
        config.spawn.max_prizes = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_drop_zone_covering_floor() {
        let mut config = CabinetConfig::default();
        config.drop_zone.y_min = config.play_area.y_min;
        config.drop_zone.y_max = config.play_area.y_max;
        config.drop_zone.x_min = config.play_area.x_min;
        config.drop_zone.x_max = config.play_area.x_max;
        config.drop_zone.chute_depth = 14.0;
        assert!(config.validate().is_err());

        // A zone that spans the full depth but not the full width is fine
        let mut config = CabinetConfig::default();
        config.drop_zone.y_max = config.play_area.y_max;
        config.validate().unwrap();
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = PrizeCatalog::default();
        assert!(catalog.get("plush-bear").is_some());
        assert!(catalog.get("nonexistent").is_none());
    }

    #[test]
    fn test_catalog_rejects_low_difficulty() {
        let mut catalog = PrizeCatalog::default();
        catalog.prizes[0].grab_difficulty = 0.5;
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let config = CabinetConfig::load_or_default("/nonexistent/cabinet.json").unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = CabinetConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: CabinetConfig = serde_json::from_str(&json).unwrap();
        back.validate().unwrap();
        assert_eq!(back.claw_start, config.claw_start);
    }
}
