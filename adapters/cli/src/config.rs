//! Game configuration loaded from an optional TOML file.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use geocache_core::{
    GeoGrid, GeoPoint, TokenValue, DEFAULT_INTERACTION_RADIUS, DEFAULT_ORIGIN, DEFAULT_START,
    DEFAULT_TILE_DEGREES, DEFAULT_VICTORY_THRESHOLD,
};
use geocache_system_spawning::Config as SpawningConfig;
use geocache_world::WorldConfig;
use serde::Deserialize;

/// Finest tile accepted; keeps every cell index on the globe inside `i32`.
const MIN_TILE_DEGREES: f64 = 1e-6;

/// Complete game configuration; every field falls back to its default.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameConfig {
    pub(crate) world: WorldSection,
    pub(crate) spawning: SpawningSection,
    pub(crate) viewport: ViewportSection,
}

/// Grid geometry and gameplay constants.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct WorldSection {
    /// Grid origin as `[lat, lng]`.
    pub(crate) origin: [f64; 2],
    pub(crate) tile_degrees: f64,
    pub(crate) interaction_radius: f64,
    pub(crate) victory_threshold: u32,
    /// Player start as `[lat, lng]`.
    pub(crate) start: [f64; 2],
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            origin: [DEFAULT_ORIGIN.lat(), DEFAULT_ORIGIN.lng()],
            tile_degrees: DEFAULT_TILE_DEGREES,
            interaction_radius: DEFAULT_INTERACTION_RADIUS,
            victory_threshold: DEFAULT_VICTORY_THRESHOLD.get(),
            start: [DEFAULT_START.lat(), DEFAULT_START.lng()],
        }
    }
}

/// Parameters of the spawn oracle.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SpawningSection {
    pub(crate) probability: f64,
    pub(crate) exponent_min: i32,
    pub(crate) exponent_max: i32,
    pub(crate) seed: u64,
}

impl Default for SpawningSection {
    fn default() -> Self {
        let defaults = SpawningConfig::default();
        Self {
            probability: defaults.spawn_probability(),
            exponent_min: defaults.exponent_min(),
            exponent_max: defaults.exponent_max(),
            seed: defaults.rng_seed(),
        }
    }
}

/// Extent of the viewport kept centred on the player, in tiles from the centre.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ViewportSection {
    pub(crate) half_height_tiles: f64,
    pub(crate) half_width_tiles: f64,
}

impl Default for ViewportSection {
    fn default() -> Self {
        Self {
            half_height_tiles: 4.0,
            half_width_tiles: 8.0,
        }
    }
}

impl GameConfig {
    /// Loads the configuration at `path`, or the defaults when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid config at {}", path.display()))
    }

    /// Parses and validates a TOML document.
    pub(crate) fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("failed to parse config toml")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let world = &self.world;
        if !(world.tile_degrees.is_finite() && world.tile_degrees >= MIN_TILE_DEGREES) {
            bail!(
                "tile_degrees must be at least {MIN_TILE_DEGREES}, got {}",
                world.tile_degrees
            );
        }
        for (name, [lat, lng]) in [("origin", world.origin), ("start", world.start)] {
            if !((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)) {
                bail!("{name} [{lat}, {lng}] is not a valid latitude and longitude");
            }
        }
        if !(world.interaction_radius.is_finite() && world.interaction_radius >= 0.0) {
            bail!(
                "interaction_radius must not be negative, got {}",
                world.interaction_radius
            );
        }
        if TokenValue::new(world.victory_threshold).is_none() {
            bail!("victory_threshold must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.spawning.probability) {
            bail!(
                "spawn probability must lie in [0, 1], got {}",
                self.spawning.probability
            );
        }
        if self.spawning.exponent_max <= self.spawning.exponent_min {
            bail!(
                "exponent range [{}, {}) is empty",
                self.spawning.exponent_min,
                self.spawning.exponent_max
            );
        }
        let viewport = &self.viewport;
        if !(viewport.half_height_tiles > 0.0 && viewport.half_width_tiles > 0.0) {
            bail!("viewport half extents must be positive");
        }
        Ok(())
    }

    /// World configuration derived from the `world` section.
    pub(crate) fn world_config(&self) -> Result<WorldConfig> {
        let world = &self.world;
        let Some(threshold) = TokenValue::new(world.victory_threshold) else {
            bail!("victory_threshold must be at least 1");
        };
        let grid = GeoGrid::new(
            GeoPoint::new(world.origin[0], world.origin[1]),
            world.tile_degrees,
        );
        Ok(WorldConfig::new(
            grid,
            world.interaction_radius,
            threshold,
            GeoPoint::new(world.start[0], world.start[1]),
        ))
    }

    /// Spawning configuration derived from the `spawning` section.
    pub(crate) fn spawning_config(&self) -> SpawningConfig {
        let spawning = &self.spawning;
        SpawningConfig::new(
            spawning.probability,
            spawning.exponent_min,
            spawning.exponent_max,
            spawning.seed,
        )
    }

    /// Half extents of the viewport in degrees, latitude first.
    pub(crate) fn viewport_half_extents(&self) -> (f64, f64) {
        let tile = self.world.tile_degrees;
        (
            self.viewport.half_height_tiles * tile,
            self.viewport.half_width_tiles * tile,
        )
    }
}

#[cfg(test)]
mod tests {
    use geocache_core::DEFAULT_SPAWN_PROBABILITY;

    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = GameConfig::from_toml_str("").expect("defaults");
        assert_eq!(config, GameConfig::default());
        assert_eq!(
            config.spawning_config(),
            SpawningConfig::default(),
            "defaults must agree with the spawning crate"
        );
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = GameConfig::from_toml_str(
            r#"
            [world]
            victory_threshold = 8
            start = [1.0, 2.0]

            [spawning]
            seed = 42
            "#,
        )
        .expect("valid config");

        assert_eq!(config.world.victory_threshold, 8);
        assert_eq!(config.world.tile_degrees, DEFAULT_TILE_DEGREES);
        assert_eq!(config.spawning.seed, 42);
        assert_eq!(config.spawning.probability, DEFAULT_SPAWN_PROBABILITY);

        let world = config.world_config().expect("world config");
        assert_eq!(world.start(), GeoPoint::new(1.0, 2.0));
        assert_eq!(world.victory_threshold().get(), 8);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(GameConfig::from_toml_str("[world]\nvictory_threshold = 0").is_err());
        assert!(GameConfig::from_toml_str("[world]\ntile_degrees = -1.0").is_err());
        assert!(GameConfig::from_toml_str("[spawning]\nprobability = 1.5").is_err());
        assert!(
            GameConfig::from_toml_str("[spawning]\nexponent_min = 3\nexponent_max = 3").is_err()
        );
        assert!(GameConfig::from_toml_str("[world]\nunknown = 1").is_err());
        assert!(GameConfig::from_toml_str("[world]\ntile_degrees = 1e-9").is_err());
        assert!(GameConfig::from_toml_str("[world]\nstart = [95.0, 0.0]").is_err());
        assert!(GameConfig::from_toml_str("[world]\norigin = [0.0, -200.0]").is_err());
    }

    #[test]
    fn viewport_extents_scale_with_tile_size() {
        let config = GameConfig::from_toml_str(
            "[world]\ntile_degrees = 0.5\n[viewport]\nhalf_height_tiles = 2.0\nhalf_width_tiles = 3.0",
        )
        .expect("valid config");
        assert_eq!(config.viewport_half_extents(), (1.0, 1.5));
    }
}
