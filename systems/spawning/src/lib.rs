#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic spawning system responsible for emitting cache spawn commands.
//!
//! Whenever the world announces a new viewport the system scans every cell
//! touched by the viewport plus a one-tile margin, asks the luck function
//! whether the cell hosts a cache, and requests a spawn for each selected cell
//! that is not already active. The world restores stowed contents or seeds a
//! fresh cache from the proposed starting value.

mod luck;

use std::collections::BTreeSet;

use geocache_core::{
    CellCoord, Command, Event, GeoBounds, GeoGrid, TokenValue, DEFAULT_SPAWN_PROBABILITY,
};
use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub use luck::{cell_luck, luck, selects};

/// Number of extra tiles scanned on every side of the viewport.
pub const SCAN_MARGIN_TILES: i32 = 1;

const DEFAULT_EXPONENT_MIN: i32 = -1;
const DEFAULT_EXPONENT_MAX: i32 = 3;
const DEFAULT_RNG_SEED: u64 = 0x6765_6f63_6163_6865;

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    spawn_probability: f64,
    exponent_min: i32,
    exponent_max: i32,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration.
    ///
    /// Starting tokens carry `2^k` where `k` is drawn from
    /// `exponent_min..exponent_max` with a cubic bias toward the minimum.
    #[must_use]
    pub const fn new(
        spawn_probability: f64,
        exponent_min: i32,
        exponent_max: i32,
        rng_seed: u64,
    ) -> Self {
        Self {
            spawn_probability,
            exponent_min,
            exponent_max,
            rng_seed,
        }
    }

    /// Returns the configuration with a different random seed.
    #[must_use]
    pub const fn with_seed(mut self, rng_seed: u64) -> Self {
        self.rng_seed = rng_seed;
        self
    }

    /// Probability that a cell hosts a cache.
    #[must_use]
    pub const fn spawn_probability(&self) -> f64 {
        self.spawn_probability
    }

    /// Smallest starting exponent, inclusive.
    #[must_use]
    pub const fn exponent_min(&self) -> i32 {
        self.exponent_min
    }

    /// Largest starting exponent, exclusive.
    #[must_use]
    pub const fn exponent_max(&self) -> i32 {
        self.exponent_max
    }

    /// Seed of the starting value generator.
    #[must_use]
    pub const fn rng_seed(&self) -> u64 {
        self.rng_seed
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            DEFAULT_SPAWN_PROBABILITY,
            DEFAULT_EXPONENT_MIN,
            DEFAULT_EXPONENT_MAX,
            DEFAULT_RNG_SEED,
        )
    }
}

/// Pure system that emits cache spawn commands when the viewport changes.
#[derive(Debug)]
pub struct Spawning {
    spawn_probability: f64,
    exponent_min: i32,
    exponent_max: i32,
    rng: ChaCha8Rng,
}

impl Spawning {
    /// Creates a new spawning system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            spawn_probability: config.spawn_probability,
            exponent_min: config.exponent_min,
            exponent_max: config.exponent_max,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Consumes world events and emits spawn commands for newly visible cells.
    ///
    /// The `is_active` closure should mirror the world's `query::is_active`
    /// helper. Cells holding a stowed entry are still requested so the world
    /// can restore them.
    pub fn handle<F>(
        &mut self,
        events: &[Event],
        grid: GeoGrid,
        mut is_active: F,
        out: &mut Vec<Command>,
    ) where
        F: FnMut(CellCoord) -> bool,
    {
        let mut requested = BTreeSet::new();
        for event in events {
            if let Event::ViewportChanged { bounds } = event {
                self.scan(bounds, grid, &mut is_active, &mut requested, out);
            }
        }
    }

    fn scan<F>(
        &mut self,
        bounds: &GeoBounds,
        grid: GeoGrid,
        is_active: &mut F,
        requested: &mut BTreeSet<CellCoord>,
        out: &mut Vec<Command>,
    ) where
        F: FnMut(CellCoord) -> bool,
    {
        let (low, high) = grid.cell_span(bounds, SCAN_MARGIN_TILES);
        for x in low.x()..=high.x() {
            for y in low.y()..=high.y() {
                let cell = CellCoord::new(x, y);
                if !selects(cell, self.spawn_probability) || is_active(cell) {
                    continue;
                }
                if !requested.insert(cell) {
                    continue;
                }

                let starting_value = self.starting_value();
                debug!("requesting cache at {cell}");
                out.push(Command::SpawnCache {
                    cell,
                    starting_value,
                });
            }
        }
    }

    fn starting_value(&mut self) -> Option<TokenValue> {
        let sample: f64 = self.rng.gen();
        TokenValue::from_exponent(biased_exponent(
            sample,
            self.exponent_min,
            self.exponent_max,
        ))
    }
}

impl Default for Spawning {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Maps a uniform sample in `[0, 1)` onto `min..max`, favouring `min`.
///
/// Cubing the sample concentrates mass near zero, so low exponents are common
/// and high ones rare. An empty range yields `min`.
#[must_use]
pub fn biased_exponent(sample: f64, min: i32, max: i32) -> i32 {
    if max <= min {
        return min;
    }
    let range = f64::from(max - min);
    let offset = (sample.powi(3) * range).floor() as i32;
    (min + offset).min(max - 1)
}
