#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the geocache engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems and
//! presentation layers to react to. Systems consume event streams, query
//! immutable snapshots, and respond exclusively with new command batches.
//!
//! Geographic helpers live here as well: every crate agrees on how a
//! [`GeoPoint`] maps onto the infinite [`CellCoord`] grid through a [`GeoGrid`].

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Latitude and longitude of the grid origin used by default.
pub const DEFAULT_ORIGIN: GeoPoint = GeoPoint::new(0.0, 0.0);

/// Edge length of a single tile measured in degrees.
pub const DEFAULT_TILE_DEGREES: f64 = 1e-4;

/// Probability that the luck function selects a cell for a cache.
pub const DEFAULT_SPAWN_PROBABILITY: f64 = 0.1;

/// Maximum distance, in degrees, at which the player may affect the world.
pub const DEFAULT_INTERACTION_RADIUS: f64 = 0.0003;

/// Token value that wins the game when reached.
pub const DEFAULT_VICTORY_THRESHOLD: TokenValue = TokenValue(64);

/// Location the player starts from when no previous session exists.
pub const DEFAULT_START: GeoPoint = GeoPoint::new(36.997_936_938_057_016, -122.057_035_075_011_51);

/// Geographic point expressed in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

impl GeoPoint {
    /// Creates a new point from latitude and longitude.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Latitude component in degrees.
    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude component in degrees.
    #[must_use]
    pub const fn lng(&self) -> f64 {
        self.lng
    }

    /// Planar distance between two points measured in degrees.
    ///
    /// This is not a geodesic distance; at city scale the error is far below
    /// the size of a tile.
    #[must_use]
    pub fn distance_to(self, other: GeoPoint) -> f64 {
        let lat_diff = other.lat - self.lat;
        let lng_diff = other.lng - self.lng;
        (lat_diff * lat_diff + lng_diff * lng_diff).sqrt()
    }

    /// Returns the point shifted by the provided deltas.
    #[must_use]
    pub fn offset(self, lat_delta: f64, lng_delta: f64) -> Self {
        Self::new(self.lat + lat_delta, self.lng + lng_delta)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lng)
    }
}

/// Axis-aligned geographic rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    south_west: GeoPoint,
    north_east: GeoPoint,
}

impl GeoBounds {
    /// Creates bounds spanning the two corners, in any order.
    #[must_use]
    pub fn new(corner: GeoPoint, opposite: GeoPoint) -> Self {
        Self {
            south_west: GeoPoint::new(corner.lat.min(opposite.lat), corner.lng.min(opposite.lng)),
            north_east: GeoPoint::new(corner.lat.max(opposite.lat), corner.lng.max(opposite.lng)),
        }
    }

    /// Creates bounds centred on a point with the provided half extents in degrees.
    #[must_use]
    pub fn centered_on(center: GeoPoint, half_lat: f64, half_lng: f64) -> Self {
        Self::new(
            center.offset(-half_lat, -half_lng),
            center.offset(half_lat, half_lng),
        )
    }

    /// South-western corner of the bounds.
    #[must_use]
    pub const fn south_west(&self) -> GeoPoint {
        self.south_west
    }

    /// North-eastern corner of the bounds.
    #[must_use]
    pub const fn north_east(&self) -> GeoPoint {
        self.north_east
    }

    /// Geometric centre of the bounds.
    #[must_use]
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    /// Reports whether the two rectangles overlap. Touching edges count.
    #[must_use]
    pub fn intersects(&self, other: &GeoBounds) -> bool {
        other.north_east.lat >= self.south_west.lat
            && other.south_west.lat <= self.north_east.lat
            && other.north_east.lng >= self.south_west.lng
            && other.south_west.lng <= self.north_east.lng
    }

    /// Reports whether the point lies within the bounds, edges included.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }

    /// Returns bounds of the same extent centred on `center`.
    #[must_use]
    pub fn recentred(&self, center: GeoPoint) -> Self {
        Self::centered_on(
            center,
            (self.north_east.lat - self.south_west.lat) / 2.0,
            (self.north_east.lng - self.south_west.lng) / 2.0,
        )
    }

    /// Returns the bounds grown by `margin` degrees on every side.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        Self::new(
            self.south_west.offset(-margin, -margin),
            self.north_east.offset(margin, margin),
        )
    }
}

/// Integer identity of a single tile on the infinite grid.
///
/// `x` indexes latitude bands and `y` longitude bands relative to the grid
/// origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    x: i32,
    y: i32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Latitude band index.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Longitude band index.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Textual key of the cell, `"x,y"`.
    ///
    /// The key seeds the luck function and labels persisted caches.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{},{}", self.x, self.y)
    }

    /// Parses a key previously produced by [`CellCoord::key`].
    #[must_use]
    pub fn parse_key(key: &str) -> Option<Self> {
        let (x, y) = key.split_once(',')?;
        let x = x.trim().parse::<i32>().ok()?;
        let y = y.trim().parse::<i32>().ok()?;
        Some(Self::new(x, y))
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Mapping between geographic points and grid cells.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoGrid {
    origin: GeoPoint,
    tile_degrees: f64,
}

impl GeoGrid {
    /// Creates a grid anchored at `origin` whose square tiles span `tile_degrees`.
    #[must_use]
    pub const fn new(origin: GeoPoint, tile_degrees: f64) -> Self {
        Self {
            origin,
            tile_degrees,
        }
    }

    /// Point that anchors cell `0,0`.
    #[must_use]
    pub const fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Edge length of a tile in degrees.
    #[must_use]
    pub const fn tile_degrees(&self) -> f64 {
        self.tile_degrees
    }

    /// Cell containing the provided point.
    ///
    /// Indices beyond the `i32` range saturate at its ends.
    #[must_use]
    pub fn cell_of(&self, point: GeoPoint) -> CellCoord {
        let x = ((point.lat - self.origin.lat) / self.tile_degrees).floor();
        let y = ((point.lng - self.origin.lng) / self.tile_degrees).floor();
        CellCoord::new(x as i32, y as i32)
    }

    /// Geographic extent covered by exactly one cell.
    #[must_use]
    pub fn cell_bounds(&self, cell: CellCoord) -> GeoBounds {
        let south_west = GeoPoint::new(
            self.origin.lat + f64::from(cell.x) * self.tile_degrees,
            self.origin.lng + f64::from(cell.y) * self.tile_degrees,
        );
        let north_east = GeoPoint::new(
            self.origin.lat + (f64::from(cell.x) + 1.0) * self.tile_degrees,
            self.origin.lng + (f64::from(cell.y) + 1.0) * self.tile_degrees,
        );
        GeoBounds::new(south_west, north_east)
    }

    /// Centre point of a cell, where freshly spawned tokens are placed.
    #[must_use]
    pub fn cell_center(&self, cell: CellCoord) -> GeoPoint {
        self.cell_bounds(cell).center()
    }

    /// Inclusive range of cells touched by `bounds`, grown by `margin` cells per side.
    ///
    /// Returns the south-western and north-eastern cells of the range.
    #[must_use]
    pub fn cell_span(&self, bounds: &GeoBounds, margin: i32) -> (CellCoord, CellCoord) {
        let low = self.cell_of(bounds.south_west());
        let high = self.cell_of(bounds.north_east());
        (
            CellCoord::new(low.x.saturating_sub(margin), low.y.saturating_sub(margin)),
            CellCoord::new(high.x.saturating_add(margin), high.y.saturating_add(margin)),
        )
    }
}

impl Default for GeoGrid {
    fn default() -> Self {
        Self::new(DEFAULT_ORIGIN, DEFAULT_TILE_DEGREES)
    }
}

/// Cardinal directions the player may step in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Toward increasing latitude.
    North,
    /// Toward increasing longitude.
    East,
    /// Toward decreasing latitude.
    South,
    /// Toward decreasing longitude.
    West,
}

impl Direction {
    /// Latitude and longitude tile deltas for one step in this direction.
    #[must_use]
    pub const fn tile_delta(self) -> (i32, i32) {
        match self {
            Self::North => (1, 0),
            Self::East => (0, 1),
            Self::South => (-1, 0),
            Self::West => (0, -1),
        }
    }
}

/// Unique identifier assigned to a token by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(u32);

impl TokenId {
    /// Creates a new token identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Positive integer carried by a token or held in the inventory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenValue(u32);

impl TokenValue {
    /// Creates a token value, refusing anything below one.
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Creates the value `2^exponent`.
    ///
    /// Negative exponents describe fractional values, which are not valid
    /// token values and yield `None`, as do exponents that overflow.
    #[must_use]
    pub fn from_exponent(exponent: i32) -> Option<Self> {
        let exponent = u32::try_from(exponent).ok()?;
        1u32.checked_shl(exponent).map(Self)
    }

    /// Retrieves the underlying integer.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Value produced by merging two tokens of this value.
    #[must_use]
    pub const fn doubled(self) -> Self {
        Self(self.0.saturating_mul(2))
    }
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A token captured inside a stowed cache.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StowedToken {
    /// Where the token was placed.
    pub position: GeoPoint,
    /// Value the token carried when stowed.
    pub value: TokenValue,
}

/// Serialized contents of a cache that left the viewport.
///
/// An entry without tokens is the "known empty" marker: restoring it yields an
/// empty cache rather than a freshly seeded one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StowedCache {
    tokens: Vec<StowedToken>,
}

impl StowedCache {
    /// Creates the known-empty marker.
    #[must_use]
    pub const fn empty() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Creates a stowed cache holding the provided tokens.
    #[must_use]
    pub fn from_tokens(tokens: Vec<StowedToken>) -> Self {
        Self { tokens }
    }

    /// Appends a token to the stowed contents.
    pub fn push(&mut self, position: GeoPoint, value: TokenValue) {
        self.tokens.push(StowedToken { position, value });
    }

    /// Tokens captured at stow time, in stow order.
    #[must_use]
    pub fn tokens(&self) -> &[StowedToken] {
        &self.tokens
    }

    /// Reports whether this entry is the known-empty marker.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token values sorted ascending, convenient for multiset comparisons.
    #[must_use]
    pub fn sorted_values(&self) -> Vec<TokenValue> {
        let mut values: Vec<TokenValue> = self.tokens.iter().map(|token| token.value).collect();
        values.sort_unstable();
        values
    }
}

/// Table of every stowed cache keyed by cell, in deterministic order.
pub type StowedTable = BTreeMap<CellCoord, StowedCache>;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Records the visible map bounds and stows caches that left them.
    SetViewport {
        /// Geographic bounds currently visible to the player.
        bounds: GeoBounds,
    },
    /// Materialises a cache at the provided cell unless one is already active.
    SpawnCache {
        /// Cell selected by the luck function.
        cell: CellCoord,
        /// Value of the token seeded into a fresh cache, if any.
        starting_value: Option<TokenValue>,
    },
    /// Interacts with a token marker.
    ClickToken {
        /// Identifier of the token the player clicked.
        token: TokenId,
    },
    /// Interacts with a map location, depositing the held token into the cache there.
    ClickMap {
        /// Point the player clicked.
        point: GeoPoint,
    },
    /// Moves the player exactly one tile.
    StepPlayer {
        /// Direction of travel.
        direction: Direction,
    },
    /// Reports a position from the device location service.
    ReportLocation {
        /// Raw coordinate delivered by the device.
        point: GeoPoint,
    },
    /// Enables or disables following the device location.
    SetLocationTracking {
        /// Whether location updates should move the player.
        enabled: bool,
    },
    /// Stows every active cache regardless of visibility.
    StowAll,
    /// Repopulates the world from a previous session.
    RestoreSession {
        /// Stowed caches recovered from storage.
        stowed: StowedTable,
        /// Player position recovered from storage.
        player: GeoPoint,
        /// Held token recovered from storage.
        held: Option<TokenValue>,
    },
    /// Discards all progress and regenerates the world.
    Reset,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Announces the bounds that spawn evaluation should scan.
    ViewportChanged {
        /// Geographic bounds currently visible to the player.
        bounds: GeoBounds,
    },
    /// Confirms that a cache became active.
    CacheSpawned {
        /// Cell the cache occupies.
        cell: CellCoord,
        /// Rectangle covering the cell.
        bounds: GeoBounds,
        /// Whether the cache was restored from a stowed entry.
        restored: bool,
    },
    /// Confirms that an active cache was stowed and its markers should be removed.
    CacheStowed {
        /// Cell the cache occupied.
        cell: CellCoord,
        /// Number of tokens captured in the stowed entry.
        tokens: usize,
    },
    /// Confirms that an active cache was discarded without being stowed.
    CacheDespawned {
        /// Cell the cache occupied.
        cell: CellCoord,
    },
    /// Confirms that a token marker should be created.
    TokenPlaced {
        /// Cell of the cache owning the token.
        cell: CellCoord,
        /// Identifier assigned to the token.
        token: TokenId,
        /// Where the marker sits.
        position: GeoPoint,
        /// Value displayed on the marker.
        value: TokenValue,
    },
    /// Confirms that a token now carries a different value.
    TokenValueChanged {
        /// Identifier of the updated token.
        token: TokenId,
        /// New value of the token.
        value: TokenValue,
    },
    /// Confirms that a token left its cache.
    TokenRemoved {
        /// Identifier of the removed token.
        token: TokenId,
    },
    /// Reports the new inventory contents.
    InventoryChanged {
        /// Value now held, if any.
        held: Option<TokenValue>,
    },
    /// Announces that the victory threshold was reached.
    VictoryAchieved {
        /// Value that satisfied the victory threshold.
        value: TokenValue,
    },
    /// Confirms that the player moved.
    PlayerMoved {
        /// Position before the move.
        from: GeoPoint,
        /// Position after the move.
        to: GeoPoint,
    },
    /// Reports that location tracking was toggled.
    LocationTrackingChanged {
        /// Whether location updates now move the player.
        enabled: bool,
    },
    /// Reports that an interaction left the world untouched.
    InteractionRejected {
        /// Why the interaction was refused.
        reason: InteractionError,
    },
    /// Confirms that all progress was discarded.
    WorldReset,
    /// Confirms that a previous session was restored.
    SessionRestored {
        /// Number of stowed caches recovered.
        stowed: usize,
    },
}

/// Reasons a player interaction may be refused by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionError {
    /// The target lies beyond the interaction radius.
    OutOfReach,
    /// No active token carries the provided identifier.
    UnknownToken,
    /// No active cache covers the clicked point.
    NoCache,
    /// A deposit was requested with an empty inventory.
    NothingHeld,
}
