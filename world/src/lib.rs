#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for the geocache engine.
//!
//! The world owns every active cache, the table of stowed caches, the
//! player's inventory and position. A grid cell is at any instant either
//! unknown, active, or stowed, never two of these at once.

mod cache;
mod inventory;

use std::collections::BTreeMap;

use geocache_core::{
    CellCoord, Command, Event, GeoBounds, GeoGrid, GeoPoint, InteractionError, StowedTable,
    TokenId, TokenValue, DEFAULT_INTERACTION_RADIUS, DEFAULT_START, DEFAULT_VICTORY_THRESHOLD,
};
use log::{debug, info};

use crate::{
    cache::{Cache, Token},
    inventory::Inventory,
};

/// Tunable parameters of the authoritative world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldConfig {
    grid: GeoGrid,
    interaction_radius: f64,
    victory_threshold: TokenValue,
    start: GeoPoint,
}

impl WorldConfig {
    /// Creates a new world configuration.
    #[must_use]
    pub const fn new(
        grid: GeoGrid,
        interaction_radius: f64,
        victory_threshold: TokenValue,
        start: GeoPoint,
    ) -> Self {
        Self {
            grid,
            interaction_radius,
            victory_threshold,
            start,
        }
    }

    /// Grid mapping geographic points to cells.
    #[must_use]
    pub const fn grid(&self) -> GeoGrid {
        self.grid
    }

    /// Maximum distance at which the player may affect tokens and caches.
    #[must_use]
    pub const fn interaction_radius(&self) -> f64 {
        self.interaction_radius
    }

    /// Token value that wins the game.
    #[must_use]
    pub const fn victory_threshold(&self) -> TokenValue {
        self.victory_threshold
    }

    /// Position the player starts from and returns to on reset.
    #[must_use]
    pub const fn start(&self) -> GeoPoint {
        self.start
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self::new(
            GeoGrid::default(),
            DEFAULT_INTERACTION_RADIUS,
            DEFAULT_VICTORY_THRESHOLD,
            DEFAULT_START,
        )
    }
}

/// Represents the authoritative geocache world state.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    banner: String,
    caches: BTreeMap<CellCoord, Cache>,
    stowed: StowedTable,
    inventory: Inventory,
    player: GeoPoint,
    viewport: Option<GeoBounds>,
    location_tracking: bool,
    victory: bool,
    next_token_id: TokenId,
}

impl World {
    /// Creates a new world using the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates a new world using the provided configuration.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            banner: goal_banner(config.victory_threshold),
            caches: BTreeMap::new(),
            stowed: StowedTable::new(),
            inventory: Inventory::default(),
            player: config.start,
            viewport: None,
            location_tracking: false,
            victory: false,
            next_token_id: TokenId::new(0),
            config,
        }
    }

    fn mint_token_id(next: &mut TokenId) -> TokenId {
        let id = *next;
        *next = TokenId::new(id.get().wrapping_add(1));
        id
    }

    fn within_reach(&self, point: GeoPoint) -> bool {
        self.player.distance_to(point) <= self.config.interaction_radius
    }

    fn locate_token(&self, id: TokenId) -> Option<(CellCoord, Token)> {
        self.caches
            .values()
            .find_map(|cache| cache.token(id).map(|token| (cache.cell(), *token)))
    }

    fn place_token(
        &mut self,
        cell: CellCoord,
        value: TokenValue,
        position: GeoPoint,
        out_events: &mut Vec<Event>,
    ) {
        let Some(cache) = self.caches.get_mut(&cell) else {
            return;
        };
        let id = Self::mint_token_id(&mut self.next_token_id);
        let token = cache.add_token(id, value, position);
        out_events.push(Event::TokenPlaced {
            cell,
            token: token.id,
            position: token.position,
            value: token.value,
        });
    }

    fn spawn_cache(
        &mut self,
        cell: CellCoord,
        starting_value: Option<TokenValue>,
        out_events: &mut Vec<Event>,
    ) {
        if self.caches.contains_key(&cell) {
            return;
        }

        let grid = self.config.grid;
        let restored = self.stowed.remove(&cell);
        let was_restored = restored.is_some();
        let tokens: Vec<(GeoPoint, TokenValue)> = match restored {
            Some(stowed) => {
                debug!("restoring cache {cell} with {} tokens", stowed.tokens().len());
                stowed
                    .tokens()
                    .iter()
                    .map(|token| (token.position, token.value))
                    .collect()
            }
            None => starting_value
                .map(|value| (grid.cell_center(cell), value))
                .into_iter()
                .collect(),
        };

        let _ = self.caches.insert(cell, Cache::new(cell));
        out_events.push(Event::CacheSpawned {
            cell,
            bounds: grid.cell_bounds(cell),
            restored: was_restored,
        });

        for (position, value) in tokens {
            self.place_token(cell, value, position, out_events);
        }
    }

    fn stow_cache(&mut self, cell: CellCoord, out_events: &mut Vec<Event>) {
        let Some(cache) = self.caches.remove(&cell) else {
            return;
        };
        for token in cache.tokens() {
            out_events.push(Event::TokenRemoved { token: token.id });
        }

        let stowed = cache.serialize();
        let count = stowed.tokens().len();
        debug!("stowing cache {cell} with {count} tokens");
        let _ = self.stowed.insert(cell, stowed);
        out_events.push(Event::CacheStowed {
            cell,
            tokens: count,
        });
    }

    fn despawn_all(&mut self, out_events: &mut Vec<Event>) {
        let caches = std::mem::take(&mut self.caches);
        for (cell, cache) in caches {
            for token in cache.tokens() {
                out_events.push(Event::TokenRemoved { token: token.id });
            }
            out_events.push(Event::CacheDespawned { cell });
        }
    }

    fn set_viewport(&mut self, bounds: GeoBounds, out_events: &mut Vec<Event>) {
        self.viewport = Some(bounds);

        let grid = self.config.grid;
        let retained = bounds.expanded(grid.tile_degrees());
        let leaving: Vec<CellCoord> = self
            .caches
            .keys()
            .copied()
            .filter(|cell| !grid.cell_bounds(*cell).intersects(&retained))
            .collect();
        for cell in leaving {
            self.stow_cache(cell, out_events);
        }

        out_events.push(Event::ViewportChanged { bounds });
    }

    fn click_token(&mut self, id: TokenId, out_events: &mut Vec<Event>) {
        let Some((cell, token)) = self.locate_token(id) else {
            reject(InteractionError::UnknownToken, out_events);
            return;
        };
        if !self.within_reach(token.position) {
            reject(InteractionError::OutOfReach, out_events);
            return;
        }
        let Some(cache) = self.caches.get_mut(&cell) else {
            return;
        };

        match self.inventory.peek() {
            None => {
                let Some(value) = cache.remove_token(id) else {
                    return;
                };
                self.inventory.hold(value);
                out_events.push(Event::TokenRemoved { token: id });
                out_events.push(Event::InventoryChanged { held: Some(value) });
                self.check_victory(value, out_events);
            }
            Some(held) if held == token.value => {
                let merged = held.doubled();
                if let Some(target) = cache.token_mut(id) {
                    target.value = merged;
                }
                let _ = self.inventory.release();
                out_events.push(Event::InventoryChanged { held: None });
                out_events.push(Event::TokenValueChanged {
                    token: id,
                    value: merged,
                });
                self.check_victory(merged, out_events);
            }
            Some(held) => {
                if let Some(target) = cache.token_mut(id) {
                    target.value = held;
                }
                self.inventory.hold(token.value);
                out_events.push(Event::TokenValueChanged {
                    token: id,
                    value: held,
                });
                out_events.push(Event::InventoryChanged {
                    held: Some(token.value),
                });
                self.check_victory(token.value, out_events);
            }
        }
    }

    fn click_map(&mut self, point: GeoPoint, out_events: &mut Vec<Event>) {
        let cell = self.config.grid.cell_of(point);
        if !self.caches.contains_key(&cell) {
            reject(InteractionError::NoCache, out_events);
            return;
        }
        if !self.within_reach(point) {
            reject(InteractionError::OutOfReach, out_events);
            return;
        }
        if !self.inventory.is_holding() {
            reject(InteractionError::NothingHeld, out_events);
            return;
        }

        let Some(held) = self.inventory.release() else {
            return;
        };
        self.place_token(cell, held, point, out_events);
        out_events.push(Event::InventoryChanged { held: None });
    }

    fn move_player(&mut self, to: GeoPoint, out_events: &mut Vec<Event>) {
        let from = self.player;
        if from == to {
            return;
        }
        self.player = to;
        out_events.push(Event::PlayerMoved { from, to });
    }

    fn check_victory(&mut self, value: TokenValue, out_events: &mut Vec<Event>) {
        if self.victory || value != self.config.victory_threshold {
            return;
        }
        self.victory = true;
        self.banner = victory_banner(value);
        info!("victory threshold {value} reached");
        out_events.push(Event::VictoryAchieved { value });
    }

    fn restore_session(
        &mut self,
        stowed: StowedTable,
        player: GeoPoint,
        held: Option<TokenValue>,
        out_events: &mut Vec<Event>,
    ) {
        let mut recovered = 0;
        for (cell, entry) in stowed {
            if self.caches.contains_key(&cell) {
                debug!("dropping stowed entry for active cache {cell}");
                continue;
            }
            let _ = self.stowed.insert(cell, entry);
            recovered += 1;
        }
        info!("restored session with {recovered} stowed caches");

        self.move_player(player, out_events);
        match held {
            Some(value) => self.inventory.hold(value),
            None => {
                let _ = self.inventory.release();
            }
        }
        out_events.push(Event::InventoryChanged { held });
        out_events.push(Event::SessionRestored { stowed: recovered });
        if let Some(value) = held {
            self.check_victory(value, out_events);
        }
    }

    fn reset(&mut self, out_events: &mut Vec<Event>) {
        info!("resetting world");
        self.despawn_all(out_events);
        self.stowed.clear();
        if self.inventory.release().is_some() {
            out_events.push(Event::InventoryChanged { held: None });
        }
        self.victory = false;
        self.banner = goal_banner(self.config.victory_threshold);
        let start = self.config.start;
        self.move_player(start, out_events);
        out_events.push(Event::WorldReset);

        if let Some(previous) = self.viewport {
            let bounds = previous.recentred(start);
            self.viewport = Some(bounds);
            out_events.push(Event::ViewportChanged { bounds });
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::SetViewport { bounds } => world.set_viewport(bounds, out_events),
        Command::SpawnCache {
            cell,
            starting_value,
        } => world.spawn_cache(cell, starting_value, out_events),
        Command::ClickToken { token } => world.click_token(token, out_events),
        Command::ClickMap { point } => world.click_map(point, out_events),
        Command::StepPlayer { direction } => {
            let (lat_steps, lng_steps) = direction.tile_delta();
            let tile = world.config.grid.tile_degrees();
            let to = world
                .player
                .offset(f64::from(lat_steps) * tile, f64::from(lng_steps) * tile);
            world.move_player(to, out_events);
        }
        Command::ReportLocation { point } => {
            if world.location_tracking {
                world.move_player(point, out_events);
            }
        }
        Command::SetLocationTracking { enabled } => {
            if world.location_tracking != enabled {
                world.location_tracking = enabled;
                out_events.push(Event::LocationTrackingChanged { enabled });
            }
        }
        Command::StowAll => {
            let cells: Vec<CellCoord> = world.caches.keys().copied().collect();
            for cell in cells {
                world.stow_cache(cell, out_events);
            }
        }
        Command::RestoreSession {
            stowed,
            player,
            held,
        } => world.restore_session(stowed, player, held, out_events),
        Command::Reset => world.reset(out_events),
    }
}

fn reject(reason: InteractionError, out_events: &mut Vec<Event>) {
    out_events.push(Event::InteractionRejected { reason });
}

fn goal_banner(threshold: TokenValue) -> String {
    format!("Goal: get a token of value {threshold}")
}

fn victory_banner(value: TokenValue) -> String {
    format!("You Got a {value} Token! You Win!")
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use geocache_core::{
        CellCoord, GeoBounds, GeoGrid, GeoPoint, StowedTable, TokenId, TokenValue,
    };

    use super::{World, WorldConfig};

    /// Retrieves the goal or victory banner adapters display to players.
    #[must_use]
    pub fn banner(world: &World) -> &str {
        &world.banner
    }

    /// Provides read-only access to the world configuration.
    #[must_use]
    pub fn config(world: &World) -> &WorldConfig {
        &world.config
    }

    /// Grid mapping geographic points to cells.
    #[must_use]
    pub fn grid(world: &World) -> GeoGrid {
        world.config.grid
    }

    /// Current player position.
    #[must_use]
    pub fn player_position(world: &World) -> GeoPoint {
        world.player
    }

    /// Value held in the inventory, if any.
    #[must_use]
    pub fn held_token(world: &World) -> Option<TokenValue> {
        world.inventory.peek()
    }

    /// Reports whether the inventory holds a value.
    #[must_use]
    pub fn is_holding(world: &World) -> bool {
        world.inventory.is_holding()
    }

    /// Reports whether device location updates move the player.
    #[must_use]
    pub fn location_tracking(world: &World) -> bool {
        world.location_tracking
    }

    /// Reports whether the victory threshold has been reached since the last reset.
    #[must_use]
    pub fn victory_achieved(world: &World) -> bool {
        world.victory
    }

    /// Most recent viewport recorded by the world.
    #[must_use]
    pub fn viewport(world: &World) -> Option<GeoBounds> {
        world.viewport
    }

    /// Reports whether an active cache occupies the cell.
    #[must_use]
    pub fn is_active(world: &World, cell: CellCoord) -> bool {
        world.caches.contains_key(&cell)
    }

    /// Reports whether a stowed entry exists for the cell.
    #[must_use]
    pub fn is_stowed(world: &World, cell: CellCoord) -> bool {
        world.stowed.contains_key(&cell)
    }

    /// Provides read-only access to the stowed cache table.
    #[must_use]
    pub fn stowed_caches(world: &World) -> &StowedTable {
        &world.stowed
    }

    /// Reports whether the point lies within the interaction radius of the player.
    #[must_use]
    pub fn within_reach(world: &World, point: GeoPoint) -> bool {
        world.within_reach(point)
    }

    /// Captures a read-only view of every active cache.
    #[must_use]
    pub fn cache_view(world: &World) -> CacheView {
        let grid = world.config.grid;
        let snapshots = world
            .caches
            .values()
            .map(|cache| CacheSnapshot {
                cell: cache.cell(),
                bounds: grid.cell_bounds(cache.cell()),
                tokens: cache
                    .tokens()
                    .iter()
                    .map(|token| TokenSnapshot {
                        id: token.id,
                        value: token.value,
                        position: token.position,
                    })
                    .collect(),
            })
            .collect();
        CacheView { snapshots }
    }

    /// Looks up an active token by identifier.
    #[must_use]
    pub fn token(world: &World, id: TokenId) -> Option<TokenSnapshot> {
        world.locate_token(id).map(|(_, token)| TokenSnapshot {
            id: token.id,
            value: token.value,
            position: token.position,
        })
    }

    /// Read-only snapshot describing all active caches.
    #[derive(Clone, Debug, Default)]
    pub struct CacheView {
        snapshots: Vec<CacheSnapshot>,
    }

    impl CacheView {
        /// Iterator over the captured caches ordered by cell.
        pub fn iter(&self) -> impl Iterator<Item = &CacheSnapshot> {
            self.snapshots.iter()
        }

        /// Snapshot of the cache at the provided cell, if active.
        #[must_use]
        pub fn get(&self, cell: CellCoord) -> Option<&CacheSnapshot> {
            self.snapshots.iter().find(|snapshot| snapshot.cell == cell)
        }

        /// Number of active caches.
        #[must_use]
        pub fn len(&self) -> usize {
            self.snapshots.len()
        }

        /// Reports whether no cache is active.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.snapshots.is_empty()
        }

        /// Consumes the view, yielding the underlying snapshots.
        #[must_use]
        pub fn into_vec(self) -> Vec<CacheSnapshot> {
            self.snapshots
        }
    }

    /// Immutable representation of an active cache.
    #[derive(Clone, Debug, PartialEq)]
    pub struct CacheSnapshot {
        /// Cell occupied by the cache.
        pub cell: CellCoord,
        /// Rectangle covering the cell.
        pub bounds: GeoBounds,
        /// Tokens held by the cache in insertion order.
        pub tokens: Vec<TokenSnapshot>,
    }

    impl CacheSnapshot {
        /// Token values sorted ascending.
        #[must_use]
        pub fn sorted_values(&self) -> Vec<TokenValue> {
            let mut values: Vec<TokenValue> = self.tokens.iter().map(|token| token.value).collect();
            values.sort_unstable();
            values
        }
    }

    /// Immutable representation of an active token.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct TokenSnapshot {
        /// Identifier assigned by the world.
        pub id: TokenId,
        /// Value carried by the token.
        pub value: TokenValue,
        /// Where the marker sits.
        pub position: GeoPoint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocache_core::{Direction, StowedCache};

    fn value(raw: u32) -> TokenValue {
        TokenValue::new(raw).expect("positive value")
    }

    fn unit_world() -> World {
        World::with_config(WorldConfig::new(
            GeoGrid::new(GeoPoint::new(0.0, 0.0), 1.0),
            3.0,
            value(64),
            GeoPoint::new(0.5, 0.5),
        ))
    }

    #[test]
    fn spawn_is_idempotent_for_active_cells() {
        let mut world = unit_world();
        let mut events = Vec::new();
        let cell = CellCoord::new(0, 0);

        apply(
            &mut world,
            Command::SpawnCache {
                cell,
                starting_value: Some(value(2)),
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::SpawnCache {
                cell,
                starting_value: Some(value(4)),
            },
            &mut events,
        );

        let view = query::cache_view(&world);
        assert_eq!(view.len(), 1);
        assert_eq!(view.get(cell).map(|cache| cache.sorted_values()), Some(vec![value(2)]));
    }

    #[test]
    fn missing_starting_value_spawns_empty_cache() {
        let mut world = unit_world();
        let mut events = Vec::new();
        let cell = CellCoord::new(1, 1);

        apply(
            &mut world,
            Command::SpawnCache {
                cell,
                starting_value: None,
            },
            &mut events,
        );

        assert!(query::is_active(&world, cell));
        assert!(events
            .iter()
            .all(|event| !matches!(event, Event::TokenPlaced { .. })));
    }

    #[test]
    fn step_player_moves_one_tile() {
        let mut world = unit_world();
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::StepPlayer {
                direction: Direction::West,
            },
            &mut events,
        );

        assert_eq!(query::player_position(&world), GeoPoint::new(0.5, -0.5));
        assert_eq!(
            events,
            vec![Event::PlayerMoved {
                from: GeoPoint::new(0.5, 0.5),
                to: GeoPoint::new(0.5, -0.5),
            }]
        );
    }

    #[test]
    fn location_updates_are_ignored_until_tracking_enabled() {
        let mut world = unit_world();
        let mut events = Vec::new();
        let reported = GeoPoint::new(9.0, 9.0);

        apply(&mut world, Command::ReportLocation { point: reported }, &mut events);
        assert_eq!(query::player_position(&world), GeoPoint::new(0.5, 0.5));
        assert!(events.is_empty());

        apply(
            &mut world,
            Command::SetLocationTracking { enabled: true },
            &mut events,
        );
        apply(&mut world, Command::ReportLocation { point: reported }, &mut events);
        assert_eq!(query::player_position(&world), reported);
    }

    #[test]
    fn restore_session_skips_cells_that_are_active() {
        let mut world = unit_world();
        let mut events = Vec::new();
        let active = CellCoord::new(0, 0);
        apply(
            &mut world,
            Command::SpawnCache {
                cell: active,
                starting_value: Some(value(1)),
            },
            &mut events,
        );

        let mut stowed = StowedTable::new();
        let _ = stowed.insert(active, StowedCache::empty());
        let _ = stowed.insert(CellCoord::new(5, 5), StowedCache::empty());
        apply(
            &mut world,
            Command::RestoreSession {
                stowed,
                player: GeoPoint::new(0.5, 0.5),
                held: Some(value(4)),
            },
            &mut events,
        );

        assert!(!query::is_stowed(&world, active));
        assert!(query::is_stowed(&world, CellCoord::new(5, 5)));
        assert_eq!(query::held_token(&world), Some(value(4)));
        assert!(events.contains(&Event::SessionRestored { stowed: 1 }));
    }

    #[test]
    fn placing_into_missing_cache_keeps_id_sequence() {
        let mut world = unit_world();
        let mut events = Vec::new();
        world.place_token(
            CellCoord::new(3, 3),
            value(2),
            GeoPoint::new(3.5, 3.5),
            &mut events,
        );
        assert!(events.is_empty());

        let cell = CellCoord::new(0, 0);
        apply(
            &mut world,
            Command::SpawnCache {
                cell,
                starting_value: Some(value(2)),
            },
            &mut events,
        );
        let view = query::cache_view(&world);
        let tokens = &view.get(cell).expect("spawned cache").tokens;
        assert_eq!(tokens[0].id, TokenId::new(0));
    }

    #[test]
    fn banner_starts_with_goal() {
        let world = unit_world();
        assert_eq!(query::banner(&world), "Goal: get a token of value 64");
    }
}
