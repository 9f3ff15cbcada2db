//! Dispatcher translating external inputs into world commands.
//!
//! Every handler applies its command, pumps the resulting events through the
//! spawning system until no further commands are produced, and returns the
//! full event log so the front-end can render the changes.

use std::collections::VecDeque;

use anyhow::{Context, Result};
use geocache_core::{Command, Direction, Event, GeoBounds, GeoPoint, TokenId};
use geocache_persistence::{clear_session, load_session, save_session, SessionSnapshot, Storage};
use geocache_system_spawning::Spawning;
use geocache_world::{self as world, query, World};
use log::{debug, info};

use crate::config::GameConfig;

/// Single-owner game session bound to a storage device.
#[derive(Debug)]
pub(crate) struct Session<S> {
    world: World,
    spawning: Spawning,
    storage: S,
    half_lat: f64,
    half_lng: f64,
}

impl<S: Storage> Session<S> {
    /// Builds a session from configuration without touching storage.
    pub(crate) fn new(config: &GameConfig, storage: S) -> Result<Self> {
        let (half_lat, half_lng) = config.viewport_half_extents();
        Ok(Self {
            world: World::with_config(config.world_config()?),
            spawning: Spawning::new(config.spawning_config()),
            storage,
            half_lat,
            half_lng,
        })
    }

    /// Read access for presentation.
    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    /// The map finished moving to `bounds`.
    pub(crate) fn on_viewport_move_end(&mut self, bounds: GeoBounds) -> Vec<Event> {
        self.dispatch(Command::SetViewport { bounds })
    }

    /// The map was clicked outside any token.
    pub(crate) fn on_map_click(&mut self, point: GeoPoint) -> Vec<Event> {
        self.dispatch(Command::ClickMap { point })
    }

    /// A token marker was clicked.
    pub(crate) fn on_token_click(&mut self, token: TokenId) -> Vec<Event> {
        self.dispatch(Command::ClickToken { token })
    }

    /// A movement button was pressed.
    pub(crate) fn on_directional_move(&mut self, direction: Direction) -> Vec<Event> {
        let events = self.dispatch(Command::StepPlayer { direction });
        self.follow_player(events)
    }

    /// The location service reported a new fix.
    pub(crate) fn on_location_update(&mut self, point: GeoPoint) -> Vec<Event> {
        let events = self.dispatch(Command::ReportLocation { point });
        self.follow_player(events)
    }

    /// The follow-location toggle changed.
    pub(crate) fn on_location_tracking(&mut self, enabled: bool) -> Vec<Event> {
        self.dispatch(Command::SetLocationTracking { enabled })
    }

    /// Restores the previous session, if any, and populates the first viewport.
    pub(crate) fn on_session_start(&mut self) -> Result<Vec<Event>> {
        let fallback = query::config(&self.world).start();
        let snapshot =
            load_session(&self.storage, fallback).context("failed to load saved session")?;
        let mut events = match snapshot {
            Some(snapshot) => self.dispatch(snapshot.into_command()),
            None => {
                info!("no saved session found, starting fresh");
                Vec::new()
            }
        };
        events.extend(self.recentre());
        Ok(events)
    }

    /// Stows every active cache and writes the session to storage.
    pub(crate) fn on_session_end(&mut self) -> Result<Vec<Event>> {
        let events = self.dispatch(Command::StowAll);
        let snapshot = SessionSnapshot {
            stowed: query::stowed_caches(&self.world).clone(),
            player: query::player_position(&self.world),
            held: query::held_token(&self.world),
        };
        save_session(&mut self.storage, &snapshot).context("failed to save session")?;
        Ok(events)
    }

    /// Saves mid-session, then brings the viewport back to life.
    pub(crate) fn on_save_requested(&mut self) -> Result<Vec<Event>> {
        let mut events = self.on_session_end()?;
        events.extend(self.recentre());
        Ok(events)
    }

    /// Discards all progress, including the saved session.
    pub(crate) fn on_reset_requested(&mut self) -> Result<Vec<Event>> {
        clear_session(&mut self.storage).context("failed to clear saved session")?;
        let mut events = self.dispatch(Command::Reset);
        events.extend(self.recentre());
        Ok(events)
    }

    fn follow_player(&mut self, mut events: Vec<Event>) -> Vec<Event> {
        if events
            .iter()
            .any(|event| matches!(event, Event::PlayerMoved { .. }))
        {
            events.extend(self.recentre());
        }
        events
    }

    fn recentre(&mut self) -> Vec<Event> {
        let bounds = GeoBounds::centered_on(
            query::player_position(&self.world),
            self.half_lat,
            self.half_lng,
        );
        self.dispatch(Command::SetViewport { bounds })
    }

    fn dispatch(&mut self, command: Command) -> Vec<Event> {
        let mut log = Vec::new();
        let mut pending = VecDeque::from([command]);
        while let Some(command) = pending.pop_front() {
            let mut events = Vec::new();
            world::apply(&mut self.world, command, &mut events);

            let mut commands = Vec::new();
            let world = &self.world;
            self.spawning.handle(
                &events,
                query::grid(world),
                |cell| query::is_active(world, cell),
                &mut commands,
            );
            if !commands.is_empty() {
                debug!("spawning requested {} caches", commands.len());
            }
            pending.extend(commands);
            log.extend(events);
        }
        log
    }

    #[cfg(test)]
    fn into_storage(self) -> S {
        self.storage
    }
}
