#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays the geocache game over stdin.
//!
//! The prompt stands in for the map, the movement buttons and the location
//! service. Each line becomes one session event and the resulting world
//! events are echoed back as text.

mod config;
mod input;
mod logging;
mod session;

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use geocache_core::{Event, InteractionError};
use geocache_persistence::{FileStorage, Storage};
use geocache_world::{query, World};
use log::info;

use crate::{
    config::GameConfig,
    input::{Input, HELP},
    session::Session,
};

/// Collect and merge tokens hidden in caches around you.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file overriding the default game configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// JSON file holding the saved session.
    #[arg(short, long, default_value = "geocache-session.json")]
    storage: PathBuf,
    /// Seed for starting token values, overriding the configuration.
    #[arg(long)]
    seed: Option<u64>,
    /// Discard any saved session before starting.
    #[arg(long)]
    fresh: bool,
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

/// Entry point for the geocache command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let mut config = GameConfig::load(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.spawning.seed = seed;
    }

    let mut storage = FileStorage::new(&args.storage);
    if args.fresh {
        storage
            .clear()
            .with_context(|| format!("failed to clear {}", args.storage.display()))?;
    }

    let mut session = Session::new(&config, storage)?;
    let events = session.on_session_start()?;
    report(&events);
    print_state(session.world());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush().context("failed to flush prompt")?;

        let mut line = String::new();
        if stdin
            .lock()
            .read_line(&mut line)
            .context("failed to read command")?
            == 0
        {
            break;
        }

        let input = match input::parse(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(error) => {
                println!("{error:#}");
                println!("{HELP}");
                continue;
            }
        };

        let events = match input {
            Input::Step(direction) => session.on_directional_move(direction),
            Input::Take(token) => session.on_token_click(token),
            Input::Drop(point) => session.on_map_click(point),
            Input::Tracking(enabled) => session.on_location_tracking(enabled),
            Input::Locate(point) => session.on_location_update(point),
            Input::View(bounds) => session.on_viewport_move_end(bounds),
            Input::Save => {
                let events = session.on_save_requested()?;
                println!("session saved");
                events
            }
            Input::Reset => session.on_reset_requested()?,
            Input::Look => {
                print_state(session.world());
                continue;
            }
            Input::Help => {
                println!("{HELP}");
                continue;
            }
            Input::Quit => break,
        };
        report(&events);
        print_state(session.world());
    }

    let _ = session.on_session_end()?;
    info!("session saved to {}", args.storage.display());
    Ok(())
}

fn report(events: &[Event]) {
    for event in events {
        if let Some(line) = describe(event) {
            println!("  {line}");
        }
    }
}

fn describe(event: &Event) -> Option<String> {
    let line = match event {
        Event::TokenValueChanged { token, value } => {
            format!("token #{} is now worth {value}", token.get())
        }
        Event::InventoryChanged { held: Some(value) } => format!("you now hold a {value}"),
        Event::InventoryChanged { held: None } => "your hands are empty".to_owned(),
        Event::VictoryAchieved { value } => format!("victory with a {value} token!"),
        Event::PlayerMoved { to, .. } => format!("moved to {to}"),
        Event::LocationTrackingChanged { enabled } => {
            format!("location tracking {}", if *enabled { "on" } else { "off" })
        }
        Event::InteractionRejected { reason } => rejection(*reason).to_owned(),
        Event::WorldReset => "the world was reset".to_owned(),
        Event::SessionRestored { stowed } => format!("resumed session with {stowed} stowed caches"),
        Event::ViewportChanged { .. }
        | Event::CacheSpawned { .. }
        | Event::CacheStowed { .. }
        | Event::CacheDespawned { .. }
        | Event::TokenPlaced { .. }
        | Event::TokenRemoved { .. } => return None,
    };
    Some(line)
}

fn rejection(reason: InteractionError) -> &'static str {
    match reason {
        InteractionError::OutOfReach => "that is too far away",
        InteractionError::UnknownToken => "no such token nearby",
        InteractionError::NoCache => "there is no cache there",
        InteractionError::NothingHeld => "you are not holding anything",
    }
}

fn print_state(world: &World) {
    println!("{}", query::banner(world));
    println!("player at {}", query::player_position(world));
    match query::held_token(world) {
        Some(value) => println!("holding {value}"),
        None => println!("holding nothing"),
    }

    let mut reachable = 0;
    for cache in query::cache_view(world).iter() {
        let tokens: Vec<_> = cache
            .tokens
            .iter()
            .filter(|token| query::within_reach(world, token.position))
            .collect();
        if tokens.is_empty() && !query::within_reach(world, cache.bounds.center()) {
            continue;
        }
        reachable += 1;
        if tokens.is_empty() {
            println!("  cache {}: empty", cache.cell);
            continue;
        }
        let listing: Vec<String> = tokens
            .iter()
            .map(|token| format!("#{} = {} at {}", token.id.get(), token.value, token.position))
            .collect();
        println!("  cache {}: {}", cache.cell, listing.join(", "));
    }
    if reachable == 0 {
        println!("  no caches within reach");
    }
}
