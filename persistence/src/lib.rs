#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Session persistence for the geocache world.
//!
//! A session is three blobs in a key-value [`Storage`]: the stowed cache
//! table rendered by [`encode_stowed`], the player position and the held token
//! value. Active caches are never written directly; callers stow them first.

mod codec;
mod storage;

use geocache_core::{Command, GeoPoint, StowedTable, TokenValue};
use log::{info, warn};

pub use codec::{
    decode_held, decode_position, decode_stowed, encode_held, encode_position, encode_stowed,
};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};

/// Storage key holding the stowed cache table.
pub const CACHE_STATE_KEY: &str = "cache_state";
/// Storage key holding the player position.
pub const PLAYER_POSITION_KEY: &str = "player_position";
/// Storage key holding the held token value.
pub const HELD_TOKEN_KEY: &str = "held_token";

/// Everything required to resume a session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    /// Off-screen caches keyed by cell.
    pub stowed: StowedTable,
    /// Last known player position.
    pub player: GeoPoint,
    /// Token carried by the player, if any.
    pub held: Option<TokenValue>,
}

impl SessionSnapshot {
    /// Converts the snapshot into the command that reinstates it in the world.
    #[must_use]
    pub fn into_command(self) -> Command {
        Command::RestoreSession {
            stowed: self.stowed,
            player: self.player,
            held: self.held,
        }
    }
}

/// Writes the snapshot to storage under the session keys.
pub fn save_session<S>(storage: &mut S, snapshot: &SessionSnapshot) -> Result<(), StorageError>
where
    S: Storage + ?Sized,
{
    storage.set(CACHE_STATE_KEY, &encode_stowed(&snapshot.stowed))?;
    storage.set(PLAYER_POSITION_KEY, &encode_position(snapshot.player))?;
    storage.set(HELD_TOKEN_KEY, &encode_held(snapshot.held))?;
    info!(
        "saved session with {} stowed caches at {}",
        snapshot.stowed.len(),
        snapshot.player
    );
    Ok(())
}

/// Reads a previously saved session.
///
/// Returns `Ok(None)` when storage holds no session at all. Unreadable
/// positions fall back to `fallback_player` and unreadable held values
/// are treated as an empty hand.
pub fn load_session<S>(
    storage: &S,
    fallback_player: GeoPoint,
) -> Result<Option<SessionSnapshot>, StorageError>
where
    S: Storage + ?Sized,
{
    let cache_state = storage.get(CACHE_STATE_KEY)?;
    let position = storage.get(PLAYER_POSITION_KEY)?;
    let held = storage.get(HELD_TOKEN_KEY)?;
    if cache_state.is_none() && position.is_none() && held.is_none() {
        return Ok(None);
    }

    let stowed = cache_state
        .as_deref()
        .map(decode_stowed)
        .unwrap_or_default();
    let player = match position.as_deref() {
        Some(text) => decode_position(text).unwrap_or_else(|| {
            warn!("ignoring unparseable player position {text:?}");
            fallback_player
        }),
        None => fallback_player,
    };
    let held = held.as_deref().and_then(decode_held);

    info!(
        "loaded session with {} stowed caches at {player}",
        stowed.len()
    );
    Ok(Some(SessionSnapshot {
        stowed,
        player,
        held,
    }))
}

/// Removes every persisted session blob.
pub fn clear_session<S>(storage: &mut S) -> Result<(), StorageError>
where
    S: Storage + ?Sized,
{
    storage.clear()
}
