//! Line-oriented text codec for the stowed cache table and session scalars.

use std::fmt::Write as _;

use geocache_core::{CellCoord, GeoPoint, StowedCache, StowedTable, StowedToken, TokenValue};
use log::warn;

const CACHE_PREFIX: &str = "Cache at ";
const TOKEN_PREFIX: &str = "Token at ";
const NO_TOKENS: &str = "No tokens";
const VALUE_SEPARATOR: &str = ": ";

/// Renders the stowed table as a newline-delimited text blob.
///
/// Each cache contributes a `Cache at x,y:` header followed by one indented
/// `Token at (lat, lng): value` line per token, or a single `No tokens` line.
#[must_use]
pub fn encode_stowed(table: &StowedTable) -> String {
    let mut text = String::new();
    for (cell, cache) in table {
        let _ = writeln!(text, "{CACHE_PREFIX}{}:", cell.key());
        if cache.is_empty() {
            let _ = writeln!(text, "  {NO_TOKENS}");
            continue;
        }
        for token in cache.tokens() {
            let _ = writeln!(
                text,
                "  {TOKEN_PREFIX}{}{VALUE_SEPARATOR}{}",
                token.position, token.value
            );
        }
    }
    text
}

/// Parses a stowed table blob, skipping every line it cannot interpret.
///
/// Repeated headers for one cell merge into a single entry. Token lines that
/// appear before any valid header are dropped.
#[must_use]
pub fn decode_stowed(text: &str) -> StowedTable {
    let mut table = StowedTable::new();
    let mut current: Option<CellCoord> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let number = index + 1;

        if let Some(header) = line.strip_prefix(CACHE_PREFIX) {
            current = header
                .strip_suffix(':')
                .and_then(|key| CellCoord::parse_key(key.trim()));
            match current {
                Some(cell) => {
                    let _ = table.entry(cell).or_insert_with(StowedCache::empty);
                }
                None => warn!("skipping malformed cache header on line {number}: {line}"),
            }
            continue;
        }

        if line == NO_TOKENS {
            continue;
        }

        if let Some(body) = line.strip_prefix(TOKEN_PREFIX) {
            let Some(cell) = current else {
                warn!("skipping token line {number} outside of any cache");
                continue;
            };
            match parse_token(body) {
                Some(token) => {
                    table
                        .entry(cell)
                        .or_insert_with(StowedCache::empty)
                        .push(token.position, token.value);
                }
                None => warn!("skipping malformed token on line {number}: {line}"),
            }
            continue;
        }

        warn!("skipping unrecognised line {number}: {line}");
    }

    table
}

fn parse_token(body: &str) -> Option<StowedToken> {
    let (position, value) = body.rsplit_once(VALUE_SEPARATOR)?;
    let value = parse_value(value)?;
    let position = parse_point(position)?;
    Some(StowedToken { position, value })
}

fn parse_value(text: &str) -> Option<TokenValue> {
    let value: i64 = text.trim().parse().ok()?;
    TokenValue::new(u32::try_from(value).ok()?)
}

fn parse_point(text: &str) -> Option<GeoPoint> {
    let mut inner = text.trim();
    if let Some(rest) = inner.strip_prefix("LatLng") {
        inner = rest.trim_start();
    }
    if let Some(rest) = inner.strip_prefix('(') {
        inner = rest.strip_suffix(')')?;
    }
    let (lat, lng) = inner.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    if !lat.is_finite() || !lng.is_finite() {
        return None;
    }
    Some(GeoPoint::new(lat, lng))
}

/// Renders the player position as `lat,lng`.
#[must_use]
pub fn encode_position(point: GeoPoint) -> String {
    format!("{},{}", point.lat(), point.lng())
}

/// Parses a `lat,lng` pair, accepting the bracketed renderings as well.
#[must_use]
pub fn decode_position(text: &str) -> Option<GeoPoint> {
    parse_point(text)
}

/// Renders the held value as a decimal string, or an empty string when nothing is held.
#[must_use]
pub fn encode_held(held: Option<TokenValue>) -> String {
    held.map(|value| value.to_string()).unwrap_or_default()
}

/// Parses a held value, treating empty or invalid text as an empty hand.
#[must_use]
pub fn decode_held(text: &str) -> Option<TokenValue> {
    if text.trim().is_empty() {
        return None;
    }
    let held = parse_value(text);
    if held.is_none() {
        warn!("ignoring unparseable held token value {text:?}");
    }
    held
}
