//! Parsing of the line-oriented commands typed at the prompt.

use anyhow::{anyhow, bail, Context, Result};
use geocache_core::{Direction, GeoBounds, GeoPoint, TokenId};

/// Usage text printed by `help` and after unrecognised input.
pub(crate) const HELP: &str = "\
commands:
  n | s | e | w            step one tile
  take <token>             click a token by id
  drop <lat> <lng>         click the map at a point
  gps on|off               follow location updates
  locate <lat> <lng>       report a location fix
  view <s> <w> <n> <e>     move the map to explicit bounds
  look                     show the current state
  save                     persist the session
  reset                    discard all progress
  quit                     save and exit";

/// One parsed prompt line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Input {
    Step(Direction),
    Take(TokenId),
    Drop(GeoPoint),
    Tracking(bool),
    Locate(GeoPoint),
    View(GeoBounds),
    Look,
    Save,
    Reset,
    Help,
    Quit,
}

/// Parses a prompt line. Blank lines yield `None`.
pub(crate) fn parse(line: &str) -> Result<Option<Input>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let input = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("n" | "north", []) => Input::Step(Direction::North),
        ("s" | "south", []) => Input::Step(Direction::South),
        ("e" | "east", []) => Input::Step(Direction::East),
        ("w" | "west", []) => Input::Step(Direction::West),
        ("take", [token]) => Input::Take(parse_token(token)?),
        ("drop", [lat, lng]) => Input::Drop(parse_point(lat, lng)?),
        ("gps", ["on"]) => Input::Tracking(true),
        ("gps", ["off"]) => Input::Tracking(false),
        ("locate", [lat, lng]) => Input::Locate(parse_point(lat, lng)?),
        ("view", [south, west, north, east]) => Input::View(GeoBounds::new(
            parse_point(south, west)?,
            parse_point(north, east)?,
        )),
        ("look", []) => Input::Look,
        ("save", []) => Input::Save,
        ("reset", []) => Input::Reset,
        ("help" | "?", []) => Input::Help,
        ("quit" | "exit", []) => Input::Quit,
        _ => bail!("unrecognised command `{}`", line.trim()),
    };
    Ok(Some(input))
}

fn parse_token(text: &str) -> Result<TokenId> {
    let digits = text.strip_prefix('#').unwrap_or(text);
    let id = digits
        .parse::<u32>()
        .with_context(|| format!("invalid token id `{text}`"))?;
    Ok(TokenId::new(id))
}

fn parse_point(lat: &str, lng: &str) -> Result<GeoPoint> {
    let lat = parse_degrees(lat)?;
    let lng = parse_degrees(lng)?;
    Ok(GeoPoint::new(lat, lng))
}

fn parse_degrees(text: &str) -> Result<f64> {
    let value = text
        .trim_end_matches(',')
        .parse::<f64>()
        .with_context(|| format!("invalid coordinate `{text}`"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(anyhow!("coordinate `{text}` is not finite"))
    }
}
