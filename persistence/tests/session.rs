use geocache_core::{CellCoord, Command, GeoPoint, StowedCache, StowedTable, TokenValue};
use geocache_persistence::{
    decode_stowed, encode_stowed, load_session, save_session, FileStorage, MemoryStorage,
    SessionSnapshot, Storage, CACHE_STATE_KEY, HELD_TOKEN_KEY, PLAYER_POSITION_KEY,
};

fn value(raw: u32) -> TokenValue {
    TokenValue::new(raw).expect("positive value")
}

fn sample_table() -> StowedTable {
    let mut table = StowedTable::new();
    let _ = table.insert(CellCoord::new(369_979, -1_220_571), StowedCache::empty());

    let mut busy = StowedCache::empty();
    busy.push(GeoPoint::new(36.997_95, -122.057_05), value(2));
    busy.push(GeoPoint::new(36.997_95, -122.057_05), value(2));
    busy.push(GeoPoint::new(36.998_01, -122.057_02), value(8));
    let _ = table.insert(CellCoord::new(369_980, -1_220_570), busy);
    table
}

fn multisets(table: &StowedTable) -> Vec<(CellCoord, Vec<TokenValue>)> {
    table
        .iter()
        .map(|(cell, cache)| (*cell, cache.sorted_values()))
        .collect()
}

#[test]
fn stowed_table_survives_text_round_trip() {
    let table = sample_table();
    let decoded = decode_stowed(&encode_stowed(&table));

    assert_eq!(multisets(&decoded), multisets(&table));
    assert_eq!(decoded, table);
}

#[test]
fn empty_blob_decodes_to_empty_table() {
    assert!(decode_stowed("").is_empty());
    assert!(decode_stowed("\n\n   \n").is_empty());
}

#[test]
fn parser_tolerates_historical_renderings() {
    let text = "\
Cache at 4,5:
  Token at (1.5, 2.5): 2
  Token at 1.5, 2.5: 4
  Token at LatLng(1.5, 2.5): 8
Cache at 6,7:
  No tokens
";
    let table = decode_stowed(text);

    let busy = table.get(&CellCoord::new(4, 5)).expect("cache 4,5");
    assert_eq!(busy.sorted_values(), vec![value(2), value(4), value(8)]);
    assert!(busy
        .tokens()
        .iter()
        .all(|token| token.position == GeoPoint::new(1.5, 2.5)));
    assert!(table
        .get(&CellCoord::new(6, 7))
        .expect("cache 6,7")
        .is_empty());
}

#[test]
fn parser_skips_malformed_lines_and_keeps_going() {
    let text = "\
  Token at (0.0, 0.0): 16
Cache at 1,1:
  Token at (1.0, 1.0): zero
  Token at (1.0, 1.0): 0
  Token at (1.0, 1.0): -4
  Token at (not, numbers): 2
  something unexpected
  Token at (1.0, 1.0): 32
Cache at broken:
  Token at (2.0, 2.0): 2
Cache at 3,3:
  Token at (3.0, 3.0): 2
";
    let table = decode_stowed(text);

    assert_eq!(
        multisets(&table),
        vec![
            (CellCoord::new(1, 1), vec![value(32)]),
            (CellCoord::new(3, 3), vec![value(2)]),
        ]
    );
}

#[test]
fn repeated_headers_merge_into_one_cache() {
    let text = "\
Cache at 2,2:
  Token at (2.1, 2.1): 2
Cache at 2,2:
  Token at (2.2, 2.2): 4
";
    let table = decode_stowed(text);

    assert_eq!(table.len(), 1);
    assert_eq!(
        table
            .get(&CellCoord::new(2, 2))
            .expect("merged cache")
            .sorted_values(),
        vec![value(2), value(4)]
    );
}

#[test]
fn missing_session_loads_as_none() {
    let storage = MemoryStorage::new();
    let loaded = load_session(&storage, GeoPoint::new(0.0, 0.0)).expect("load");
    assert_eq!(loaded, None);
}

#[test]
fn session_round_trips_through_storage() {
    let mut storage = MemoryStorage::new();
    let snapshot = SessionSnapshot {
        stowed: sample_table(),
        player: GeoPoint::new(36.998, -122.057),
        held: Some(value(16)),
    };

    save_session(&mut storage, &snapshot).expect("save");
    let loaded = load_session(&storage, GeoPoint::new(0.0, 0.0))
        .expect("load")
        .expect("session present");

    assert_eq!(loaded, snapshot);
    assert_eq!(
        storage.get(HELD_TOKEN_KEY).expect("get").as_deref(),
        Some("16")
    );
}

#[test]
fn empty_hand_is_stored_as_empty_text() {
    let mut storage = MemoryStorage::new();
    let snapshot = SessionSnapshot {
        stowed: StowedTable::new(),
        player: GeoPoint::new(1.0, 2.0),
        held: None,
    };

    save_session(&mut storage, &snapshot).expect("save");

    assert_eq!(storage.get(HELD_TOKEN_KEY).expect("get").as_deref(), Some(""));
    assert_eq!(
        storage.get(PLAYER_POSITION_KEY).expect("get").as_deref(),
        Some("1,2")
    );
    let loaded = load_session(&storage, GeoPoint::new(0.0, 0.0))
        .expect("load")
        .expect("session present");
    assert_eq!(loaded.held, None);
}

#[test]
fn unreadable_scalars_fall_back() {
    let mut storage = MemoryStorage::new();
    storage
        .set(CACHE_STATE_KEY, "Cache at 0,0:\n  No tokens\n")
        .expect("set");
    storage.set(PLAYER_POSITION_KEY, "nowhere").expect("set");
    storage.set(HELD_TOKEN_KEY, "lots").expect("set");

    let fallback = GeoPoint::new(5.0, 6.0);
    let loaded = load_session(&storage, fallback)
        .expect("load")
        .expect("session present");

    assert_eq!(loaded.player, fallback);
    assert_eq!(loaded.held, None);
    assert!(loaded.stowed.contains_key(&CellCoord::new(0, 0)));
}

#[test]
fn snapshot_becomes_restore_command() {
    let snapshot = SessionSnapshot {
        stowed: sample_table(),
        player: GeoPoint::new(3.0, 4.0),
        held: Some(value(2)),
    };

    assert_eq!(
        snapshot.clone().into_command(),
        Command::RestoreSession {
            stowed: snapshot.stowed,
            player: snapshot.player,
            held: snapshot.held,
        }
    );
}

#[test]
fn file_backed_session_survives_reopen() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("geocache.json");
    let snapshot = SessionSnapshot {
        stowed: sample_table(),
        player: GeoPoint::new(36.997_936_938_057_016, -122.057_035_075_011_51),
        held: None,
    };

    let mut storage = FileStorage::new(&path);
    save_session(&mut storage, &snapshot).expect("save");

    let reopened = FileStorage::new(&path);
    let loaded = load_session(&reopened, GeoPoint::new(0.0, 0.0))
        .expect("load")
        .expect("session present");
    assert_eq!(loaded, snapshot);
}
