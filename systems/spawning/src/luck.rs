//! Deterministic luck function deciding where caches appear.

use geocache_core::CellCoord;
use sha2::{Digest, Sha256};

const MANTISSA_BITS: u32 = 53;

/// Maps a key to a reproducible value in `[0, 1)`.
///
/// The same key yields the same value on every call and in every process.
#[must_use]
pub fn luck(key: &str) -> f64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let bits = u64::from_le_bytes(bytes) >> (64 - MANTISSA_BITS);
    bits as f64 / (1u64 << MANTISSA_BITS) as f64
}

/// Luck of a grid cell, keyed by its `"x,y"` label.
#[must_use]
pub fn cell_luck(cell: CellCoord) -> f64 {
    luck(&cell.key())
}

/// Reports whether the cell hosts a cache under the provided spawn probability.
#[must_use]
pub fn selects(cell: CellCoord, spawn_probability: f64) -> bool {
    cell_luck(cell) < spawn_probability
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luck_stays_in_unit_interval() {
        for x in -20..20 {
            for y in -20..20 {
                let value = cell_luck(CellCoord::new(x, y));
                assert!((0.0..1.0).contains(&value), "luck {value} out of range");
            }
        }
    }

    #[test]
    fn luck_depends_on_key() {
        assert_ne!(luck("0,1"), luck("1,0"));
        assert_eq!(luck("369979,-1220571"), luck("369979,-1220571"));
    }
}
