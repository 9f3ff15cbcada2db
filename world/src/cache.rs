//! Authoritative cache and token state.

use geocache_core::{CellCoord, GeoPoint, StowedCache, TokenId, TokenValue};

/// Token stored inside an active cache.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Token {
    /// Identifier allocated by the world for the token.
    pub(crate) id: TokenId,
    /// Value currently carried by the token.
    pub(crate) value: TokenValue,
    /// Where the token marker sits.
    pub(crate) position: GeoPoint,
}

/// Materialised cache bound to a single grid cell.
#[derive(Clone, Debug)]
pub(crate) struct Cache {
    cell: CellCoord,
    tokens: Vec<Token>,
}

impl Cache {
    /// Creates an empty cache occupying the provided cell.
    pub(crate) fn new(cell: CellCoord) -> Self {
        Self {
            cell,
            tokens: Vec::new(),
        }
    }

    pub(crate) fn cell(&self) -> CellCoord {
        self.cell
    }

    pub(crate) fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Registers a token with the cache.
    pub(crate) fn add_token(&mut self, id: TokenId, value: TokenValue, position: GeoPoint) -> Token {
        let token = Token {
            id,
            value,
            position,
        };
        self.tokens.push(token);
        token
    }

    /// Detaches the token, handing its value to the caller.
    pub(crate) fn remove_token(&mut self, id: TokenId) -> Option<TokenValue> {
        let index = self.tokens.iter().position(|token| token.id == id)?;
        Some(self.tokens.remove(index).value)
    }

    pub(crate) fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.iter().find(|token| token.id == id)
    }

    pub(crate) fn token_mut(&mut self, id: TokenId) -> Option<&mut Token> {
        self.tokens.iter_mut().find(|token| token.id == id)
    }

    /// Captures the cache contents for storage while it is off screen.
    pub(crate) fn serialize(&self) -> StowedCache {
        let mut stowed = StowedCache::empty();
        for token in &self.tokens {
            stowed.push(token.position, token.value);
        }
        stowed
    }
}
