//! Single-slot inventory held by the player.

use geocache_core::TokenValue;

/// Holds at most one token value at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Inventory {
    held: Option<TokenValue>,
}

impl Inventory {
    /// Places a value in the slot, replacing whatever was held.
    pub(crate) fn hold(&mut self, value: TokenValue) {
        self.held = Some(value);
    }

    /// Empties the slot, returning what it held.
    pub(crate) fn release(&mut self) -> Option<TokenValue> {
        self.held.take()
    }

    pub(crate) fn is_holding(&self) -> bool {
        self.held.is_some()
    }

    pub(crate) fn peek(&self) -> Option<TokenValue> {
        self.held
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_overwrites_and_release_clears() {
        let mut inventory = Inventory::default();
        assert!(!inventory.is_holding());

        inventory.hold(TokenValue::new(2).expect("positive"));
        inventory.hold(TokenValue::new(8).expect("positive"));
        assert_eq!(inventory.peek(), TokenValue::new(8));

        assert_eq!(inventory.release(), TokenValue::new(8));
        assert!(!inventory.is_holding());
        assert_eq!(inventory.release(), None);
    }
}
