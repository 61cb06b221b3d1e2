use orm::tokens::TokenDb;
use serde::Serialize;

use crate::quantity;

/// A player's holding of one token, joined with the token it refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balance {
    pub player_id: i32,
    pub token: TokenDb,
    pub quantity: u64,
}

impl Balance {
    pub fn display_quantity(&self) -> String {
        quantity::display_quantity(self.quantity, self.token.divisible)
    }

    pub fn whole_units(&self) -> f64 {
        quantity::as_whole_units(self.quantity, self.token.divisible)
    }
}
