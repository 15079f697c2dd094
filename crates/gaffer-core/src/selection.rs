// Name- and price-based player exclusion, with an always-include override.

use serde::{Deserialize, Serialize};

use crate::player::PlayerRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionFilter {
    /// Players (by display name) never to be selected.
    pub exclude_names: Vec<String>,
    /// Players priced at or above this are excluded.
    pub exclude_price_min: Option<f64>,
    /// Players (by display name) that override both exclusions.
    pub always_include: Vec<String>,
}

impl SelectionFilter {
    pub fn is_always_included(&self, player: &PlayerRecord) -> bool {
        self.always_include.iter().any(|n| n == &player.web_name)
    }

    pub fn is_name_excluded(&self, player: &PlayerRecord) -> bool {
        self.exclude_names.iter().any(|n| n == &player.web_name)
    }

    pub fn is_price_excluded(&self, player: &PlayerRecord) -> bool {
        self.exclude_price_min
            .is_some_and(|floor| player.price_now >= floor)
    }

    /// Whether a player may be selected.
    pub fn allows(&self, player: &PlayerRecord) -> bool {
        if self.is_always_included(player) {
            return true;
        }
        !self.is_name_excluded(player) && !self.is_price_excluded(player)
    }
}
