// The manager's squad as an explicit value, plus composition checks.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{OptimizerError, Result};
use crate::player::{position_counts, PlayerPool, PlayerRecord, Position, SQUAD_SIZE};

/// A 15-player roster with its finances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Squad {
    pub player_ids: Vec<u32>,
    /// Unspent budget in £m.
    pub bank: f64,
    pub free_transfers: u32,
    /// Recorded purchase price per player. Missing entries mean "bought at
    /// the current price".
    #[serde(default)]
    pub purchase_prices: HashMap<u32, f64>,
}

impl Squad {
    pub fn new(player_ids: Vec<u32>, bank: f64, free_transfers: u32) -> Self {
        Squad {
            player_ids,
            bank,
            free_transfers,
            purchase_prices: HashMap::new(),
        }
    }

    pub fn with_purchase_prices(mut self, purchase_prices: HashMap<u32, f64>) -> Self {
        self.purchase_prices = purchase_prices;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.player_ids.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.player_ids.contains(&id)
    }
}

/// Resolve squad ids against the pool and check the squad invariants:
/// exactly 15 distinct players, all known, 2/5/5/3 by position.
///
/// This is the precondition for every squad-level evaluation and runs
/// before any solver is built.
pub fn resolve_squad(pool: &PlayerPool, ids: &[u32]) -> Result<Vec<PlayerRecord>> {
    if ids.len() != SQUAD_SIZE {
        return Err(OptimizerError::InvalidSquad(format!(
            "expected {SQUAD_SIZE} players, got {}",
            ids.len()
        )));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    for &id in ids {
        if !seen.insert(id) {
            return Err(OptimizerError::InvalidSquad(format!(
                "player {id} appears more than once"
            )));
        }
    }

    let players = pool.resolve(ids)?;
    let counts = position_counts(&players);
    for pos in Position::ALL {
        let have = counts.get(&pos).copied().unwrap_or(0);
        if have != pos.squad_quota() {
            return Err(OptimizerError::InvalidSquad(format!(
                "position counts invalid: {} {pos} (need {}); counts GK={} DEF={} MID={} FWD={}",
                have,
                pos.squad_quota(),
                counts.get(&Position::Goalkeeper).copied().unwrap_or(0),
                counts.get(&Position::Defender).copied().unwrap_or(0),
                counts.get(&Position::Midfielder).copied().unwrap_or(0),
                counts.get(&Position::Forward).copied().unwrap_or(0),
            )));
        }
    }

    Ok(players)
}
