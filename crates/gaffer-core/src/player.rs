// Player records and positions as consumed by the optimizers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{OptimizerError, Result};

/// Squad size and per-position quota.
pub const SQUAD_SIZE: usize = 15;
/// Maximum number of squad members from a single club.
pub const MAX_PER_CLUB: usize = 3;

/// Playing positions. Serialized using the league's short codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "GK")]
    Goalkeeper,
    #[serde(rename = "DEF")]
    Defender,
    #[serde(rename = "MID")]
    Midfielder,
    #[serde(rename = "FWD")]
    Forward,
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    /// Parse a position code. Accepts the short codes plus a few common
    /// long-form spellings ("GKP", "Goalkeeper", ...).
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GK" | "GKP" | "GOALKEEPER" => Some(Position::Goalkeeper),
            "DEF" | "DEFENDER" => Some(Position::Defender),
            "MID" | "MIDFIELDER" => Some(Position::Midfielder),
            "FWD" | "FW" | "FORWARD" => Some(Position::Forward),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
        }
    }

    /// Number of squad members required at this position (2/5/5/3).
    pub fn squad_quota(&self) -> usize {
        match self {
            Position::Goalkeeper => 2,
            Position::Defender => 5,
            Position::Midfielder => 5,
            Position::Forward => 3,
        }
    }

    pub fn is_outfield(&self) -> bool {
        !matches!(self, Position::Goalkeeper)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_str())
    }
}

/// One row of the prediction table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub player_id: u32,
    pub web_name: String,
    pub team_id: u32,
    pub position: Position,
    /// Current market price in £m, 0.1 granularity.
    pub price_now: f64,
    pub expected_points: f64,
    /// Probability of playing in [0, 1], when known.
    #[serde(default)]
    pub availability_score: Option<f64>,
    /// Season-to-date minutes, when known.
    #[serde(default)]
    pub minutes: Option<u32>,
}

impl PlayerRecord {
    /// Availability with the "assume fit" default.
    pub fn availability_or(&self, default: f64) -> f64 {
        self.availability_score.unwrap_or(default)
    }
}

/// The full player pool with an id index.
#[derive(Debug, Clone, Default)]
pub struct PlayerPool {
    players: Vec<PlayerRecord>,
    by_id: HashMap<u32, usize>,
}

impl PlayerPool {
    /// Build a pool. Later rows replace earlier rows with the same id.
    pub fn new(players: Vec<PlayerRecord>) -> Self {
        let mut pool = PlayerPool::default();
        for p in players {
            pool.insert(p);
        }
        pool
    }

    fn insert(&mut self, player: PlayerRecord) {
        match self.by_id.get(&player.player_id) {
            Some(&idx) => self.players[idx] = player,
            None => {
                self.by_id.insert(player.player_id, self.players.len());
                self.players.push(player);
            }
        }
    }

    pub fn get(&self, id: u32) -> Option<&PlayerRecord> {
        self.by_id.get(&id).map(|&idx| &self.players[idx])
    }

    /// Look up a player, failing with `UnknownPlayer` when absent.
    pub fn require(&self, id: u32) -> Result<&PlayerRecord> {
        self.get(id).ok_or(OptimizerError::UnknownPlayer(id))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn players(&self) -> &[PlayerRecord] {
        &self.players
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Resolve a list of ids into records, in the given order.
    pub fn resolve(&self, ids: &[u32]) -> Result<Vec<PlayerRecord>> {
        ids.iter().map(|&id| self.require(id).cloned()).collect()
    }

    /// Return a copy of the pool with market prices replaced from `overrides`.
    pub fn with_price_overrides(&self, overrides: &HashMap<u32, f64>) -> Self {
        if overrides.is_empty() {
            return self.clone();
        }
        let players = self
            .players
            .iter()
            .map(|p| {
                let mut p = p.clone();
                if let Some(&price) = overrides.get(&p.player_id) {
                    p.price_now = price;
                }
                p
            })
            .collect();
        PlayerPool::new(players)
    }
}

impl From<Vec<PlayerRecord>> for PlayerPool {
    fn from(players: Vec<PlayerRecord>) -> Self {
        PlayerPool::new(players)
    }
}

/// Count squad members per position.
pub fn position_counts<'a, I>(players: I) -> HashMap<Position, usize>
where
    I: IntoIterator<Item = &'a PlayerRecord>,
{
    let mut counts = HashMap::new();
    for p in players {
        *counts.entry(p.position).or_insert(0) += 1;
    }
    counts
}

/// Whether the given records satisfy the 2/5/5/3 squad quota exactly.
pub fn meets_squad_quota<'a, I>(players: I) -> bool
where
    I: IntoIterator<Item = &'a PlayerRecord>,
{
    let counts = position_counts(players);
    let total: usize = counts.values().sum();
    total == SQUAD_SIZE
        && Position::ALL
            .iter()
            .all(|pos| counts.get(pos).copied().unwrap_or(0) == pos.squad_quota())
}

/// Whether no club has more than `MAX_PER_CLUB` members.
pub fn within_club_limit<I>(team_ids: I) -> bool
where
    I: IntoIterator<Item = u32>,
{
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for t in team_ids {
        let c = counts.entry(t).or_insert(0);
        *c += 1;
        if *c > MAX_PER_CLUB {
            return false;
        }
    }
    true
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn player(id: u32, pos: Position, team: u32, price: f64, ep: f64) -> PlayerRecord {
        PlayerRecord {
            player_id: id,
            web_name: format!("P{id}"),
            team_id: team,
            position: pos,
            price_now: price,
            expected_points: ep,
            availability_score: Some(0.9),
            minutes: Some(900),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::player;
    use super::*;

    #[test]
    fn position_codes_parse() {
        assert_eq!(Position::from_str_pos("gk"), Some(Position::Goalkeeper));
        assert_eq!(Position::from_str_pos("GKP"), Some(Position::Goalkeeper));
        assert_eq!(Position::from_str_pos(" DEF "), Some(Position::Defender));
        assert_eq!(Position::from_str_pos("Midfielder"), Some(Position::Midfielder));
        assert_eq!(Position::from_str_pos("FWD"), Some(Position::Forward));
        assert_eq!(Position::from_str_pos("ST"), None);
    }

    #[test]
    fn position_serializes_as_short_code() {
        let json = serde_json::to_string(&Position::Midfielder).unwrap();
        assert_eq!(json, "\"MID\"");
        let back: Position = serde_json::from_str("\"FWD\"").unwrap();
        assert_eq!(back, Position::Forward);
    }

    #[test]
    fn pool_later_rows_replace_earlier() {
        let pool = PlayerPool::new(vec![
            player(1, Position::Defender, 1, 4.5, 3.0),
            player(1, Position::Defender, 1, 4.6, 3.5),
            player(2, Position::Forward, 2, 7.0, 5.0),
        ]);
        assert_eq!(pool.len(), 2);
        assert!((pool.get(1).unwrap().price_now - 4.6).abs() < f64::EPSILON);
    }

    #[test]
    fn require_reports_unknown_player() {
        let pool = PlayerPool::new(vec![player(1, Position::Defender, 1, 4.5, 3.0)]);
        match pool.require(99) {
            Err(OptimizerError::UnknownPlayer(99)) => {}
            other => panic!("expected UnknownPlayer, got {other:?}"),
        }
    }

    #[test]
    fn price_overrides_apply() {
        let pool = PlayerPool::new(vec![
            player(1, Position::Defender, 1, 4.5, 3.0),
            player(2, Position::Forward, 2, 7.0, 5.0),
        ]);
        let overrides = HashMap::from([(2, 7.3)]);
        let updated = pool.with_price_overrides(&overrides);
        assert!((updated.get(2).unwrap().price_now - 7.3).abs() < f64::EPSILON);
        assert!((updated.get(1).unwrap().price_now - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn club_limit_detects_fourth_member() {
        assert!(within_club_limit([1, 1, 1, 2]));
        assert!(!within_club_limit([1, 1, 1, 1]));
    }

    #[test]
    fn squad_quota_requires_exact_shape() {
        let mut squad = Vec::new();
        let mut id = 1;
        for pos in Position::ALL {
            for _ in 0..pos.squad_quota() {
                squad.push(player(id, pos, id, 5.0, 2.0));
                id += 1;
            }
        }
        assert!(meets_squad_quota(&squad));
        squad[0].position = Position::Defender;
        assert!(!meets_squad_quota(&squad));
        squad.pop();
        assert!(!meets_squad_quota(&squad));
    }
}
