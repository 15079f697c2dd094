// Fixture list helpers and the double-gameweek expected-points adjustment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::player::PlayerRecord;

/// One scheduled match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    /// Gameweek the match belongs to.
    pub event: u32,
    pub team_h: u32,
    pub team_a: u32,
}

impl Fixture {
    pub fn involves(&self, team_id: u32) -> bool {
        self.team_h == team_id || self.team_a == team_id
    }
}

/// Number of matches `team_id` plays in gameweek `gw` (0 for a blank week).
pub fn team_fixture_count(fixtures: &[Fixture], gw: u32, team_id: u32) -> usize {
    fixtures
        .iter()
        .filter(|f| f.event == gw && f.involves(team_id))
        .count()
}

/// Like [`team_fixture_count`] but never below one, so blank weeks are not
/// scaled down.
pub fn team_matches_in_gw(fixtures: &[Fixture], gw: u32, team_id: u32) -> usize {
    team_fixture_count(fixtures, gw, team_id).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DgwParams {
    /// Multiplier gain per extra match (two matches: 1 + alpha).
    pub alpha_per_extra_match: f64,
    /// Availability below this is treated as a rotation or injury risk.
    pub availability_floor: f64,
    /// Extra factor applied to risky players.
    pub availability_penalty: f64,
}

impl Default for DgwParams {
    fn default() -> Self {
        DgwParams {
            alpha_per_extra_match: 0.65,
            availability_floor: 0.50,
            availability_penalty: 0.80,
        }
    }
}

/// Return a copy of `players` with expected points scaled for gameweek `gw`.
///
/// Clubs with more than one match get `1 + alpha * (matches - 1)`. Players
/// below the availability floor are further multiplied by the penalty.
/// Missing availability counts as fully available. Without a fixture list
/// the players come back unchanged.
pub fn adjust_expected_points_for_gw(
    players: &[PlayerRecord],
    fixtures: Option<&[Fixture]>,
    gw: u32,
    params: &DgwParams,
) -> Vec<PlayerRecord> {
    let Some(fixtures) = fixtures else {
        return players.to_vec();
    };

    let mut matches: HashMap<u32, usize> = HashMap::new();
    players
        .iter()
        .map(|p| {
            let m = *matches
                .entry(p.team_id)
                .or_insert_with(|| team_matches_in_gw(fixtures, gw, p.team_id));
            let mut ep = p.expected_points;
            if m > 1 {
                ep *= 1.0 + params.alpha_per_extra_match * (m - 1) as f64;
            }
            if p.availability_or(1.0) < params.availability_floor {
                ep *= params.availability_penalty;
            }
            PlayerRecord {
                expected_points: ep,
                ..p.clone()
            }
        })
        .collect()
}
