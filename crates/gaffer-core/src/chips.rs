// Chip advisor: threshold heuristics over the chosen XI, bench and captain.
//
// Each chip is judged independently; nothing here prevents two chips from
// being recommended for the same gameweek.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::fixtures::{team_fixture_count, Fixture};
use crate::player::PlayerPool;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChipThresholds {
    /// Minimum summed bench expected points for bench boost.
    pub bench_boost_min_bench_ep: f64,
    pub triple_captain_min_ep: f64,
    /// Lower bar when the captain's club plays twice.
    pub triple_captain_min_ep_if_double: f64,
    /// Free hit is suggested below this many likely starters.
    pub free_hit_min_active_starters: usize,
    /// Availability at or above which a player counts as a likely starter.
    pub likely_starter_availability: f64,
}

impl Default for ChipThresholds {
    fn default() -> Self {
        ChipThresholds {
            bench_boost_min_bench_ep: 20.0,
            triple_captain_min_ep: 9.0,
            triple_captain_min_ep_if_double: 7.5,
            free_hit_min_active_starters: 9,
            likely_starter_availability: 0.70,
        }
    }
}

/// Which chips the manager still holds. Unlisted chips are unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChipsAvailable {
    pub bench_boost: bool,
    pub triple_captain: bool,
    pub free_hit: bool,
    pub wildcard: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChipKind {
    BenchBoost,
    TripleCaptain,
    FreeHit,
    Wildcard,
}

impl ChipKind {
    pub const ALL: [ChipKind; 4] = [
        ChipKind::BenchBoost,
        ChipKind::TripleCaptain,
        ChipKind::FreeHit,
        ChipKind::Wildcard,
    ];

    pub fn display_str(&self) -> &'static str {
        match self {
            ChipKind::BenchBoost => "bench_boost",
            ChipKind::TripleCaptain => "triple_captain",
            ChipKind::FreeHit => "free_hit",
            ChipKind::Wildcard => "wildcard",
        }
    }
}

impl fmt::Display for ChipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_str())
    }
}

/// Supporting numbers behind a recommendation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChipMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bench_ep: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captain_ep: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captain_double: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_likely_starters: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipAdvice {
    pub recommended: bool,
    pub reason: String,
    #[serde(default)]
    pub metrics: ChipMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipReport {
    pub bench_boost: ChipAdvice,
    pub triple_captain: ChipAdvice,
    pub free_hit: ChipAdvice,
    pub wildcard: ChipAdvice,
}

impl ChipReport {
    pub fn get(&self, kind: ChipKind) -> &ChipAdvice {
        match kind {
            ChipKind::BenchBoost => &self.bench_boost,
            ChipKind::TripleCaptain => &self.triple_captain,
            ChipKind::FreeHit => &self.free_hit,
            ChipKind::Wildcard => &self.wildcard,
        }
    }

    pub fn recommended(&self) -> Vec<ChipKind> {
        ChipKind::ALL
            .into_iter()
            .filter(|&k| self.get(k).recommended)
            .collect()
    }
}

/// The XI decision a chip report is built on.
#[derive(Debug, Clone, Copy)]
pub struct LineupView<'a> {
    pub starting_ids: &'a [u32],
    pub bench_ids: &'a [u32],
    pub captain_id: u32,
}

/// Judge every chip for gameweek `gw`.
///
/// Players missing from the pool contribute zero expected points and count
/// as unlikely starters. Missing availability counts as likely to start.
/// Without a fixture list the captain is assumed to play once.
pub fn suggest_chips(
    gw: u32,
    pool: &PlayerPool,
    fixtures: Option<&[Fixture]>,
    lineup: LineupView<'_>,
    available: &ChipsAvailable,
    thresholds: &ChipThresholds,
) -> ChipReport {
    let ep = |id: u32| pool.get(id).map(|p| p.expected_points).unwrap_or(0.0);

    // Bench boost
    let bench_ep: f64 = lineup.bench_ids.iter().map(|&id| ep(id)).sum();
    let bb_metrics = ChipMetrics {
        bench_ep: Some(bench_ep),
        ..ChipMetrics::default()
    };
    let bench_boost = if available.bench_boost && bench_ep >= thresholds.bench_boost_min_bench_ep {
        ChipAdvice {
            recommended: true,
            reason: format!(
                "bench EP {bench_ep:.1} >= {:.1}",
                thresholds.bench_boost_min_bench_ep
            ),
            metrics: bb_metrics,
        }
    } else {
        ChipAdvice {
            recommended: false,
            reason: unavailable_or(available.bench_boost, "bench EP below threshold"),
            metrics: bb_metrics,
        }
    };

    // Triple captain
    let captain_ep = ep(lineup.captain_id);
    let is_double = match (fixtures, pool.get(lineup.captain_id)) {
        (Some(fixtures), Some(captain)) => team_fixture_count(fixtures, gw, captain.team_id) >= 2,
        _ => false,
    };
    let tc_threshold = if is_double {
        thresholds.triple_captain_min_ep_if_double
    } else {
        thresholds.triple_captain_min_ep
    };
    let tc_metrics = ChipMetrics {
        captain_ep: Some(captain_ep),
        captain_double: Some(is_double),
        ..ChipMetrics::default()
    };
    let triple_captain = if available.triple_captain && captain_ep >= tc_threshold {
        let suffix = if is_double { " (double GW)" } else { "" };
        ChipAdvice {
            recommended: true,
            reason: format!("captain EP {captain_ep:.1} >= {tc_threshold:.1}{suffix}"),
            metrics: tc_metrics,
        }
    } else {
        ChipAdvice {
            recommended: false,
            reason: unavailable_or(available.triple_captain, "captain EP below threshold"),
            metrics: tc_metrics,
        }
    };

    // Free hit
    let active = lineup
        .starting_ids
        .iter()
        .chain(lineup.bench_ids)
        .filter_map(|&id| pool.get(id))
        .filter(|p| p.availability_or(1.0) >= thresholds.likely_starter_availability)
        .count();
    let fh_metrics = ChipMetrics {
        active_likely_starters: Some(active),
        ..ChipMetrics::default()
    };
    let free_hit = if available.free_hit && active < thresholds.free_hit_min_active_starters {
        ChipAdvice {
            recommended: true,
            reason: format!(
                "only {active} likely starters < {}",
                thresholds.free_hit_min_active_starters
            ),
            metrics: fh_metrics,
        }
    } else {
        ChipAdvice {
            recommended: false,
            reason: unavailable_or(available.free_hit, "enough active starters"),
            metrics: fh_metrics,
        }
    };

    // Wildcard is a structural call over several weeks; never automatic.
    let wildcard = ChipAdvice {
        recommended: false,
        reason: "not auto-triggered (needs structural check)".to_string(),
        metrics: ChipMetrics::default(),
    };

    let report = ChipReport {
        bench_boost,
        triple_captain,
        free_hit,
        wildcard,
    };
    info!("chip advice for GW{gw}: recommended {:?}", report.recommended());
    report
}

fn unavailable_or(available: bool, reason: &str) -> String {
    if available {
        reason.to_string()
    } else {
        "chip not available".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::test_support::player;
    use crate::player::{PlayerRecord, Position};

    /// Starters 1-11, bench 12-15, captain 11.
    fn pool(bench_ep: f64, captain_ep: f64) -> PlayerPool {
        let mut players: Vec<PlayerRecord> = (1..=10)
            .map(|id| player(id, Position::Midfielder, id, 5.0, 4.0))
            .collect();
        players.push(player(11, Position::Forward, 11, 10.0, captain_ep));
        for id in 12..=15 {
            players.push(player(id, Position::Defender, id, 4.5, bench_ep));
        }
        PlayerPool::new(players)
    }

    fn all_available() -> ChipsAvailable {
        ChipsAvailable {
            bench_boost: true,
            triple_captain: true,
            free_hit: true,
            wildcard: true,
        }
    }

    const STARTERS: [u32; 11] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
    const BENCH: [u32; 4] = [12, 13, 14, 15];

    fn view() -> LineupView<'static> {
        LineupView {
            starting_ids: &STARTERS,
            bench_ids: &BENCH,
            captain_id: 11,
        }
    }

    #[test]
    fn strong_bench_triggers_bench_boost() {
        let pool = pool(6.0, 7.0);
        let report = suggest_chips(
            3,
            &pool,
            None,
            view(),
            &all_available(),
            &ChipThresholds::default(),
        );
        assert!(report.bench_boost.recommended);
        assert_eq!(report.bench_boost.metrics.bench_ep, Some(24.0));
        assert!(!report.triple_captain.recommended);
        assert_eq!(report.recommended(), vec![ChipKind::BenchBoost]);
    }

    #[test]
    fn unavailable_chip_is_never_recommended() {
        let pool = pool(6.0, 12.0);
        let report = suggest_chips(
            3,
            &pool,
            None,
            view(),
            &ChipsAvailable::default(),
            &ChipThresholds::default(),
        );
        assert!(report.recommended().is_empty());
        assert_eq!(report.bench_boost.reason, "chip not available");
        assert_eq!(report.triple_captain.metrics.captain_ep, Some(12.0));
    }

    #[test]
    fn double_fixture_lowers_triple_captain_bar() {
        let pool = pool(2.0, 8.0);
        let thresholds = ChipThresholds::default();

        let single = suggest_chips(4, &pool, None, view(), &all_available(), &thresholds);
        assert!(!single.triple_captain.recommended);
        assert_eq!(single.triple_captain.metrics.captain_double, Some(false));

        let fixtures = vec![
            Fixture { event: 4, team_h: 11, team_a: 2 },
            Fixture { event: 4, team_h: 3, team_a: 11 },
        ];
        let double = suggest_chips(4, &pool, Some(&fixtures), view(), &all_available(), &thresholds);
        assert!(double.triple_captain.recommended);
        assert_eq!(double.triple_captain.metrics.captain_double, Some(true));
        assert!(double.triple_captain.reason.contains("double GW"));

        // Fixtures in another gameweek do not count.
        let other = suggest_chips(5, &pool, Some(&fixtures), view(), &all_available(), &thresholds);
        assert!(!other.triple_captain.recommended);
    }

    #[test]
    fn doubtful_squad_triggers_free_hit() {
        let players: Vec<PlayerRecord> = pool(2.0, 6.0)
            .iter()
            .map(|p| {
                let mut p = p.clone();
                if p.player_id <= 7 {
                    p.availability_score = Some(0.4);
                }
                p
            })
            .collect();
        let pool = PlayerPool::new(players);
        let report = suggest_chips(
            1,
            &pool,
            None,
            view(),
            &all_available(),
            &ChipThresholds::default(),
        );
        assert!(report.free_hit.recommended);
        assert_eq!(report.free_hit.metrics.active_likely_starters, Some(8));
    }

    #[test]
    fn missing_availability_counts_as_likely() {
        let players: Vec<PlayerRecord> = pool(2.0, 6.0)
            .iter()
            .map(|p| PlayerRecord {
                availability_score: None,
                ..p.clone()
            })
            .collect();
        let pool = PlayerPool::new(players);
        let report = suggest_chips(
            1,
            &pool,
            None,
            view(),
            &all_available(),
            &ChipThresholds::default(),
        );
        assert!(!report.free_hit.recommended);
        assert_eq!(report.free_hit.metrics.active_likely_starters, Some(15));
    }

    #[test]
    fn wildcard_is_never_automatic() {
        let pool = pool(10.0, 15.0);
        let report = suggest_chips(
            1,
            &pool,
            None,
            view(),
            &all_available(),
            &ChipThresholds::default(),
        );
        assert!(!report.wildcard.recommended);
        assert!(report.wildcard.reason.contains("structural"));
    }

    #[test]
    fn report_serializes_with_chip_keys() {
        let pool = pool(6.0, 7.0);
        let report = suggest_chips(
            3,
            &pool,
            None,
            view(),
            &all_available(),
            &ChipThresholds::default(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["bench_boost"]["recommended"], true);
        assert_eq!(json["bench_boost"]["metrics"]["bench_ep"], 24.0);
        assert!(json["wildcard"]["metrics"].as_object().unwrap().is_empty());
    }
}
