// Run orchestration: turns loaded config, predictions and squad state into
// the XI, transfer and chip decisions for one gameweek.

use anyhow::Context;
use chrono::Utc;
use std::collections::HashMap;
use tracing::info;

use gaffer_core::chips::{suggest_chips, ChipReport, LineupView};
use gaffer_core::fixtures::{adjust_expected_points_for_gw, Fixture};
use gaffer_core::lineup::starting_xi_for_squad;
use gaffer_core::selection::SelectionFilter;
use gaffer_core::squad_builder::{build_initial_squad, BuiltSquad};
use gaffer_core::transfers::{best_transfers, TransferSearchOptions, TransferSearchParams};
use gaffer_core::{PlayerPool, PlayerRecord};

use crate::config::StrategyConfig;
use crate::state::SquadState;
use crate::summary::Summary;

/// Command-line overrides for a single `optimize` run.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizeOverrides {
    pub pool_size: Option<usize>,
    pub max_transfers: Option<usize>,
    pub hit_cost: Option<u32>,
}

impl OptimizeOverrides {
    pub fn apply(&self, params: &TransferSearchParams) -> TransferSearchParams {
        TransferSearchParams {
            pool_size: self.pool_size.unwrap_or(params.pool_size),
            max_transfers: self.max_transfers.unwrap_or(params.max_transfers),
            hit_cost: self.hit_cost.unwrap_or(params.hit_cost),
            ..*params
        }
    }
}

/// Outcome of `optimize`.
#[derive(Debug, Clone)]
pub enum OptimizeOutcome {
    /// No squad recorded yet.
    SquadMissing,
    Done(Box<Summary>),
}

/// Build the player pool for a run, applying the double-gameweek
/// adjustment when it is enabled and a gameweek is known.
pub fn prepare_pool(
    players: Vec<PlayerRecord>,
    fixtures: Option<&[Fixture]>,
    gw: Option<u32>,
    strategy: &StrategyConfig,
) -> PlayerPool {
    match gw {
        Some(gw) if strategy.dgw.enabled && fixtures.is_some() => {
            info!("applying double-gameweek adjustment for GW{gw}");
            PlayerPool::new(adjust_expected_points_for_gw(
                &players,
                fixtures,
                gw,
                &strategy.dgw.params,
            ))
        }
        _ => PlayerPool::new(players),
    }
}

/// Current price of every player in the pool.
pub fn price_map(pool: &PlayerPool) -> HashMap<u32, f64> {
    pool.iter().map(|p| (p.player_id, p.price_now)).collect()
}

/// XI, transfer search and (with a gameweek) chip advice for the persisted
/// squad.
pub fn run_optimize(
    strategy: &StrategyConfig,
    pool: &PlayerPool,
    fixtures: Option<&[Fixture]>,
    state: &SquadState,
    gw: Option<u32>,
    use_chips: bool,
    overrides: &OptimizeOverrides,
) -> anyhow::Result<OptimizeOutcome> {
    if state.is_empty() {
        info!("no squad recorded; initial squad must be built first");
        return Ok(OptimizeOutcome::SquadMissing);
    }
    let squad = state.to_squad().context("invalid squad state")?;

    let lineup = starting_xi_for_squad(pool, &squad.player_ids, &strategy.lineup)
        .context("failed to pick the starting XI")?;
    info!(
        "starting XI {} with {:.2} expected points, captain {}",
        lineup.formation, lineup.expected_points, lineup.captain_id
    );

    let options = TransferSearchOptions {
        params: overrides.apply(&strategy.transfers),
        selection: strategy.selection.clone(),
        lineup: strategy.lineup,
        price_overrides: HashMap::new(),
    };
    let transfers = best_transfers(pool, &squad, &options).context("transfer search failed")?;

    let chips: Option<ChipReport> = match gw {
        Some(gw) if use_chips => Some(suggest_chips(
            gw,
            pool,
            fixtures,
            LineupView {
                starting_ids: &lineup.starting_ids,
                bench_ids: &lineup.bench_ids,
                captain_id: lineup.captain_id,
            },
            &state.chips_available,
            &strategy.chips,
        )),
        _ => None,
    };

    Ok(OptimizeOutcome::Done(Box::new(Summary {
        gameweek: gw,
        generated_at: Utc::now(),
        lineup,
        transfers,
        chips,
    })))
}

/// Run the squad builder with the configured budget and weights.
pub fn run_build_squad(
    strategy: &StrategyConfig,
    pool: &PlayerPool,
    budget: Option<f64>,
    ignore_selection: bool,
) -> anyhow::Result<BuiltSquad> {
    let mut params = strategy.build_params();
    if let Some(budget) = budget {
        params.budget = budget;
    }
    let filter = if ignore_selection {
        SelectionFilter::default()
    } else {
        strategy.selection.clone()
    };
    build_initial_squad(pool, &params, &filter).context("squad builder failed")
}
