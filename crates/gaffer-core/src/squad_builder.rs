// Cold-start squad selection: pick 15 players from the whole pool under the
// budget, the 2/5/5/3 quota and the per-club cap.

use good_lp::{constraint, microlp, variable, Expression, ProblemVariables, Solution, SolverModel, Variable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::error::{infeasible, OptimizerError, Result};
use crate::finance::{from_tenths, to_tenths};
use crate::player::{PlayerPool, PlayerRecord, Position, MAX_PER_CLUB, SQUAD_SIZE};
use crate::selection::SelectionFilter;

/// Availability assumed for players without a score.
const DEFAULT_AVAILABILITY: f64 = 0.8;

/// Objective weights and budget for the builder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildParams {
    pub budget: f64,
    pub w_ep: f64,
    pub w_avail: f64,
    /// Weight on points per £m.
    pub w_vpm: f64,
}

impl Default for BuildParams {
    fn default() -> Self {
        BuildParams {
            budget: 100.0,
            w_ep: 1.0,
            w_avail: 0.5,
            w_vpm: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltSquad {
    pub player_ids: Vec<u32>,
    pub cost: f64,
    /// budget - cost
    pub bank: f64,
}

fn builder_score(p: &PlayerRecord, params: &BuildParams) -> f64 {
    let value_per_million = p.expected_points / p.price_now.max(1e-6);
    params.w_ep * p.expected_points
        + params.w_avail * p.availability_or(DEFAULT_AVAILABILITY)
        + params.w_vpm * value_per_million
}

/// Select an initial 15-player squad.
///
/// Exclusions from `filter` are applied before optimization; players named
/// in `filter.always_include` survive the exclusions and are forced into the
/// squad. Fails with `Infeasible` when the pool, quotas or budget (given the
/// forced players) admit no squad.
pub fn build_initial_squad(
    pool: &PlayerPool,
    params: &BuildParams,
    filter: &SelectionFilter,
) -> Result<BuiltSquad> {
    if !params.budget.is_finite() || params.budget <= 0.0 {
        return Err(OptimizerError::InvalidInput(format!(
            "budget must be positive, got {}",
            params.budget
        )));
    }

    let candidates: Vec<&PlayerRecord> = pool.iter().filter(|p| filter.allows(p)).collect();
    info!(
        "squad builder: {} of {} players eligible, budget {:.1}",
        candidates.len(),
        pool.len(),
        params.budget
    );

    for name in &filter.always_include {
        if !candidates.iter().any(|p| &p.web_name == name) {
            warn!("always-include player '{}' not found in the pool", name);
        }
    }

    let mut vars = ProblemVariables::new();
    let pick: Vec<Variable> = candidates
        .iter()
        .map(|_| vars.add(variable().binary()))
        .collect();

    let objective: Expression = candidates
        .iter()
        .zip(&pick)
        .map(|(p, &x)| builder_score(p, params) * x)
        .sum();
    let mut model = vars.maximise(objective).using(microlp);

    let squad_size = SQUAD_SIZE as f64;
    let selected: Expression = pick.iter().copied().sum();
    model = model.with(constraint!(selected == squad_size));

    for pos in Position::ALL {
        let quota = pos.squad_quota() as f64;
        let in_pos: Expression = candidates
            .iter()
            .zip(&pick)
            .filter(|(p, _)| p.position == pos)
            .map(|(_, &x)| x)
            .sum();
        model = model.with(constraint!(in_pos == quota));
    }

    let mut by_club: BTreeMap<u32, Vec<Variable>> = BTreeMap::new();
    for (p, &x) in candidates.iter().zip(&pick) {
        by_club.entry(p.team_id).or_default().push(x);
    }
    let club_cap = MAX_PER_CLUB as f64;
    for members in by_club.values() {
        if members.len() > MAX_PER_CLUB {
            let in_club: Expression = members.iter().copied().sum();
            model = model.with(constraint!(in_club <= club_cap));
        }
    }

    // Budget in tenths keeps the coefficients integral.
    let budget_tenths = to_tenths(params.budget) as f64;
    let spend: Expression = candidates
        .iter()
        .zip(&pick)
        .map(|(p, &x)| to_tenths(p.price_now) as f64 * x)
        .sum();
    model = model.with(constraint!(spend <= budget_tenths));

    for (p, &x) in candidates.iter().zip(&pick) {
        if filter.is_always_included(p) {
            model = model.with(constraint!(x == 1.0));
        }
    }

    let solution = model.solve().map_err(|e| infeasible("initial squad", e))?;

    let chosen: Vec<&PlayerRecord> = candidates
        .iter()
        .zip(&pick)
        .filter(|(_, x)| solution.value(**x) > 0.5)
        .map(|(p, _)| *p)
        .collect();

    let cost_tenths: i64 = chosen.iter().map(|p| to_tenths(p.price_now)).sum();
    let built = BuiltSquad {
        player_ids: chosen.iter().map(|p| p.player_id).collect(),
        cost: from_tenths(cost_tenths),
        bank: from_tenths(to_tenths(params.budget) - cost_tenths),
    };
    info!(
        "squad builder: selected {} players, cost {:.1}, bank {:.1}",
        built.player_ids.len(),
        built.cost,
        built.bank
    );
    Ok(built)
}
