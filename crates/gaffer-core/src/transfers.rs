// Transfer search over 0, 1 and 2 player swaps.
//
// Every candidate plan is pruned with cheap checks (club cap, quota, an
// approximate budget on current prices), scored by re-solving the starting
// XI, and then re-checked against the precise resale accounting. The
// approximate check only prunes; reported bank and value figures come from
// the financial model.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::error::{OptimizerError, Result};
use crate::finance::{compute_available_funds, from_tenths, squad_sale_value, to_tenths};
use crate::lineup::{starting_xi_for_squad, LineupOptions};
use crate::player::{meets_squad_quota, within_club_limit, PlayerPool, PlayerRecord, Position};
use crate::selection::SelectionFilter;
use crate::squad::Squad;

/// Tolerance for comparing scores and money.
const EPS: f64 = 1e-9;

/// Largest number of simultaneous transfers the search enumerates.
pub const MAX_SEARCH_TRANSFERS: usize = 2;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSearchParams {
    /// Replacement candidates considered per position.
    pub pool_size: usize,
    /// 0, 1 or 2.
    pub max_transfers: usize,
    /// Points deducted per transfer beyond the free allowance.
    pub hit_cost: u32,
    /// Weight on squad-value change when ranking plans.
    pub value_weight: f64,
    /// Reject plans leaving less than this in the bank.
    pub min_bank_after: Option<f64>,
    /// Reject plans losing more than this much squad value.
    pub max_value_drop: Option<f64>,
}

impl Default for TransferSearchParams {
    fn default() -> Self {
        TransferSearchParams {
            pool_size: 12,
            max_transfers: 2,
            hit_cost: 4,
            value_weight: 0.0,
            min_bank_after: None,
            max_value_drop: None,
        }
    }
}

impl TransferSearchParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_transfers > MAX_SEARCH_TRANSFERS {
            return Err(OptimizerError::InvalidInput(format!(
                "max_transfers must be at most {MAX_SEARCH_TRANSFERS}, got {}",
                self.max_transfers
            )));
        }
        if !self.value_weight.is_finite() {
            return Err(OptimizerError::InvalidInput(
                "value_weight must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// Everything the search needs besides the pool and the squad.
#[derive(Debug, Clone, Default)]
pub struct TransferSearchOptions {
    pub params: TransferSearchParams,
    pub selection: SelectionFilter,
    pub lineup: LineupOptions,
    /// Market prices that replace the pool's `price_now`.
    pub price_overrides: HashMap<u32, f64>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferPlan {
    pub transfers: usize,
    pub out_ids: Vec<u32>,
    pub in_ids: Vec<u32>,
    pub new_points: f64,
    /// new_points - baseline - hit_cost
    pub net_gain: f64,
    /// Total point penalty for this plan.
    pub hit_cost: u32,
    pub new_squad_ids: Vec<u32>,
    pub bank_after: f64,
    pub squad_value_before: f64,
    pub squad_value_after: f64,
    pub squad_value_delta: f64,
}

impl TransferPlan {
    fn score(&self, value_weight: f64) -> f64 {
        self.net_gain + value_weight * self.squad_value_delta
    }

    /// Ranking used to choose between plans: score first, then the larger
    /// squad-value change.
    fn beats(&self, other: &TransferPlan, value_weight: f64) -> bool {
        let (a, b) = (self.score(value_weight), other.score(value_weight));
        if a > b + EPS {
            return true;
        }
        (a - b).abs() <= EPS && self.squad_value_delta > other.squad_value_delta + EPS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSearchResult {
    pub baseline_points: f64,
    pub best_plan: TransferPlan,
    /// Plans enumerated, including the keep plan.
    pub plans_enumerated: usize,
    /// Plans that survived pruning and were scored.
    pub plans_evaluated: usize,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Expected XI points (captain doubled) for a squad given by ids.
///
/// Fails with `InvalidSquad` before any solver call if the squad is not 15
/// distinct players in a 2/5/5/3 shape.
pub fn evaluate_squad_points(pool: &PlayerPool, squad_ids: &[u32], lineup: &LineupOptions) -> Result<f64> {
    Ok(starting_xi_for_squad(pool, squad_ids, lineup)?.expected_points)
}

#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    out_ids: Vec<u32>,
    in_ids: Vec<u32>,
}

struct SearchContext<'a> {
    pool: &'a PlayerPool,
    squad: &'a Squad,
    options: &'a TransferSearchOptions,
    baseline_points: f64,
    price_now: HashMap<u32, f64>,
    value_before: f64,
}

/// Find the best plan of at most `max_transfers` swaps.
///
/// The keep-everything plan is always a candidate, so the returned plan
/// never has a negative net gain.
pub fn best_transfers(
    pool: &PlayerPool,
    squad: &Squad,
    options: &TransferSearchOptions,
) -> Result<TransferSearchResult> {
    let params = &options.params;
    params.validate()?;

    let pool = pool.with_price_overrides(&options.price_overrides);
    let baseline_points = evaluate_squad_points(&pool, &squad.player_ids, &options.lineup)?;

    let price_now: HashMap<u32, f64> = pool.iter().map(|p| (p.player_id, p.price_now)).collect();
    let value_before = squad_sale_value(&squad.player_ids, &price_now, &squad.purchase_prices);

    let ctx = SearchContext {
        pool: &pool,
        squad,
        options,
        baseline_points,
        price_now,
        value_before,
    };

    let candidates = enumerate_candidates(&pool, squad, params, &options.selection);
    let plans_enumerated = candidates.len() + 1;

    let survivors: Vec<(Candidate, Vec<u32>)> = candidates
        .into_iter()
        .filter_map(|c| ctx.apply_swaps(&c).map(|ids| (c, ids)))
        .collect();
    let plans_evaluated = survivors.len() + 1;

    info!(
        "transfer search: baseline {:.2}, {} plans enumerated, {} survive pruning",
        baseline_points, plans_enumerated, plans_evaluated
    );

    // Results keep enumeration order so the reduction below is identical
    // to a sequential scan.
    let evaluated: Vec<Option<TransferPlan>> = survivors
        .par_iter()
        .map(|(c, new_ids)| ctx.evaluate(c, new_ids))
        .collect::<Result<Vec<_>>>()?;

    let mut best = ctx.keep_plan();
    for plan in evaluated.into_iter().flatten() {
        // A plan losing points is never preferred to standing still, even
        // when the value weight would favour it.
        if plan.net_gain < -EPS {
            continue;
        }
        if plan.beats(&best, params.value_weight) {
            best = plan;
        }
    }

    info!(
        "transfer search: best plan {} transfer(s), out {:?}, in {:?}, net gain {:.2}",
        best.transfers, best.out_ids, best.in_ids, best.net_gain
    );

    Ok(TransferSearchResult {
        baseline_points,
        best_plan: best,
        plans_enumerated,
        plans_evaluated,
    })
}

/// Top `size` same-position replacements by expected points, skipping
/// current squad members and players the filter rejects.
fn candidate_pool(
    pool: &PlayerPool,
    exclude: &HashSet<u32>,
    position: Position,
    size: usize,
    selection: &SelectionFilter,
) -> Vec<u32> {
    let mut eligible: Vec<&PlayerRecord> = pool
        .iter()
        .filter(|p| p.position == position)
        .filter(|p| !exclude.contains(&p.player_id))
        .filter(|p| selection.allows(p))
        .collect();
    eligible.sort_by(|a, b| {
        b.expected_points
            .partial_cmp(&a.expected_points)
            .unwrap_or(Ordering::Equal)
    });
    eligible.truncate(size);
    eligible.iter().map(|p| p.player_id).collect()
}

fn replacements_for<'a>(pool: &PlayerPool, pools: &'a HashMap<Position, Vec<u32>>, id: u32) -> &'a [u32] {
    pool.get(id)
        .and_then(|p| pools.get(&p.position))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Enumerate 1- and 2-swap candidates (the keep plan is handled separately).
fn enumerate_candidates(
    pool: &PlayerPool,
    squad: &Squad,
    params: &TransferSearchParams,
    selection: &SelectionFilter,
) -> Vec<Candidate> {
    let current = &squad.player_ids;
    let exclude: HashSet<u32> = current.iter().copied().collect();

    let pools: HashMap<Position, Vec<u32>> = Position::ALL
        .iter()
        .map(|&pos| (pos, candidate_pool(pool, &exclude, pos, params.pool_size, selection)))
        .collect();
    let replacements = |id: u32| replacements_for(pool, &pools, id);

    let mut candidates = Vec::new();

    if params.max_transfers >= 1 {
        for &out in current {
            for &inc in replacements(out) {
                candidates.push(Candidate {
                    out_ids: vec![out],
                    in_ids: vec![inc],
                });
            }
        }
    }

    if params.max_transfers >= 2 {
        // Swapping the two incoming players between the same pair of
        // outgoing players yields the same squad; keep the first.
        let mut seen: HashSet<(u32, u32, u32, u32)> = HashSet::new();
        for (i, &o1) in current.iter().enumerate() {
            for &o2 in &current[i + 1..] {
                for &n1 in replacements(o1) {
                    for &n2 in replacements(o2) {
                        if n1 == n2 {
                            continue;
                        }
                        if !seen.insert((o1, o2, n1.min(n2), n1.max(n2))) {
                            continue;
                        }
                        candidates.push(Candidate {
                            out_ids: vec![o1, o2],
                            in_ids: vec![n1, n2],
                        });
                    }
                }
            }
        }
    }

    candidates
}

impl SearchContext<'_> {
    fn price(&self, id: u32) -> f64 {
        self.price_now.get(&id).copied().unwrap_or(0.0)
    }

    /// The zero-transfer plan.
    fn keep_plan(&self) -> TransferPlan {
        TransferPlan {
            transfers: 0,
            out_ids: vec![],
            in_ids: vec![],
            new_points: self.baseline_points,
            net_gain: 0.0,
            hit_cost: 0,
            new_squad_ids: self.squad.player_ids.clone(),
            bank_after: from_tenths(to_tenths(self.squad.bank)),
            squad_value_before: self.value_before,
            squad_value_after: self.value_before,
            squad_value_delta: 0.0,
        }
    }

    /// Substitute positionally and run the cheap feasibility checks.
    /// Returns the new squad ids, or `None` if the plan is pruned.
    fn apply_swaps(&self, c: &Candidate) -> Option<Vec<u32>> {
        let mut new_ids = self.squad.player_ids.clone();
        for (&out, &inc) in c.out_ids.iter().zip(&c.in_ids) {
            let idx = new_ids.iter().position(|&id| id == out)?;
            new_ids[idx] = inc;
        }

        let players: Vec<&PlayerRecord> = new_ids
            .iter()
            .map(|&id| self.pool.get(id))
            .collect::<Option<_>>()?;

        if !within_club_limit(players.iter().map(|p| p.team_id)) {
            debug!("pruned {:?} -> {:?}: club limit", c.out_ids, c.in_ids);
            return None;
        }

        // Approximate budget on current prices:
        // value - out + in <= value + bank
        let current_value: i64 = self.squad.player_ids.iter().map(|&id| to_tenths(self.price(id))).sum();
        let prices_out: i64 = c.out_ids.iter().map(|&id| to_tenths(self.price(id))).sum();
        let prices_in: i64 = c.in_ids.iter().map(|&id| to_tenths(self.price(id))).sum();
        if current_value - prices_out + prices_in > current_value + to_tenths(self.squad.bank) {
            debug!("pruned {:?} -> {:?}: over budget", c.out_ids, c.in_ids);
            return None;
        }

        if !meets_squad_quota(players.iter().copied()) {
            debug!("pruned {:?} -> {:?}: position quota", c.out_ids, c.in_ids);
            return None;
        }

        Some(new_ids)
    }

    /// Score a surviving plan and apply the precise financial floors.
    fn evaluate(&self, c: &Candidate, new_ids: &[u32]) -> Result<Option<TransferPlan>> {
        let params = &self.options.params;
        let new_points = evaluate_squad_points(self.pool, new_ids, &self.options.lineup)?;

        let transfers = c.out_ids.len();
        let free = self.squad.free_transfers as usize;
        let paid = transfers.saturating_sub(free) as u32;
        let hit_cost = paid.saturating_mul(params.hit_cost);
        let net_gain = new_points - self.baseline_points - f64::from(hit_cost);

        let purchases = &self.squad.purchase_prices;
        let bank_after = compute_available_funds(
            self.squad.bank,
            &c.out_ids,
            &c.in_ids,
            &self.price_now,
            purchases,
        );
        let sold = squad_sale_value(&c.out_ids, &self.price_now, purchases);
        let bought: i64 = c.in_ids.iter().map(|&id| to_tenths(self.price(id))).sum();
        let value_after =
            from_tenths(to_tenths(self.value_before) - to_tenths(sold) + bought);
        let delta = from_tenths(to_tenths(value_after) - to_tenths(self.value_before));

        if let Some(floor) = params.min_bank_after {
            if bank_after < floor - EPS {
                debug!(
                    "rejected {:?} -> {:?}: bank after {:.1} below floor {:.1}",
                    c.out_ids, c.in_ids, bank_after, floor
                );
                return Ok(None);
            }
        }
        if let Some(max_drop) = params.max_value_drop {
            if -delta > max_drop + EPS {
                debug!(
                    "rejected {:?} -> {:?}: squad value drop {:.1} exceeds {:.1}",
                    c.out_ids, c.in_ids, -delta, max_drop
                );
                return Ok(None);
            }
        }

        Ok(Some(TransferPlan {
            transfers,
            out_ids: c.out_ids.clone(),
            in_ids: c.in_ids.clone(),
            new_points,
            net_gain,
            hit_cost,
            new_squad_ids: new_ids.to_vec(),
            bank_after,
            squad_value_before: self.value_before,
            squad_value_after: value_after,
            squad_value_delta: delta,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
