// Starting-XI selection.
//
// Starters and captain are chosen exactly with a 0/1 integer program. Captain
// thresholds then only choose among those starters; the bench order is a
// separate heuristic sort over the four non-starters.

use good_lp::{constraint, microlp, variable, Expression, ProblemVariables, Solution, SolverModel, Variable};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{infeasible, OptimizerError, Result};
use crate::player::{PlayerPool, PlayerRecord, Position, SQUAD_SIZE};
use crate::squad::resolve_squad;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Allowed starter counts per position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationBounds {
    pub gk_exact: usize,
    pub def_min: usize,
    pub def_max: usize,
    pub mid_min: usize,
    pub mid_max: usize,
    pub fwd_min: usize,
    pub fwd_max: usize,
    pub total_xi: usize,
}

impl Default for FormationBounds {
    fn default() -> Self {
        FormationBounds {
            gk_exact: 1,
            def_min: 3,
            def_max: 5,
            mid_min: 2,
            mid_max: 5,
            fwd_min: 1,
            fwd_max: 3,
            total_xi: 11,
        }
    }
}

impl FormationBounds {
    /// Inclusive (min, max) starters for a position.
    pub fn range(&self, pos: Position) -> (usize, usize) {
        match pos {
            Position::Goalkeeper => (self.gk_exact, self.gk_exact),
            Position::Defender => (self.def_min, self.def_max),
            Position::Midfielder => (self.mid_min, self.mid_max),
            Position::Forward => (self.fwd_min, self.fwd_max),
        }
    }

    /// Check that the bounds are internally consistent.
    pub fn validate(&self) -> Result<()> {
        let mut min_total = 0;
        let mut max_total = 0;
        for pos in Position::ALL {
            let (lo, hi) = self.range(pos);
            if lo > hi {
                return Err(OptimizerError::InvalidInput(format!(
                    "formation bounds for {pos}: min {lo} exceeds max {hi}"
                )));
            }
            min_total += lo;
            max_total += hi;
        }
        if self.total_xi < min_total || self.total_xi > max_total {
            return Err(OptimizerError::InvalidInput(format!(
                "formation total {} outside reachable range {min_total}..={max_total}",
                self.total_xi
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchOrderParams {
    pub weight_ep: f64,
    pub weight_availability: f64,
    /// Always put the backup goalkeeper last.
    pub gk_last: bool,
}

impl Default for BenchOrderParams {
    fn default() -> Self {
        BenchOrderParams {
            weight_ep: 1.0,
            weight_availability: 0.5,
            gk_last: true,
        }
    }
}

/// Optional thresholds a starter must meet to be named captain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptainRules {
    pub min_minutes: Option<u32>,
    pub min_price: Option<f64>,
}

impl CaptainRules {
    pub fn is_unrestricted(&self) -> bool {
        self.min_minutes.is_none() && self.min_price.is_none()
    }

    /// Whether a player passes the thresholds. Unknown minutes fail a
    /// minutes threshold.
    pub fn is_eligible(&self, player: &PlayerRecord) -> bool {
        let minutes_ok = self
            .min_minutes
            .map_or(true, |min| player.minutes.is_some_and(|m| m >= min));
        let price_ok = self
            .min_price
            .map_or(true, |min| player.price_now + 1e-9 >= min);
        minutes_ok && price_ok
    }
}

/// Everything the XI solver needs besides the squad itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineupOptions {
    pub formation: FormationBounds,
    pub bench: BenchOrderParams,
    pub captain: CaptainRules,
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartingXi {
    /// Starters, highest expected points first.
    pub starting_ids: Vec<u32>,
    pub captain_id: u32,
    pub vice_id: u32,
    /// Substitutes in priority order.
    pub bench_ids: Vec<u32>,
    /// e.g. "1-4-4-2"
    pub formation: String,
    /// XI expected points with the captain counted twice.
    pub expected_points: f64,
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Resolve a squad from the pool, enforce the squad invariants, then pick
/// the XI.
pub fn starting_xi_for_squad(
    pool: &PlayerPool,
    squad_ids: &[u32],
    options: &LineupOptions,
) -> Result<StartingXi> {
    let players = resolve_squad(pool, squad_ids)?;
    solve_starting_xi(&players, options)
}

/// Choose 11 starters, a captain and vice, and order the bench.
///
/// Fails with `InvalidSquad` if `squad` is not 15 distinct players and with
/// `Infeasible` if no XI satisfies the formation bounds.
pub fn solve_starting_xi(squad: &[PlayerRecord], options: &LineupOptions) -> Result<StartingXi> {
    if squad.len() != SQUAD_SIZE {
        return Err(OptimizerError::InvalidSquad(format!(
            "starting XI needs {SQUAD_SIZE} players, got {}",
            squad.len()
        )));
    }
    let distinct: HashSet<u32> = squad.iter().map(|p| p.player_id).collect();
    if distinct.len() != squad.len() {
        return Err(OptimizerError::InvalidSquad(
            "starting XI input contains duplicate players".into(),
        ));
    }
    options.formation.validate()?;

    let (starts, captain_idx) = solve_xi_program(squad, &options.formation)?;

    let mut starting: Vec<&PlayerRecord> = squad
        .iter()
        .zip(&starts)
        .filter(|(_, s)| **s)
        .map(|(p, _)| p)
        .collect();
    starting.sort_by(|a, b| cmp_desc(a.expected_points, b.expected_points));

    let Some(&first) = starting.first() else {
        return Err(OptimizerError::Infeasible {
            problem: "starting XI",
            status: "no starters selected".into(),
        });
    };
    let solved_captain = captain_idx.map(|i| &squad[i]).unwrap_or(first);
    let captain = choose_captain(&starting, solved_captain, &options.captain);
    let vice = starting
        .iter()
        .find(|p| p.player_id != captain.player_id)
        .copied()
        .unwrap_or(captain);

    let bench: Vec<&PlayerRecord> = squad
        .iter()
        .zip(&starts)
        .filter(|(_, s)| !**s)
        .map(|(p, _)| p)
        .collect();
    let bench_ids = bench_order(&bench, &options.bench);

    let count = |pos: Position| starting.iter().filter(|p| p.position == pos).count();
    let formation = format!(
        "{}-{}-{}-{}",
        count(Position::Goalkeeper),
        count(Position::Defender),
        count(Position::Midfielder),
        count(Position::Forward)
    );

    let expected_points =
        starting.iter().map(|p| p.expected_points).sum::<f64>() + captain.expected_points;

    debug!(
        "XI {} captain={} vice={} ep={:.2}",
        formation, captain.player_id, vice.player_id, expected_points
    );

    Ok(StartingXi {
        starting_ids: starting.iter().map(|p| p.player_id).collect(),
        captain_id: captain.player_id,
        vice_id: vice.player_id,
        bench_ids,
        formation,
        expected_points,
    })
}

/// Apply the captain thresholds to the chosen starters. The best eligible
/// starter (starters are sorted by expected points) takes the armband; if no
/// starter qualifies, the solver's unrestricted captain is kept.
fn choose_captain<'a>(
    starting: &[&'a PlayerRecord],
    solved: &'a PlayerRecord,
    rules: &CaptainRules,
) -> &'a PlayerRecord {
    if rules.is_unrestricted() {
        return solved;
    }
    match starting.iter().find(|p| rules.is_eligible(p)) {
        Some(&p) => p,
        None => {
            warn!(
                "captain thresholds (min_minutes={:?}, min_price={:?}) exclude every starter; \
                 falling back to unrestricted captaincy",
                rules.min_minutes, rules.min_price
            );
            solved
        }
    }
}

/// maximize  sum(start[p] * ep[p]) + sum(captain[p] * ep[p])
/// s.t.      formation bounds on start, sum(start) = total_xi,
///           captain[p] <= start[p], sum(captain) = 1
fn solve_xi_program(
    squad: &[PlayerRecord],
    bounds: &FormationBounds,
) -> Result<(Vec<bool>, Option<usize>)> {
    let mut vars = ProblemVariables::new();
    let start: Vec<Variable> = squad.iter().map(|_| vars.add(variable().binary())).collect();
    let captain: Vec<Variable> = squad.iter().map(|_| vars.add(variable().binary())).collect();

    let objective: Expression = squad
        .iter()
        .enumerate()
        .map(|(i, p)| p.expected_points * start[i] + p.expected_points * captain[i])
        .sum();

    let mut model = vars.maximise(objective).using(microlp);

    for pos in Position::ALL {
        let (lo, hi) = bounds.range(pos);
        let (lo, hi) = (lo as f64, hi as f64);
        let in_pos: Expression = squad
            .iter()
            .zip(&start)
            .filter(|(p, _)| p.position == pos)
            .map(|(_, &v)| v)
            .sum();
        model = model.with(constraint!(in_pos.clone() >= lo));
        model = model.with(constraint!(in_pos <= hi));
    }

    let total_xi = bounds.total_xi as f64;
    let starters: Expression = start.iter().copied().sum();
    model = model.with(constraint!(starters == total_xi));

    for i in 0..squad.len() {
        let (c, s) = (captain[i], start[i]);
        model = model.with(constraint!(c <= s));
    }
    let captains: Expression = captain.iter().copied().sum();
    model = model.with(constraint!(captains == 1.0));

    let solution = model.solve().map_err(|e| infeasible("starting XI", e))?;

    let starts: Vec<bool> = start.iter().map(|&v| solution.value(v) > 0.5).collect();
    let captain_idx = captain.iter().position(|&v| solution.value(v) > 0.5);
    Ok((starts, captain_idx))
}

// ---------------------------------------------------------------------------
// Bench ordering
// ---------------------------------------------------------------------------

fn bench_score(p: &PlayerRecord, params: &BenchOrderParams) -> f64 {
    params.weight_ep * p.expected_points + params.weight_availability * p.availability_or(1.0)
}

/// Order substitutes: outfield players by weighted score (then expected
/// points), goalkeepers last when `gk_last` is set.
pub fn bench_order(bench: &[&PlayerRecord], params: &BenchOrderParams) -> Vec<u32> {
    let by_score = |a: &&PlayerRecord, b: &&PlayerRecord| {
        cmp_desc(bench_score(a, params), bench_score(b, params))
            .then_with(|| cmp_desc(a.expected_points, b.expected_points))
    };

    if !params.gk_last {
        let mut all: Vec<&PlayerRecord> = bench.to_vec();
        all.sort_by(by_score);
        return all.iter().map(|p| p.player_id).collect();
    }

    let mut outfield: Vec<&PlayerRecord> =
        bench.iter().copied().filter(|p| p.position.is_outfield()).collect();
    outfield.sort_by(by_score);
    let mut keepers: Vec<&PlayerRecord> =
        bench.iter().copied().filter(|p| !p.position.is_outfield()).collect();
    keepers.sort_by(|a, b| cmp_desc(a.expected_points, b.expected_points));

    outfield
        .iter()
        .chain(keepers.iter())
        .map(|p| p.player_id)
        .collect()
}

fn cmp_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
