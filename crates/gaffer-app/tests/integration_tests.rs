// Integration tests for the gaffer app.
//
// These run the same steps as the CLI against the fixture CSVs in a scratch
// directory: first-run config copy, cold-start squad build, optimize with
// chip advice and summary output, and applying the plan back to squad.toml.

use std::fs;
use std::path::{Path, PathBuf};

use gaffer_app::config::{ensure_config_files, load_config_from, Config};
use gaffer_app::data::{load_fixtures, load_predictions};
use gaffer_app::pipeline::{
    prepare_pool, price_map, run_build_squad, run_optimize, OptimizeOutcome, OptimizeOverrides,
};
use gaffer_app::state::{
    apply_built_squad, apply_plan, load_squad_state, save_squad_state, squad_path,
};
use gaffer_app::summary::{load_summary, summary_path, write_summary};
use gaffer_core::fixtures::Fixture;
use gaffer_core::player::meets_squad_quota;

// ===========================================================================
// Test helpers
// ===========================================================================

/// Fixture directory path (relative to the crate root, which is the cwd for
/// `cargo test`).
const FIXTURES: &str = "tests/fixtures";

/// Scratch project with defaults/ copied in and config/ initialized.
fn scratch_project(name: &str) -> (PathBuf, Config) {
    let tmp = std::env::temp_dir().join(name);
    let _ = fs::remove_dir_all(&tmp);
    let defaults = tmp.join("defaults");
    fs::create_dir_all(&defaults).unwrap();
    for file in ["strategy.toml", "squad.toml"] {
        fs::copy(Path::new("defaults").join(file), defaults.join(file)).unwrap();
    }
    let copied = ensure_config_files(&tmp).unwrap();
    assert_eq!(copied.len(), 2);
    let config = load_config_from(&tmp).unwrap();
    (tmp, config)
}

fn fixtures() -> Vec<Fixture> {
    load_fixtures(&Path::new(FIXTURES).join("fixtures.csv"))
        .unwrap()
        .expect("fixture file exists")
}

fn small_search() -> OptimizeOverrides {
    OptimizeOverrides {
        pool_size: Some(2),
        max_transfers: Some(2),
        hit_cost: None,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn fixture_files_load() {
    let players = load_predictions(&Path::new(FIXTURES).join("predictions.csv")).unwrap();
    assert_eq!(players.len(), 64);
    let fixtures = fixtures();
    // The unscheduled row is dropped.
    assert_eq!(fixtures.len(), 11);
}

#[test]
fn optimize_without_squad_reports_missing() {
    let (tmp, config) = scratch_project("gaffer_it_missing_squad");
    let players = load_predictions(&Path::new(FIXTURES).join("predictions.csv")).unwrap();
    let pool = prepare_pool(players, None, None, &config.strategy);
    let state = load_squad_state(&squad_path(&tmp)).unwrap();

    let outcome = run_optimize(
        &config.strategy,
        &pool,
        None,
        &state,
        Some(1),
        true,
        &small_search(),
    )
    .unwrap();
    assert!(matches!(outcome, OptimizeOutcome::SquadMissing));

    let _ = fs::remove_dir_all(&tmp);
}

#[test]
fn double_gameweek_scaling_only_with_gameweek() {
    let (tmp, config) = scratch_project("gaffer_it_dgw");
    let players = load_predictions(&Path::new(FIXTURES).join("predictions.csv")).unwrap();
    let fixtures = fixtures();

    // Team 3 plays twice in GW2.
    let target = players
        .iter()
        .find(|p| p.team_id == 3 && p.availability_or(1.0) >= 0.5)
        .expect("fixture has a fit team-3 player")
        .clone();

    let scaled = prepare_pool(players.clone(), Some(&fixtures), Some(2), &config.strategy);
    let ep = scaled.get(target.player_id).unwrap().expected_points;
    assert!((ep - target.expected_points * 1.65).abs() < 1e-9);

    let single = prepare_pool(players.clone(), Some(&fixtures), Some(1), &config.strategy);
    let ep = single.get(target.player_id).unwrap().expected_points;
    assert!((ep - target.expected_points).abs() < 1e-9);

    let untouched = prepare_pool(players, Some(&fixtures), None, &config.strategy);
    let ep = untouched.get(target.player_id).unwrap().expected_points;
    assert!((ep - target.expected_points).abs() < 1e-9);

    let _ = fs::remove_dir_all(&tmp);
}

#[test]
fn build_optimize_apply_cycle() {
    let (tmp, config) = scratch_project("gaffer_it_cycle");
    let squad_file = squad_path(&tmp);
    let players = load_predictions(&Path::new(FIXTURES).join("predictions.csv")).unwrap();
    let fixtures = fixtures();

    // Cold start: build and store a squad.
    let build_pool = prepare_pool(players.clone(), None, None, &config.strategy);
    let built = run_build_squad(&config.strategy, &build_pool, None, false).unwrap();
    assert_eq!(built.player_ids.len(), 15);
    assert!(built.cost <= config.strategy.budget + 1e-9);

    let empty = load_squad_state(&squad_file).unwrap();
    let stored = apply_built_squad(&empty, &built, &price_map(&build_pool));
    save_squad_state(&squad_file, &stored).unwrap();

    let state = load_squad_state(&squad_file).unwrap();
    assert_eq!(state.squad, built.player_ids);
    assert_eq!(state.purchase_price_map().unwrap().len(), 15);
    assert!(state.updated_at.is_some());

    // Optimize for GW2 with chip advice.
    let gw = 2;
    let pool = prepare_pool(players, Some(&fixtures), Some(gw), &config.strategy);
    let outcome = run_optimize(
        &config.strategy,
        &pool,
        Some(&fixtures),
        &state,
        Some(gw),
        true,
        &small_search(),
    )
    .unwrap();
    let summary = match outcome {
        OptimizeOutcome::Done(summary) => summary,
        OptimizeOutcome::SquadMissing => panic!("squad was stored"),
    };
    assert_eq!(summary.gameweek, Some(gw));
    assert_eq!(summary.lineup.starting_ids.len(), 11);
    let chips = summary.chips.as_ref().expect("chip advice requested");
    assert!(!chips.wildcard.recommended);

    let plan = &summary.transfers.best_plan;
    assert!(plan.net_gain >= -1e-9);
    let new_players = pool.resolve(&plan.new_squad_ids).unwrap();
    assert!(meets_squad_quota(&new_players));

    // Hand-off through summary.json.
    let reports = tmp.join(&config.data_paths.reports_dir);
    let path = summary_path(&reports, gw);
    write_summary(&path, &summary).unwrap();
    assert!(path.ends_with("gw02/summary.json"));
    let loaded = load_summary(&path).unwrap();
    assert_eq!(loaded.transfers.best_plan.new_squad_ids, plan.new_squad_ids);
    assert_eq!(loaded.transfers.best_plan.transfers, plan.transfers);
    assert!((loaded.transfers.best_plan.bank_after - plan.bank_after).abs() < 1e-9);

    // Apply the recommended plan.
    let best = &loaded.transfers.best_plan;
    let next = apply_plan(&state, &best.new_squad_ids, best.bank_after, &price_map(&pool));
    save_squad_state(&squad_file, &next).unwrap();
    let reloaded = load_squad_state(&squad_file).unwrap();
    assert_eq!(reloaded.squad, best.new_squad_ids);
    assert_eq!(reloaded.free_transfers, 1);
    assert!((reloaded.bank - best.bank_after).abs() < 1e-9);
    let prices = reloaded.purchase_price_map().unwrap();
    let original = state.purchase_price_map().unwrap();
    for id in &best.new_squad_ids {
        if let Some(paid) = original.get(id) {
            assert_eq!(prices.get(id), Some(paid));
        }
    }

    let _ = fs::remove_dir_all(&tmp);
}

#[test]
fn zero_transfer_override_keeps_squad() {
    let (tmp, config) = scratch_project("gaffer_it_no_transfers");
    let players = load_predictions(&Path::new(FIXTURES).join("predictions.csv")).unwrap();
    let pool = prepare_pool(players, None, None, &config.strategy);

    let built = run_build_squad(&config.strategy, &pool, None, true).unwrap();
    let state = apply_built_squad(
        &load_squad_state(&squad_path(&tmp)).unwrap(),
        &built,
        &price_map(&pool),
    );

    let overrides = OptimizeOverrides {
        max_transfers: Some(0),
        ..small_search()
    };
    let outcome =
        run_optimize(&config.strategy, &pool, None, &state, None, true, &overrides).unwrap();
    let OptimizeOutcome::Done(summary) = outcome else {
        panic!("expected a summary");
    };
    assert_eq!(summary.transfers.best_plan.transfers, 0);
    assert_eq!(summary.transfers.best_plan.new_squad_ids, built.player_ids);
    // No gameweek, no chip advice.
    assert!(summary.chips.is_none());

    let _ = fs::remove_dir_all(&tmp);
}
