// Gaffer entry point.
//
// Subcommands:
// - optimize:    XI, transfer search and chip advice for the recorded squad
// - build-squad: pick an initial 15 from scratch
// - apply:       write a summary's recommended plan back into squad.toml
//
// Logs go to logs/gaffer.log; stdout is reserved for the user-facing report.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use gaffer_app::config::{self, Config};
use gaffer_app::data;
use gaffer_app::pipeline::{self, OptimizeOutcome, OptimizeOverrides};
use gaffer_app::state::{self, SquadState};
use gaffer_app::summary::{self, Summary};
use gaffer_core::PlayerPool;

#[derive(Parser)]
#[command(name = "gaffer")]
#[command(about = "Squad, transfer and chip decisions for Fantasy Premier League", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick the XI, search transfers and judge chips for the current squad
    Optimize {
        /// Target gameweek (enables chip advice, DGW scaling and summary.json)
        #[arg(long)]
        gw: Option<u32>,

        /// Replacement candidates per position
        #[arg(long)]
        pool_size: Option<usize>,

        /// Maximum transfers to consider (0-2)
        #[arg(long)]
        max_transfers: Option<usize>,

        /// Points deducted per paid transfer
        #[arg(long)]
        hit_cost: Option<u32>,

        /// Skip chip advice
        #[arg(long, default_value = "false")]
        no_chips: bool,
    },

    /// Build an initial 15-man squad from the whole player pool
    BuildSquad {
        /// Budget in £m (defaults to [budget].ceiling)
        #[arg(long)]
        budget: Option<f64>,

        /// Ignore the exclusion and always-include lists
        #[arg(long, default_value = "false")]
        ignore_selection: bool,

        /// Store the result in config/squad.toml
        #[arg(long, default_value = "false")]
        write: bool,
    },

    /// Apply the recommended plan from a gameweek's summary.json
    Apply {
        /// Gameweek whose summary to apply
        #[arg(long)]
        gw: u32,

        /// Write the change (otherwise only preview it)
        #[arg(long, default_value = "false")]
        confirm: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing()?;
    info!("gaffer starting up");

    let config = config::load_config().context("failed to load configuration")?;
    let base_dir = std::env::current_dir().context("failed to resolve working directory")?;
    let squad_path = state::squad_path(&base_dir);

    match cli.command {
        Commands::Optimize {
            gw,
            pool_size,
            max_transfers,
            hit_cost,
            no_chips,
        } => {
            let overrides = OptimizeOverrides {
                pool_size,
                max_transfers,
                hit_cost,
            };
            optimize(&config, &squad_path, gw, !no_chips, &overrides)
        }
        Commands::BuildSquad {
            budget,
            ignore_selection,
            write,
        } => build_squad(&config, &squad_path, budget, ignore_selection, write),
        Commands::Apply { gw, confirm } => apply(&config, &squad_path, gw, confirm),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn optimize(
    config: &Config,
    squad_path: &Path,
    gw: Option<u32>,
    use_chips: bool,
    overrides: &OptimizeOverrides,
) -> anyhow::Result<()> {
    let players = data::load_predictions(Path::new(&config.data_paths.predictions))
        .context("failed to load predictions")?;
    let fixtures = data::load_fixtures(Path::new(&config.data_paths.fixtures))
        .context("failed to load fixtures")?;
    let squad_state = state::load_squad_state(squad_path).context("failed to load squad state")?;

    let pool = pipeline::prepare_pool(players, fixtures.as_deref(), gw, &config.strategy);
    let outcome = pipeline::run_optimize(
        &config.strategy,
        &pool,
        fixtures.as_deref(),
        &squad_state,
        gw,
        use_chips,
        overrides,
    )?;

    let summary = match outcome {
        OptimizeOutcome::SquadMissing => {
            println!("Initial squad missing: config/squad.toml has no players.");
            println!("Run `gaffer build-squad --write` to create one, then rerun optimize.");
            return Ok(());
        }
        OptimizeOutcome::Done(summary) => summary,
    };

    print_summary(&summary, &pool);

    match gw {
        Some(gw) => {
            let path = summary::summary_path(Path::new(&config.data_paths.reports_dir), gw);
            summary::write_summary(&path, &summary).context("failed to write summary")?;
            println!("\nSummary written to {}", path.display());
        }
        None => println!("\n(no --gw given; summary.json not written)"),
    }
    Ok(())
}

fn build_squad(
    config: &Config,
    squad_path: &Path,
    budget: Option<f64>,
    ignore_selection: bool,
    write: bool,
) -> anyhow::Result<()> {
    let players = data::load_predictions(Path::new(&config.data_paths.predictions))
        .context("failed to load predictions")?;
    let pool = PlayerPool::new(players);

    let built = pipeline::run_build_squad(&config.strategy, &pool, budget, ignore_selection)?;

    println!("=== Initial Squad ===");
    println!("Cost: {:.1}m  Bank: {:.1}m", built.cost, built.bank);
    for id in &built.player_ids {
        if let Some(p) = pool.get(*id) {
            println!(
                "  {:<3} {:<20} team {:>2}  {:>5.1}m  EP {:.2}",
                p.position.display_str(), p.web_name, p.team_id, p.price_now, p.expected_points
            );
        }
    }

    if write {
        let current = match state::load_squad_state(squad_path) {
            Ok(s) => s,
            Err(config::ConfigError::FileNotFound { .. }) => SquadState::default(),
            Err(e) => return Err(e).context("failed to load squad state"),
        };
        let next = state::apply_built_squad(&current, &built, &pipeline::price_map(&pool));
        state::save_squad_state(squad_path, &next).context("failed to save squad state")?;
        println!("\nWrote {}", squad_path.display());
    }
    Ok(())
}

fn apply(config: &Config, squad_path: &Path, gw: u32, confirm: bool) -> anyhow::Result<()> {
    let path = summary::summary_path(Path::new(&config.data_paths.reports_dir), gw);
    let summary = summary::load_summary(&path).context("failed to load summary")?;
    let plan = &summary.transfers.best_plan;
    if plan.new_squad_ids.is_empty() {
        anyhow::bail!("summary {} has no recommended squad; nothing to apply", path.display());
    }

    let current = state::load_squad_state(squad_path).context("failed to load squad state")?;

    // Prices are only needed to record what newcomers cost.
    let price_now: HashMap<u32, f64> =
        match data::load_predictions(Path::new(&config.data_paths.predictions)) {
            Ok(players) => players.iter().map(|p| (p.player_id, p.price_now)).collect(),
            Err(e) => {
                warn!("predictions unavailable, new purchase prices not recorded: {}", e);
                HashMap::new()
            }
        };

    let (out_ids, in_ids) = state::squad_diff(&current.squad, &plan.new_squad_ids);
    println!("=== Preview: apply GW{gw} plan to squad.toml ===");
    println!(
        "Squad size before: {}; after: {}",
        current.squad.len(),
        plan.new_squad_ids.len()
    );
    println!("Out: {out_ids:?}");
    println!("In : {in_ids:?}");
    println!("Bank after: {:.1}m", plan.bank_after);

    if !confirm {
        println!("(dry-run) Use --confirm to write changes.");
        return Ok(());
    }

    let next = state::apply_plan(&current, &plan.new_squad_ids, plan.bank_after, &price_now);
    state::save_squad_state(squad_path, &next).context("failed to save squad state")?;
    info!("applied GW{} plan: out {:?}, in {:?}", gw, out_ids, in_ids);
    println!("Wrote {}", squad_path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn player_name(pool: &PlayerPool, id: u32) -> String {
    pool.get(id)
        .map(|p| p.web_name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn player_names(pool: &PlayerPool, ids: &[u32]) -> String {
    ids.iter()
        .map(|&id| player_name(pool, id))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_summary(summary: &Summary, pool: &PlayerPool) {
    let name = |id: u32| player_name(pool, id);
    let names = |ids: &[u32]| player_names(pool, ids);

    let xi = &summary.lineup;
    println!("=== Current XI (with captain) ===");
    println!("Formation: {}", xi.formation);
    println!("Starters:  {}", names(&xi.starting_ids[..]));
    println!("Bench:     {}", names(&xi.bench_ids[..]));
    println!("Captain:   {}", name(xi.captain_id));
    println!("Vice:      {}", name(xi.vice_id));
    println!("Expected XI pts (incl. C): {:.2}", xi.expected_points);

    let result = &summary.transfers;
    let plan = &result.best_plan;
    println!("\n=== Transfers Suggestion ===");
    println!("Baseline XI pts: {:.2}", result.baseline_points);
    if plan.transfers == 0 {
        println!("Best: Keep (0 transfers).");
    } else {
        println!("Best: {} transfer(s), hit cost {}", plan.transfers, plan.hit_cost);
        println!("Out: {}", names(&plan.out_ids[..]));
        println!("In : {}", names(&plan.in_ids[..]));
        println!("New XI pts: {:.2}", plan.new_points);
        println!("Net gain vs baseline (after hits): {:.2}", plan.net_gain);
    }
    println!(
        "Bank after: {:.1}m  Squad value: {:.1}m -> {:.1}m ({:+.1})",
        plan.bank_after, plan.squad_value_before, plan.squad_value_after, plan.squad_value_delta
    );

    if let Some(chips) = &summary.chips {
        println!("\n=== Chips Suggestion ===");
        for (kind, advice) in [
            ("bench_boost", &chips.bench_boost),
            ("triple_captain", &chips.triple_captain),
            ("free_hit", &chips.free_hit),
            ("wildcard", &chips.wildcard),
        ] {
            let status = if advice.recommended { "YES" } else { "no" };
            println!("{kind}: {status} ({})", advice.reason);
        }
    }
}

/// Initialize tracing to log to a file, keeping stdout for the report.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("gaffer.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gaffer=info,gaffer_app=info,gaffer_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
