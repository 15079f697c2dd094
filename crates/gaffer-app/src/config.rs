// Configuration loading and parsing (strategy.toml), plus first-run copying
// of config files from defaults/.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use gaffer_core::chips::ChipThresholds;
use gaffer_core::fixtures::DgwParams;
use gaffer_core::lineup::{BenchOrderParams, CaptainRules, FormationBounds, LineupOptions};
use gaffer_core::selection::SelectionFilter;
use gaffer_core::squad_builder::BuildParams;
use gaffer_core::transfers::{TransferSearchParams, MAX_SEARCH_TRANSFERS};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },

    #[error("failed to write config file {path}: {message}")]
    WriteError { path: PathBuf, message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub strategy: StrategyConfig,
    pub data_paths: DataPaths,
}

// ---------------------------------------------------------------------------
// strategy.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire strategy.toml file.
#[derive(Debug, Clone, Deserialize)]
struct StrategyFile {
    budget: BudgetSection,
    #[serde(default)]
    selection: SelectionFilter,
    #[serde(default)]
    builder: BuilderWeights,
    #[serde(default)]
    transfers: TransferSearchParams,
    #[serde(default)]
    captain: CaptainRules,
    #[serde(default)]
    formation: FormationBounds,
    #[serde(default)]
    bench: BenchOrderParams,
    #[serde(default)]
    chips: ChipThresholds,
    #[serde(default)]
    dgw: DgwConfig,
    data: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
struct BudgetSection {
    ceiling: f64,
}

/// The public strategy config assembled from the strategy.toml sections.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    /// Total budget (£m) for building a squad from scratch.
    pub budget: f64,
    pub selection: SelectionFilter,
    pub builder: BuilderWeights,
    pub transfers: TransferSearchParams,
    pub lineup: LineupOptions,
    pub chips: ChipThresholds,
    pub dgw: DgwConfig,
}

impl StrategyConfig {
    /// Squad builder parameters with the configured budget.
    pub fn build_params(&self) -> BuildParams {
        BuildParams {
            budget: self.budget,
            w_ep: self.builder.w_ep,
            w_avail: self.builder.w_avail,
            w_vpm: self.builder.w_vpm,
        }
    }
}

/// Squad builder objective weights.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BuilderWeights {
    pub w_ep: f64,
    pub w_avail: f64,
    pub w_vpm: f64,
}

impl Default for BuilderWeights {
    fn default() -> Self {
        let d = BuildParams::default();
        BuilderWeights {
            w_ep: d.w_ep,
            w_avail: d.w_avail,
            w_vpm: d.w_vpm,
        }
    }
}

/// `[dgw]`: whether to scale expected points for double gameweeks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DgwConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub params: DgwParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub predictions: String,
    pub fixtures: String,
    pub reports_dir: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/strategy.toml` relative to `base_dir`.
///
/// This does not copy defaults; `load_config()` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let strategy_path = base_dir.join("config").join("strategy.toml");
    let strategy_text = read_file(&strategy_path)?;
    let file: StrategyFile =
        toml::from_str(&strategy_text).map_err(|e| ConfigError::ParseError {
            path: strategy_path.clone(),
            source: e,
        })?;

    let strategy = StrategyConfig {
        budget: file.budget.ceiling,
        selection: file.selection,
        builder: file.builder,
        transfers: file.transfers,
        lineup: LineupOptions {
            formation: file.formation,
            bench: file.bench,
            captain: file.captain,
        },
        chips: file.chips,
        dgw: file.dgw,
    };

    let config = Config {
        strategy,
        data_paths: file.data,
    };

    validate(&config)?;

    Ok(config)
}

/// First-run setup: copy every file in `defaults/` that has no counterpart
/// in `config/` yet. Returns the paths written, in name order.
///
/// `.example` files stay behind and a file already in `config/` is never
/// replaced, even if it is empty.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");
    let setup_err = |message: String| ConfigError::DefaultsCopyError { message };

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(setup_err(format!(
            "no defaults/ or config/ under {}; run gaffer from the project root",
            base_dir.display()
        )));
    }

    let mut sources: Vec<PathBuf> = std::fs::read_dir(&defaults_dir)
        .map_err(|e| setup_err(format!("cannot list {}: {e}", defaults_dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| path.extension().map_or(true, |ext| ext != "example"))
        .collect();
    sources.sort();

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| setup_err(format!("cannot create {}: {e}", config_dir.display())))?;

    let mut written = Vec::new();
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(name);
        // Never overwrite the user's copy.
        let mut dest = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(setup_err(format!("cannot create {}: {e}", target.display()))),
        };
        let mut src = std::fs::File::open(&source)
            .map_err(|e| setup_err(format!("cannot open {}: {e}", source.display())))?;
        std::io::copy(&mut src, &mut dest)
            .map_err(|e| setup_err(format!("cannot copy to {}: {e}", target.display())))?;
        info!("created {} from defaults", target.display());
        written.push(target);
    }

    Ok(written)
}

/// Loads config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

fn non_negative(field: &str, val: f64) -> Result<(), ConfigError> {
    if !val.is_finite() || val < 0.0 {
        return Err(invalid(field, format!("must be finite and >= 0, got {val}")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let s = &config.strategy;

    if !s.budget.is_finite() || s.budget <= 0.0 {
        return Err(invalid("budget.ceiling", format!("must be > 0, got {}", s.budget)));
    }

    if let Some(floor) = s.selection.exclude_price_min {
        non_negative("selection.exclude_price_min", floor)?;
    }

    let weight_fields: &[(&str, f64)] = &[
        ("builder.w_ep", s.builder.w_ep),
        ("builder.w_avail", s.builder.w_avail),
        ("builder.w_vpm", s.builder.w_vpm),
        ("transfers.value_weight", s.transfers.value_weight),
        ("bench.weight_ep", s.lineup.bench.weight_ep),
        ("bench.weight_availability", s.lineup.bench.weight_availability),
    ];
    for (name, val) in weight_fields {
        non_negative(name, *val)?;
    }

    // Transfer search
    let t = &s.transfers;
    if t.pool_size == 0 {
        return Err(invalid("transfers.pool_size", "must be > 0"));
    }
    if t.max_transfers > MAX_SEARCH_TRANSFERS {
        return Err(invalid(
            "transfers.max_transfers",
            format!("must be at most {MAX_SEARCH_TRANSFERS}, got {}", t.max_transfers),
        ));
    }
    if let Some(min_bank) = t.min_bank_after {
        if !min_bank.is_finite() {
            return Err(invalid("transfers.min_bank_after", "must be finite"));
        }
    }
    if let Some(drop) = t.max_value_drop {
        non_negative("transfers.max_value_drop", drop)?;
    }

    // Lineup
    if let Some(min_price) = s.lineup.captain.min_price {
        non_negative("captain.min_price", min_price)?;
    }
    s.lineup
        .formation
        .validate()
        .map_err(|e| invalid("formation", e.to_string()))?;

    // Chips
    let c = &s.chips;
    let threshold_fields: &[(&str, f64)] = &[
        ("chips.bench_boost_min_bench_ep", c.bench_boost_min_bench_ep),
        ("chips.triple_captain_min_ep", c.triple_captain_min_ep),
        ("chips.triple_captain_min_ep_if_double", c.triple_captain_min_ep_if_double),
        ("chips.likely_starter_availability", c.likely_starter_availability),
    ];
    for (name, val) in threshold_fields {
        if !val.is_finite() {
            return Err(invalid(name, format!("must be finite, got {val}")));
        }
    }

    // Double gameweek
    let d = &s.dgw.params;
    non_negative("dgw.alpha_per_extra_match", d.alpha_per_extra_match)?;
    non_negative("dgw.availability_floor", d.availability_floor)?;
    non_negative("dgw.availability_penalty", d.availability_penalty)?;

    let paths = &config.data_paths;
    for (name, val) in [
        ("data.predictions", &paths.predictions),
        ("data.fixtures", &paths.fixtures),
        ("data.reports_dir", &paths.reports_dir),
    ] {
        if val.trim().is_empty() {
            return Err(invalid(name, "must not be empty"));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Helper: returns the gaffer-app crate root (works whether `cargo test`
    /// runs from the crate root or the workspace root).
    fn project_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        if cwd.join("defaults").exists() {
            cwd
        } else if cwd.join("crates/gaffer-app/defaults").exists() {
            cwd.join("crates/gaffer-app")
        } else {
            panic!("Cannot locate defaults/ directory from CWD {:?}", cwd);
        }
    }

    /// Scratch dir with config/strategy.toml produced by `edit` applied to
    /// the default file.
    fn scratch_with_strategy(name: &str, edit: impl Fn(String) -> String) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let config_dir = tmp.join("config");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&config_dir).unwrap();

        let text = fs::read_to_string(project_root().join("defaults/strategy.toml")).unwrap();
        fs::write(config_dir.join("strategy.toml"), edit(text)).unwrap();
        tmp
    }

    fn expect_validation_field(tmp: &Path, expected: &str) {
        let err = load_config_from(tmp).unwrap_err();
        match &err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError, got: {other}"),
        }
        let _ = fs::remove_dir_all(tmp);
    }

    #[test]
    fn load_valid_config_from_project_files() {
        let tmp = scratch_with_strategy("gaffer_config_defaults", |t| t);
        let config = load_config_from(&tmp).expect("should load valid config");

        let s = &config.strategy;
        assert!((s.budget - 100.0).abs() < f64::EPSILON);
        assert!(s.selection.exclude_names.is_empty());
        assert!(s.selection.exclude_price_min.is_none());
        assert!((s.builder.w_avail - 0.5).abs() < f64::EPSILON);
        assert_eq!(s.transfers.pool_size, 12);
        assert_eq!(s.transfers.max_transfers, 2);
        assert_eq!(s.transfers.hit_cost, 4);
        assert!(s.transfers.min_bank_after.is_none());
        assert_eq!(s.lineup.formation, FormationBounds::default());
        assert!(s.lineup.bench.gk_last);
        assert!(s.lineup.captain.is_unrestricted());
        assert!((s.chips.bench_boost_min_bench_ep - 20.0).abs() < f64::EPSILON);
        assert_eq!(s.chips.free_hit_min_active_starters, 9);
        assert!(s.dgw.enabled);
        assert!((s.dgw.params.alpha_per_extra_match - 0.65).abs() < f64::EPSILON);

        assert_eq!(config.data_paths.predictions, "data/predictions.csv");
        assert_eq!(config.data_paths.fixtures, "data/fixtures.csv");
        assert_eq!(config.data_paths.reports_dir, "reports");

        let params = s.build_params();
        assert!((params.budget - 100.0).abs() < f64::EPSILON);
        assert!((params.w_vpm - 0.05).abs() < f64::EPSILON);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn optional_sections_fall_back_to_defaults() {
        let tmp = std::env::temp_dir().join("gaffer_config_minimal");
        let config_dir = tmp.join("config");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join("strategy.toml"),
            r#"
[budget]
ceiling = 99.5

[transfers]
pool_size = 6

[data]
predictions = "p.csv"
fixtures = "f.csv"
reports_dir = "out"
"#,
        )
        .unwrap();

        let config = load_config_from(&tmp).expect("should load minimal config");
        let s = &config.strategy;
        assert!((s.budget - 99.5).abs() < f64::EPSILON);
        assert_eq!(s.transfers.pool_size, 6);
        assert_eq!(s.transfers.max_transfers, 2);
        assert_eq!(s.lineup, LineupOptions::default());
        assert_eq!(s.chips, ChipThresholds::default());
        assert!(!s.dgw.enabled);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn optional_thresholds_parse_when_present() {
        let tmp = scratch_with_strategy("gaffer_config_optionals", |t| {
            t.replace("[captain]", "[captain]\nmin_minutes = 450\nmin_price = 6.0")
                .replace(
                    "exclude_names = []",
                    "exclude_names = [\"Haaland\"]\nexclude_price_min = 12.0",
                )
        });
        let config = load_config_from(&tmp).expect("should load");
        let s = &config.strategy;
        assert_eq!(s.lineup.captain.min_minutes, Some(450));
        assert_eq!(s.lineup.captain.min_price, Some(6.0));
        assert_eq!(s.selection.exclude_names, vec!["Haaland".to_string()]);
        assert_eq!(s.selection.exclude_price_min, Some(12.0));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_budget() {
        let tmp = scratch_with_strategy("gaffer_config_zero_budget", |t| {
            t.replace("ceiling = 100.0", "ceiling = 0.0")
        });
        expect_validation_field(&tmp, "budget.ceiling");
    }

    #[test]
    fn rejects_zero_pool_size() {
        let tmp = scratch_with_strategy("gaffer_config_zero_pool", |t| {
            t.replace("pool_size = 12", "pool_size = 0")
        });
        expect_validation_field(&tmp, "transfers.pool_size");
    }

    #[test]
    fn rejects_three_transfers() {
        let tmp = scratch_with_strategy("gaffer_config_three_transfers", |t| {
            t.replace("max_transfers = 2", "max_transfers = 3")
        });
        expect_validation_field(&tmp, "transfers.max_transfers");
    }

    #[test]
    fn rejects_negative_weight() {
        let tmp = scratch_with_strategy("gaffer_config_negative_weight", |t| {
            t.replace("w_avail = 0.5", "w_avail = -0.5")
        });
        expect_validation_field(&tmp, "builder.w_avail");
    }

    #[test]
    fn rejects_inconsistent_formation() {
        let tmp = scratch_with_strategy("gaffer_config_bad_formation", |t| {
            t.replace("def_min = 3", "def_min = 6")
        });
        expect_validation_field(&tmp, "formation");
    }

    #[test]
    fn file_not_found_for_missing_strategy_toml() {
        let tmp = std::env::temp_dir().join("gaffer_config_missing_strategy");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::FileNotFound { path } => {
                assert!(path.ends_with("strategy.toml"));
            }
            other => panic!("expected FileNotFound, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = scratch_with_strategy("gaffer_config_invalid_toml", |_| {
            "this is not valid [[[ toml".to_string()
        });
        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::ParseError { path, .. } => {
                assert!(path.ends_with("strategy.toml"));
            }
            other => panic!("expected ParseError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_files() {
        let tmp = std::env::temp_dir().join("gaffer_config_ensure_copies");
        let _ = fs::remove_dir_all(&tmp);

        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();

        let root = project_root();
        fs::copy(root.join("defaults/strategy.toml"), defaults_dir.join("strategy.toml")).unwrap();
        fs::copy(root.join("defaults/squad.toml"), defaults_dir.join("squad.toml")).unwrap();
        fs::write(defaults_dir.join("squad.toml.example"), "squad = []\n").unwrap();

        assert!(!tmp.join("config").exists());

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 2);
        assert!(copied[0].ends_with("squad.toml"));
        assert!(copied[1].ends_with("strategy.toml"));

        assert!(tmp.join("config/strategy.toml").exists());
        assert!(tmp.join("config/squad.toml").exists());
        assert!(!tmp.join("config/squad.toml.example").exists());

        // The copied files load.
        load_config_from(&tmp).expect("copied defaults should load");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_skips_existing() {
        let tmp = std::env::temp_dir().join("gaffer_config_ensure_skips");
        let _ = fs::remove_dir_all(&tmp);

        let defaults_dir = tmp.join("defaults");
        let config_dir = tmp.join("config");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::create_dir_all(&config_dir).unwrap();

        let root = project_root();
        fs::copy(root.join("defaults/strategy.toml"), defaults_dir.join("strategy.toml")).unwrap();
        fs::copy(root.join("defaults/squad.toml"), defaults_dir.join("squad.toml")).unwrap();

        fs::write(config_dir.join("squad.toml"), "# custom\n").unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(copied[0].ends_with("strategy.toml"));

        let content = fs::read_to_string(config_dir.join("squad.toml")).unwrap();
        assert_eq!(content, "# custom\n");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("gaffer_config_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let err = ensure_config_files(&tmp).unwrap_err();
        match &err {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("no defaults/ or config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }
}
