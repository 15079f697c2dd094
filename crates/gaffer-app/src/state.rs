// Persisted squad state (config/squad.toml): load, validate, save, and
// write back an accepted transfer plan or built squad.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::info;

use gaffer_core::chips::ChipsAvailable;
use gaffer_core::finance::round1;
use gaffer_core::squad_builder::BuiltSquad;
use gaffer_core::Squad;

use crate::config::{read_file, ConfigError};

fn default_free_transfers() -> u32 {
    1
}

/// On-disk shape of squad.toml.
///
/// `purchase_prices` is keyed by the player id as a string because TOML
/// table keys are strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadState {
    #[serde(default)]
    pub squad: Vec<u32>,
    #[serde(default)]
    pub bank: f64,
    #[serde(default = "default_free_transfers")]
    pub free_transfers: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub purchase_prices: BTreeMap<String, f64>,
    #[serde(default)]
    pub chips_available: ChipsAvailable,
}

impl Default for SquadState {
    fn default() -> Self {
        SquadState {
            squad: Vec::new(),
            bank: 0.0,
            free_transfers: default_free_transfers(),
            updated_at: None,
            purchase_prices: BTreeMap::new(),
            chips_available: ChipsAvailable::default(),
        }
    }
}

impl SquadState {
    /// No squad recorded yet; a squad has to be built first.
    pub fn is_empty(&self) -> bool {
        self.squad.is_empty()
    }

    /// Purchase prices keyed by numeric player id.
    pub fn purchase_price_map(&self) -> Result<HashMap<u32, f64>, ConfigError> {
        self.purchase_prices
            .iter()
            .map(|(k, v)| {
                let id = k.trim().parse::<u32>().map_err(|_| ConfigError::ValidationError {
                    field: format!("purchase_prices.{k}"),
                    message: "key must be an integer player id".into(),
                })?;
                Ok((id, *v))
            })
            .collect()
    }

    /// Convert into the optimizer's squad value.
    pub fn to_squad(&self) -> Result<Squad, ConfigError> {
        Ok(Squad::new(self.squad.clone(), self.bank, self.free_transfers)
            .with_purchase_prices(self.purchase_price_map()?))
    }
}

/// Location of squad.toml under `base_dir`.
pub fn squad_path(base_dir: &Path) -> PathBuf {
    base_dir.join("config").join("squad.toml")
}

pub fn load_squad_state(path: &Path) -> Result<SquadState, ConfigError> {
    let text = read_file(path)?;
    let state: SquadState = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&state)?;
    Ok(state)
}

pub fn save_squad_state(path: &Path, state: &SquadState) -> Result<(), ConfigError> {
    let write_err = |message: String| ConfigError::WriteError {
        path: path.to_path_buf(),
        message,
    };
    let text = toml::to_string_pretty(state).map_err(|e| write_err(e.to_string()))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }
    std::fs::write(path, text).map_err(|e| write_err(e.to_string()))?;
    info!("wrote squad state to {}", path.display());
    Ok(())
}

fn validate(state: &SquadState) -> Result<(), ConfigError> {
    if !state.bank.is_finite() || state.bank < 0.0 {
        return Err(ConfigError::ValidationError {
            field: "bank".into(),
            message: format!("must be >= 0, got {}", state.bank),
        });
    }
    for (id, price) in state.purchase_price_map()? {
        if !price.is_finite() || price <= 0.0 {
            return Err(ConfigError::ValidationError {
                field: format!("purchase_prices.{id}"),
                message: format!("must be > 0, got {price}"),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Applying decisions
// ---------------------------------------------------------------------------

/// State after accepting a squad change.
///
/// Retained players keep their recorded purchase price; newcomers are
/// recorded at `price_now` (when known). Free transfers reset to one.
pub fn apply_plan(
    state: &SquadState,
    new_squad_ids: &[u32],
    bank_after: f64,
    price_now: &HashMap<u32, f64>,
) -> SquadState {
    let before = &state.purchase_prices;
    let mut purchase_prices = BTreeMap::new();
    for &id in new_squad_ids {
        let key = id.to_string();
        if let Some(&paid) = before.get(&key) {
            purchase_prices.insert(key, paid);
        } else if let Some(&price) = price_now.get(&id) {
            purchase_prices.insert(key, round1(price));
        }
    }

    SquadState {
        squad: new_squad_ids.to_vec(),
        bank: round1(bank_after),
        free_transfers: 1,
        updated_at: Some(Utc::now()),
        purchase_prices,
        chips_available: state.chips_available,
    }
}

/// State after adopting a freshly built squad.
pub fn apply_built_squad(
    state: &SquadState,
    built: &BuiltSquad,
    price_now: &HashMap<u32, f64>,
) -> SquadState {
    apply_plan(state, &built.player_ids, built.bank, price_now)
}

/// Players leaving and joining between two id lists, in list order.
pub fn squad_diff(before: &[u32], after: &[u32]) -> (Vec<u32>, Vec<u32>) {
    let out = before.iter().copied().filter(|id| !after.contains(id)).collect();
    let inc = after.iter().copied().filter(|id| !before.contains(id)).collect();
    (out, inc)
}
