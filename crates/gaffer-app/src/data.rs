// Prediction and fixture data loading.
//
// Predictions come as one CSV row per player with the model's expected
// points for the target gameweek. Fixtures are optional: without them the
// double-gameweek logic assumes one match per club.

use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use gaffer_core::fixtures::Fixture;
use gaffer_core::{PlayerRecord, Position};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

/// One predictions row. Columns not listed here are ignored.
#[derive(Debug, Deserialize)]
struct RawPrediction {
    player_id: u32,
    web_name: String,
    team_id: u32,
    position: String,
    price_now: f64,
    expected_points: f64,
    #[serde(default)]
    availability_score: Option<f64>,
    #[serde(default)]
    minutes: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawFixture {
    event: Option<u32>,
    team_h: u32,
    team_a: u32,
}

// ---------------------------------------------------------------------------
// Reader-based loaders (private, enable testing without temp files)
// ---------------------------------------------------------------------------

fn load_predictions_from_reader<R: Read>(rdr: R) -> Result<Vec<PlayerRecord>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut players: Vec<PlayerRecord> = Vec::new();
    let mut index: HashMap<u32, usize> = HashMap::new();

    for result in reader.deserialize::<RawPrediction>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed prediction row: {}", e);
                continue;
            }
        };
        let name = raw.web_name.trim().to_string();

        let Some(position) = Position::from_str_pos(&raw.position) else {
            warn!("skipping player '{}': unknown position '{}'", name, raw.position);
            continue;
        };
        if !raw.price_now.is_finite() || !raw.expected_points.is_finite() {
            warn!("skipping player '{}': non-finite price or expected points", name);
            continue;
        }
        let availability_score = raw.availability_score.filter(|a| a.is_finite());
        let minutes = raw
            .minutes
            .filter(|m| m.is_finite() && *m >= 0.0)
            .map(|m| m.round() as u32);

        let record = PlayerRecord {
            player_id: raw.player_id,
            web_name: name,
            team_id: raw.team_id,
            position,
            price_now: raw.price_now,
            expected_points: raw.expected_points,
            availability_score,
            minutes,
        };

        match index.get(&record.player_id) {
            Some(&i) => {
                warn!("duplicate prediction for player {}, using latest row", record.player_id);
                players[i] = record;
            }
            None => {
                index.insert(record.player_id, players.len());
                players.push(record);
            }
        }
    }
    Ok(players)
}

fn load_fixtures_from_reader<R: Read>(rdr: R) -> Result<Vec<Fixture>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut fixtures = Vec::new();
    for result in reader.deserialize::<RawFixture>() {
        match result {
            // Unscheduled (postponed) matches have no gameweek yet.
            Ok(RawFixture { event: None, .. }) => continue,
            Ok(RawFixture {
                event: Some(event),
                team_h,
                team_a,
            }) => fixtures.push(Fixture {
                event,
                team_h,
                team_a,
            }),
            Err(e) => {
                warn!("skipping malformed fixture row: {}", e);
            }
        }
    }
    Ok(fixtures)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

/// Load the prediction table. An empty result is an error.
pub fn load_predictions(path: &Path) -> Result<Vec<PlayerRecord>, DataError> {
    let file = std::fs::File::open(path).map_err(|e| DataError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let players = load_predictions_from_reader(file).map_err(|e| DataError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    if players.is_empty() {
        return Err(DataError::Validation(format!(
            "predictions file {} produced zero valid rows",
            path.display()
        )));
    }
    info!("loaded {} player predictions from {}", players.len(), path.display());
    Ok(players)
}

/// Load the fixture list, or `None` if the file does not exist.
pub fn load_fixtures(path: &Path) -> Result<Option<Vec<Fixture>>, DataError> {
    if !path.exists() {
        info!("no fixtures file at {}, assuming single gameweeks", path.display());
        return Ok(None);
    }
    let file = std::fs::File::open(path).map_err(|e| DataError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let fixtures = load_fixtures_from_reader(file).map_err(|e| DataError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(fixtures))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
