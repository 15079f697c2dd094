// Run summary: the machine-readable outcome of one `optimize` run, written as
// JSON under the reports directory for the report renderer and `apply`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use gaffer_core::chips::ChipReport;
use gaffer_core::lineup::StartingXi;
use gaffer_core::transfers::TransferSearchResult;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid summary JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("summary not found: {path}")]
    Missing { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Target gameweek, if one was given.
    pub gameweek: Option<u32>,
    pub generated_at: DateTime<Utc>,
    pub lineup: StartingXi,
    pub transfers: TransferSearchResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chips: Option<ChipReport>,
}

/// `<reports_dir>/gwNN/summary.json`
pub fn summary_path(reports_dir: &Path, gw: u32) -> PathBuf {
    reports_dir.join(format!("gw{gw:02}")).join("summary.json")
}

pub fn write_summary(path: &Path, summary: &Summary) -> Result<(), SummaryError> {
    let io_err = |source| SummaryError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(summary).map_err(|e| SummaryError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(path, json + "\n").map_err(io_err)?;
    info!("wrote summary to {}", path.display());
    Ok(())
}

pub fn load_summary(path: &Path) -> Result<Summary, SummaryError> {
    if !path.exists() {
        return Err(SummaryError::Missing {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|e| SummaryError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| SummaryError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}
