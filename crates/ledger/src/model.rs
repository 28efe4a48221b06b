// Run records and query types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub i64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches('#')
            .parse()
            .map(RunId)
            .map_err(|_| format!("invalid run id '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != RunStatus::Running
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{other}' (expected running, success or failed)")),
        }
    }
}

/// Where a successful run's artifacts were written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportLocations {
    pub csv: Option<String>,
    pub xlsx: Option<String>,
}

/// What a run is about to compare.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInputs {
    /// Comparison config identity (its name or path).
    pub config_ref: String,
    pub category: Option<String>,
    pub left_ref: String,
    pub right_ref: String,
    /// Store code inferred from a source file name, if any.
    pub store: Option<String>,
}

/// One execution of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    pub id: RunId,
    pub config_ref: String,
    pub category: Option<String>,
    pub left_ref: String,
    pub right_ref: String,
    pub store: Option<String>,
    pub status: RunStatus,
    pub total_rows: u64,
    pub diff_rows: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub exports: ExportLocations,
    pub title: Option<String>,
    pub notes: Option<String>,
}

impl Run {
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

/// Ordered column name → text mapping, one per previewed diff row.
pub type PreviewRow = serde_json::Map<String, serde_json::Value>;

/// Data recorded when a run succeeds.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub total_rows: u64,
    pub diff_rows: u64,
    pub exports: ExportLocations,
    pub preview: Vec<PreviewRow>,
}

#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub config_ref: Option<String>,
    pub category: Option<String>,
    /// Matches runs whose inferred store code equals this.
    pub store: Option<String>,
    pub limit: Option<usize>,
}

/// Dashboard counters over a filtered set of runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub rows: u64,
    pub diffs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_text() {
        for status in [RunStatus::Running, RunStatus::Success, RunStatus::Failed] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert!("done".parse::<RunStatus>().is_err());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn run_id_accepts_hash_prefix() {
        assert_eq!("#12".parse::<RunId>().unwrap(), RunId(12));
        assert_eq!("12".parse::<RunId>().unwrap(), RunId(12));
        assert!("x".parse::<RunId>().is_err());
        assert_eq!(RunId(3).to_string(), "#3");
    }
}
