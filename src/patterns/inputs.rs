//! History artifacts consumed by the analyzer.
//!
//! Every input is an independently-readable flat JSON document left behind
//! by pipeline steps. Shapes are validated at the file-read boundary: a
//! missing file is "no data", a malformed one is an error.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

/// Severity of a diagnostic issue as reported by a step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Critical,
    Error,
    Warning,
    Info,
}

impl IssueSeverity {
    /// Informational codes never accumulate toward findings.
    pub fn is_actionable(self) -> bool {
        !matches!(self, IssueSeverity::Info)
    }
}

/// One diagnostic issue from the latest health snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthIssue {
    pub code: String,
    pub severity: IssueSeverity,
    #[serde(default)]
    pub message: String,
}

/// Diagnostic snapshot written by the pipeline's health-check step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub issues: Vec<HealthIssue>,
}

/// One run's quality metrics (content scores, coverage ratios).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

/// Ordered time series of quality metrics, one entry per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QualityHistory {
    #[serde(default)]
    pub entries: Vec<QualityEntry>,
}

impl QualityHistory {
    /// The ordered series of one metric's observations.
    pub fn series(&self, metric: &str) -> Vec<f64> {
        self.entries
            .iter()
            .filter_map(|e| e.metrics.get(metric).copied())
            .collect()
    }

    /// Every metric name observed anywhere in the history.
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .flat_map(|e| e.metrics.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// One run's feedback-loop closure scores (1.0 = closed).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoopEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoopHistory {
    #[serde(default)]
    pub entries: Vec<LoopEntry>,
}

/// Corrective hints emitted after one run, fed back into the next.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HintEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HintHistory {
    #[serde(default)]
    pub entries: Vec<HintEntry>,
}

/// One recorded autopilot task run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRun {
    pub task: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskLog {
    #[serde(default)]
    pub runs: Vec<TaskRun>,
}

/// Load a JSON artifact, treating a missing file as "no data".
pub fn load_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}
