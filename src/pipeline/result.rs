//! Result types for a pipeline run.
//!
//! Every outcome is data: step failures, phase aborts and the overall gate
//! are recorded here and persisted as a single JSON document, fully
//! overwritten each run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

/// Diagnostic classification of a step failure, derived by keyword
/// inspection of the failure message. Never changes control flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Timeout,
    Network,
    Auth,
    Validation,
    Parse,
    Command,
    Unknown,
}

impl ErrorCategory {
    /// Classify a failure message by keyword.
    pub fn classify(message: &str) -> Self {
        let msg = message.to_lowercase();

        if msg.contains("timed out") || msg.contains("timeout") {
            return ErrorCategory::Timeout;
        }
        if msg.contains("econnrefused")
            || msg.contains("enotfound")
            || msg.contains("network")
            || msg.contains("fetch failed")
            || msg.contains("connection")
            || msg.contains("dns")
        {
            return ErrorCategory::Network;
        }
        if msg.contains("401")
            || msg.contains("403")
            || msg.contains("unauthorized")
            || msg.contains("forbidden")
            || msg.contains("api key")
        {
            return ErrorCategory::Auth;
        }
        if msg.contains("validation") || msg.contains("invalid") || msg.contains("schema") {
            return ErrorCategory::Validation;
        }
        if msg.contains("parse") || msg.contains("unexpected token") || msg.contains("json") {
            return ErrorCategory::Parse;
        }
        if msg.contains("command not found")
            || msg.contains("exit code")
            || msg.contains("exited with")
        {
            return ErrorCategory::Command;
        }
        ErrorCategory::Unknown
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// Failure message, present iff status is `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    /// Human-readable skip reason, present iff status is `Skipped`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StepResult {
    pub fn success(name: &str, duration_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Success,
            duration_ms,
            error: None,
            error_category: None,
            reason: None,
        }
    }

    pub fn failed(name: &str, duration_ms: u64, error: String) -> Self {
        let category = ErrorCategory::classify(&error);
        Self {
            name: name.to_string(),
            status: StepStatus::Failed,
            duration_ms,
            error: Some(error),
            error_category: Some(category),
            reason: None,
        }
    }

    pub fn skipped(name: &str, reason: String) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Skipped,
            duration_ms: 0,
            error: None,
            error_category: None,
            reason: Some(reason),
        }
    }
}

/// Outcome of one phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Success,
    Partial,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseResult {
    pub name: String,
    pub status: PhaseStatus,
    pub steps: Vec<StepResult>,
    /// Name of the required step whose failure halted the phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_by: Option<String>,
}

impl PhaseResult {
    /// A phase recorded as skipped because an earlier phase aborted.
    pub fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: PhaseStatus::Skipped,
            steps: Vec::new(),
            aborted_by: None,
        }
    }
}

/// Overall pass/fail verdict of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gate {
    Pass,
    Fail,
}

/// Step counts across the whole run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// The full result of one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub gate: Gate,
    pub phases: BTreeMap<String, PhaseResult>,
    pub summary: RunSummary,
}

impl PipelineResult {
    /// Compute the run summary from all recorded step results.
    pub fn summarize(phases: &BTreeMap<String, PhaseResult>) -> RunSummary {
        let mut summary = RunSummary::default();
        for phase in phases.values() {
            for step in &phase.steps {
                summary.total += 1;
                match step.status {
                    StepStatus::Success => summary.success += 1,
                    StepStatus::Failed => summary.failed += 1,
                    StepStatus::Skipped => summary.skipped += 1,
                }
            }
        }
        summary
    }

    /// Persist to `path`, fully overwriting any previous run's result.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run result")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run result to {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run result at {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse run result at {}", path.display()))
    }
}
