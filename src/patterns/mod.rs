//! Historical pattern analysis for the content-feed pipeline.
//!
//! | Submodule       | What it owns                                         |
//! |-----------------|------------------------------------------------------|
//! | `inputs`        | history artifact types, file-read boundary           |
//! | `history`       | `IssueCodeHistory`, decay, recurring-issue detector  |
//! | `quality`       | quality-decline and stagnant-loop detectors          |
//! | `interventions` | hint-fatigue and intervention-effectiveness          |
//! | `runs`          | cross-loop dependency and autopilot-failure          |
//! | `architecture`  | source-tree fitness metrics and baseline drift       |
//!
//! Every detector is a pure function over prior state and fresh history;
//! `analyze_patterns` runs them all, ranks the findings, and carries only
//! the issue-code history and architecture baseline forward.

pub mod architecture;
pub mod history;
pub mod inputs;
pub mod interventions;
pub mod quality;
pub mod runs;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Config;
use architecture::{
    ArchitectureBaseline, ArchitectureThresholds, BaselineDelta, detect_architecture_drift,
};
use history::{IssueCodeHistory, detect_recurring_issues, update_issue_history};
use inputs::{HealthReport, HintHistory, LoopHistory, QualityHistory, TaskLog, load_optional};
use interventions::{EffectivenessStat, compute_effectiveness, detect_hint_fatigue};
use quality::{detect_quality_decline, detect_stagnant_loops};
use runs::{detect_autopilot_failures, detect_cross_loop_dependencies};

pub use architecture::scan_architecture;
pub use history::IssueCodeEntry;

/// Ranked severity of a finding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    fn rank(self) -> u8 {
        match self {
            Severity::High => 0,
            Severity::Medium => 1,
            Severity::Low => 2,
        }
    }
}

/// Diagnostic payload of a finding, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternDetails {
    RecurringIssue {
        code: String,
        count: u32,
        #[serde(rename = "firstSeen")]
        first_seen: DateTime<Utc>,
        #[serde(rename = "lastSeen")]
        last_seen: DateTime<Utc>,
    },
    QualityDecline {
        metric: String,
        #[serde(rename = "earlyAvg")]
        early_avg: f64,
        #[serde(rename = "lateAvg")]
        late_avg: f64,
        drop: f64,
    },
    StagnantLoop {
        #[serde(rename = "loop")]
        loop_name: String,
        score: f64,
        runs: u32,
    },
    HintFatigue {
        hint: String,
        metric: String,
        occurrences: u32,
    },
    CrossLoopDependency {
        upstream: String,
        downstream: String,
        #[serde(rename = "correlatedDrops")]
        correlated_drops: u32,
    },
    AutopilotFailures {
        #[serde(rename = "failureRate")]
        failure_rate: f64,
        window: u32,
        #[serde(rename = "failedTasks")]
        failed_tasks: Vec<String>,
    },
    ArchitectureDrift {
        area: String,
        value: f64,
        threshold: f64,
    },
}

impl PatternDetails {
    /// Short label used in the report's one-line summary.
    pub fn label(&self) -> String {
        match self {
            PatternDetails::RecurringIssue { code, count, .. } => {
                format!("recurring issue {} ({}x)", code, count)
            }
            PatternDetails::QualityDecline { metric, .. } => {
                format!("quality decline in {}", metric)
            }
            PatternDetails::StagnantLoop { loop_name, runs, .. } => {
                format!("stagnant loop {} ({} runs)", loop_name, runs)
            }
            PatternDetails::HintFatigue { metric, .. } => {
                format!("hint fatigue on {}", metric)
            }
            PatternDetails::CrossLoopDependency {
                upstream,
                downstream,
                ..
            } => format!("coupled drops {} -> {}", upstream, downstream),
            PatternDetails::AutopilotFailures { failure_rate, .. } => {
                format!("autopilot failures ({:.0}%)", failure_rate * 100.0)
            }
            PatternDetails::ArchitectureDrift { area, .. } => {
                format!("architecture drift in {}", area)
            }
        }
    }
}

/// One ranked finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pattern {
    pub severity: Severity,
    #[serde(flatten)]
    pub details: PatternDetails,
    pub suggestion: String,
}

/// The analyzer's persisted output; read back by the next run and by the
/// prompt-construction logic outside this core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatternReport {
    pub generated_at: DateTime<Utc>,
    pub patterns_detected: usize,
    pub patterns: Vec<Pattern>,
    #[serde(default)]
    pub issue_code_history: IssueCodeHistory,
    #[serde(default)]
    pub intervention_effectiveness: BTreeMap<String, EffectivenessStat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture_baseline: Option<ArchitectureBaseline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_delta: Option<BaselineDelta>,
    pub summary: String,
}

impl PatternReport {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize pattern report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write pattern report to {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pattern report at {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse pattern report at {}", path.display()))
    }
}

/// Everything the analyzer consumes for one run.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerInputs {
    pub health: Option<HealthReport>,
    pub quality: Option<QualityHistory>,
    pub loops: Option<LoopHistory>,
    pub hints: Option<HintHistory>,
    pub tasks: Option<TaskLog>,
    /// Fresh source-tree scan; `None` skips the architecture detector.
    pub architecture: Option<ArchitectureBaseline>,
    /// The previous report; only its issue history and baseline carry over.
    pub prior: Option<PatternReport>,
}

impl AnalyzerInputs {
    /// Load every history artifact the data directory holds.
    pub fn load(config: &Config) -> Result<Self> {
        Ok(Self {
            health: load_optional(&config.health_file)?,
            quality: load_optional(&config.quality_file)?,
            loops: load_optional(&config.loops_file)?,
            hints: load_optional(&config.hints_file)?,
            tasks: load_optional(&config.tasks_file)?,
            architecture: None,
            prior: load_optional(&config.report_file)?,
        })
    }
}

/// Run every detector, merge and rank the findings, and produce the next
/// report. Pure: all state arrives in `inputs` and leaves in the return.
pub fn analyze_patterns(
    inputs: AnalyzerInputs,
    thresholds: &ArchitectureThresholds,
    now: DateTime<Utc>,
) -> PatternReport {
    let mut issue_history: IssueCodeHistory = inputs
        .prior
        .as_ref()
        .map(|p| p.issue_code_history.clone())
        .unwrap_or_default();
    let prior_baseline = inputs
        .prior
        .as_ref()
        .and_then(|p| p.architecture_baseline.clone());

    if let Some(health) = &inputs.health {
        update_issue_history(&mut issue_history, health, now);
    } else {
        history::decay_issue_history(&mut issue_history, now);
    }

    let mut patterns = detect_recurring_issues(&issue_history);

    let empty_quality = QualityHistory::default();
    let quality = inputs.quality.as_ref().unwrap_or(&empty_quality);
    patterns.extend(detect_quality_decline(quality));
    patterns.extend(detect_cross_loop_dependencies(quality));

    if let Some(loops) = &inputs.loops {
        patterns.extend(detect_stagnant_loops(loops));
    }

    let intervention_effectiveness = match &inputs.hints {
        Some(hints) => {
            patterns.extend(detect_hint_fatigue(hints, quality));
            compute_effectiveness(hints, quality)
        }
        None => BTreeMap::new(),
    };

    if let Some(tasks) = &inputs.tasks {
        patterns.extend(detect_autopilot_failures(tasks));
    }

    let (architecture_baseline, baseline_delta) = match &inputs.architecture {
        Some(scan) => {
            let (findings, delta) =
                detect_architecture_drift(scan, thresholds, prior_baseline.as_ref());
            patterns.extend(findings);
            (Some(scan.clone()), delta)
        }
        None => (prior_baseline, None),
    };

    patterns.sort_by_key(|p| p.severity.rank());

    let summary = match patterns.first() {
        Some(top) => format!(
            "{} pattern(s) detected; top: {}",
            patterns.len(),
            top.details.label()
        ),
        None => "no patterns detected".to_string(),
    };

    PatternReport {
        generated_at: now,
        patterns_detected: patterns.len(),
        patterns,
        issue_code_history: issue_history,
        intervention_effectiveness,
        architecture_baseline,
        baseline_delta,
        summary,
    }
}
