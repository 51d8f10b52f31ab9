//! Cross-loop dependency and autopilot-failure detectors.

use super::inputs::{QualityHistory, TaskLog};
use super::{Pattern, PatternDetails, Severity};

/// Known upstream → downstream metric couplings; a drop upstream tends to
/// show downstream in the same run when the coupling is real.
const LOOP_DEPENDENCIES: &[(&str, &str)] = &[
    ("fetch_coverage", "enrichment_quality"),
    ("enrichment_quality", "content_score"),
    ("content_score", "publish_freshness"),
];

/// Run pairs examined for correlated drops.
const CROSS_LOOP_WINDOW: usize = 10;
/// Both metrics dropping together this often flags the coupling.
const CORRELATED_DROP_THRESHOLD: u32 = 2;

/// Task runs examined by the autopilot detector.
const AUTOPILOT_WINDOW: usize = 10;
const AUTOPILOT_FAILURE_RATE: f64 = 0.3;
const AUTOPILOT_HIGH_RATE: f64 = 0.5;
/// A single task failing this often gets called out by name.
const TASK_FAILURE_THRESHOLD: u32 = 2;

/// Surface implicit causal coupling: an upstream and a downstream metric
/// dropping together in the same run, repeatedly.
pub fn detect_cross_loop_dependencies(quality: &QualityHistory) -> Vec<Pattern> {
    let mut findings = Vec::new();
    if quality.entries.len() < 2 {
        return findings;
    }

    let start = quality.entries.len().saturating_sub(CROSS_LOOP_WINDOW + 1);
    let window = &quality.entries[start..];

    for &(upstream, downstream) in LOOP_DEPENDENCIES {
        let mut correlated = 0u32;
        for pair in window.windows(2) {
            let dropped = |metric: &str| match (
                pair[0].metrics.get(metric),
                pair[1].metrics.get(metric),
            ) {
                (Some(prev), Some(next)) => next < prev,
                _ => false,
            };
            if dropped(upstream) && dropped(downstream) {
                correlated += 1;
            }
        }

        if correlated >= CORRELATED_DROP_THRESHOLD {
            findings.push(Pattern {
                severity: Severity::Medium,
                details: PatternDetails::CrossLoopDependency {
                    upstream: upstream.to_string(),
                    downstream: downstream.to_string(),
                    correlated_drops: correlated,
                },
                suggestion: format!(
                    "\"{}\" and \"{}\" dropped together {} times recently; fixing the upstream step likely heals both",
                    upstream, downstream, correlated
                ),
            });
        }
    }

    findings
}

/// Flag a high failure rate over the recent autopilot task runs, calling
/// out repeat-offender tasks by name.
pub fn detect_autopilot_failures(tasks: &TaskLog) -> Vec<Pattern> {
    let start = tasks.runs.len().saturating_sub(AUTOPILOT_WINDOW);
    let window = &tasks.runs[start..];
    if window.is_empty() {
        return Vec::new();
    }

    let failed = window.iter().filter(|r| !r.success).count();
    let failure_rate = failed as f64 / window.len() as f64;
    if failure_rate < AUTOPILOT_FAILURE_RATE {
        return Vec::new();
    }

    let mut by_task: std::collections::BTreeMap<&str, u32> = std::collections::BTreeMap::new();
    for run in window.iter().filter(|r| !r.success) {
        *by_task.entry(run.task.as_str()).or_default() += 1;
    }
    let failed_tasks: Vec<String> = by_task
        .into_iter()
        .filter(|&(_, count)| count >= TASK_FAILURE_THRESHOLD)
        .map(|(task, _)| task.to_string())
        .collect();

    let severity = if failure_rate >= AUTOPILOT_HIGH_RATE {
        Severity::High
    } else {
        Severity::Medium
    };

    let suggestion = if failed_tasks.is_empty() {
        format!(
            "{:.0}% of the last {} autopilot runs failed; check the run logs",
            failure_rate * 100.0,
            window.len()
        )
    } else {
        format!(
            "{:.0}% of the last {} autopilot runs failed; repeat offenders: {}",
            failure_rate * 100.0,
            window.len(),
            failed_tasks.join(", ")
        )
    };

    vec![Pattern {
        severity,
        details: PatternDetails::AutopilotFailures {
            failure_rate,
            window: window.len() as u32,
            failed_tasks,
        },
        suggestion,
    }]
}
