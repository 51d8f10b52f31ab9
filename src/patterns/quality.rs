//! Quality-decline and stagnant-loop detectors.

use super::inputs::{LoopHistory, QualityHistory};
use super::{Pattern, PatternDetails, Severity};

/// At most this many recent points feed the decline comparison.
const DECLINE_WINDOW: usize = 12;
/// Fewer points than this and the halves are too small to compare.
const DECLINE_MIN_POINTS: usize = 4;

/// Score-like metrics (0–100): drop threshold and absolute floor.
const SCORE_DROP_THRESHOLD: f64 = 15.0;
const SCORE_FLOOR: f64 = 50.0;
/// Ratio-like metrics (0–1).
const RATIO_DROP_THRESHOLD: f64 = 0.3;
const RATIO_FLOOR: f64 = 0.5;

/// A feedback loop scoring 1.0 counts as closed.
const LOOP_CLOSED: f64 = 1.0;
const STAGNANT_MEDIUM_RUNS: u32 = 6;
const STAGNANT_HIGH_RUNS: u32 = 10;

/// Flag metrics whose recent average fell off against the earlier half of
/// the window. Severity escalates when the late average is below the
/// metric's absolute floor.
pub fn detect_quality_decline(history: &QualityHistory) -> Vec<Pattern> {
    let mut findings = Vec::new();

    for metric in history.metric_names() {
        let series = history.series(&metric);
        if series.len() < DECLINE_MIN_POINTS {
            continue;
        }

        let window: Vec<f64> = series
            .iter()
            .copied()
            .skip(series.len().saturating_sub(DECLINE_WINDOW))
            .collect();

        let mid = window.len() / 2;
        let early_avg = mean(&window[..mid]);
        let late_avg = mean(&window[mid..]);

        let ratio_like = window.iter().all(|v| (0.0..=1.0).contains(v));
        let (threshold, floor) = if ratio_like {
            (RATIO_DROP_THRESHOLD, RATIO_FLOOR)
        } else {
            (SCORE_DROP_THRESHOLD, SCORE_FLOOR)
        };

        let drop = early_avg - late_avg;
        if drop <= threshold {
            continue;
        }

        let severity = if late_avg < floor {
            Severity::High
        } else {
            Severity::Medium
        };

        findings.push(Pattern {
            severity,
            details: PatternDetails::QualityDecline {
                metric: metric.clone(),
                early_avg,
                late_avg,
                drop,
            },
            suggestion: format!(
                "\"{}\" declined from avg {:.1} to {:.1} over the last {} runs; review the step that produces it",
                metric,
                early_avg,
                late_avg,
                window.len()
            ),
        });
    }

    findings
}

/// Flag feedback loops stuck at the same sub-closed score run after run.
pub fn detect_stagnant_loops(loops: &LoopHistory) -> Vec<Pattern> {
    let mut findings = Vec::new();
    let Some(last) = loops.entries.last() else {
        return findings;
    };

    for (name, &score) in &last.scores {
        if score >= LOOP_CLOSED {
            continue;
        }

        let streak = trailing_streak(loops, name, score);
        let severity = if streak >= STAGNANT_HIGH_RUNS {
            Severity::High
        } else if streak >= STAGNANT_MEDIUM_RUNS {
            Severity::Medium
        } else {
            continue;
        };

        findings.push(Pattern {
            severity,
            details: PatternDetails::StagnantLoop {
                loop_name: name.clone(),
                score,
                runs: streak,
            },
            suggestion: format!(
                "loop \"{}\" has been stuck at {:.2} for {} consecutive runs; its corrective hints are not closing it",
                name, score, streak
            ),
        });
    }

    findings
}

/// Consecutive entries ending at the most recent one where the loop holds
/// exactly this score.
fn trailing_streak(loops: &LoopHistory, name: &str, score: f64) -> u32 {
    let mut streak = 0;
    for entry in loops.entries.iter().rev() {
        match entry.scores.get(name) {
            Some(&v) if (v - score).abs() < f64::EPSILON => streak += 1,
            _ => break,
        }
    }
    streak
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
