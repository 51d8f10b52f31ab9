//! Hint-fatigue and intervention-effectiveness detectors.
//!
//! Hints are free text; the mapping to the metric they target is a small
//! ordered substring table, deliberately heuristic and easy to extend.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::inputs::{HintHistory, QualityHistory};
use super::{Pattern, PatternDetails, Severity};

/// Ordered (substring, targeted metric) pairs; first match wins.
const HINT_METRIC_TABLE: &[(&str, &str)] = &[
    ("coverage", "fetch_coverage"),
    ("standings", "standings_freshness"),
    ("freshness", "publish_freshness"),
    ("enrich", "enrichment_quality"),
    ("summary", "enrichment_quality"),
    ("score", "content_score"),
    ("quality", "content_score"),
];

/// Hints are examined over this many recent runs.
const FATIGUE_WINDOW: usize = 20;
/// A hint firing this often without improvement is fatigued.
const FATIGUE_THRESHOLD: usize = 5;

/// A delta smaller than this counts as unchanged.
const DELTA_EPSILON: f64 = 1e-9;

/// Per-metric tally of what happened after hints targeting it fired.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessStat {
    pub improved: u32,
    pub unchanged: u32,
    pub worsened: u32,
    /// improved / (improved + unchanged + worsened)
    pub rate: f64,
}

/// Map a free-text hint to the metric it targets.
pub fn hint_target_metric(hint: &str) -> Option<&'static str> {
    let lower = hint.to_lowercase();
    HINT_METRIC_TABLE
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, metric)| *metric)
}

/// Flag hints that keep firing while their targeted metric goes nowhere.
pub fn detect_hint_fatigue(hints: &HintHistory, quality: &QualityHistory) -> Vec<Pattern> {
    let mut findings = Vec::new();

    let window_start = hints.entries.len().saturating_sub(FATIGUE_WINDOW);
    let window = &hints.entries[window_start..];
    if window.is_empty() {
        return findings;
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in window {
        for hint in &entry.hints {
            *counts.entry(hint.as_str()).or_default() += 1;
        }
    }

    for (hint, count) in counts {
        if count < FATIGUE_THRESHOLD {
            continue;
        }
        let Some(metric) = hint_target_metric(hint) else {
            continue;
        };

        // Compare the metric's first and last observation across the same
        // window of runs.
        let series = quality.series(metric);
        let tail_start = series.len().saturating_sub(FATIGUE_WINDOW);
        let tail = &series[tail_start..];
        let improved = match (tail.first(), tail.last()) {
            (Some(first), Some(last)) => last - first > DELTA_EPSILON,
            _ => false,
        };
        if improved {
            continue;
        }

        findings.push(Pattern {
            severity: Severity::Medium,
            details: PatternDetails::HintFatigue {
                hint: hint.to_string(),
                metric: metric.to_string(),
                occurrences: count as u32,
            },
            suggestion: format!(
                "hint \"{}\" fired {} times in the last {} runs without moving {}; replace it with a different intervention",
                hint, count, FATIGUE_WINDOW, metric
            ),
        });
    }

    findings
}

/// Tally what each hint's targeted metric did on the run after the hint.
///
/// Diagnostic context for the fatigue detector; not itself a ranked
/// finding.
pub fn compute_effectiveness(
    hints: &HintHistory,
    quality: &QualityHistory,
) -> BTreeMap<String, EffectivenessStat> {
    let mut stats: BTreeMap<String, EffectivenessStat> = BTreeMap::new();

    for entry in &hints.entries {
        // This run's measurement is the first quality entry recorded after
        // the hint; "after" is the run that followed it.
        let this_idx = quality
            .entries
            .iter()
            .position(|q| q.timestamp > entry.timestamp);
        let Some(this_idx) = this_idx else { continue };
        if this_idx + 1 >= quality.entries.len() {
            continue;
        }

        for hint in &entry.hints {
            let Some(metric) = hint_target_metric(hint) else {
                continue;
            };
            let before = quality.entries[this_idx].metrics.get(metric);
            let after = quality.entries[this_idx + 1].metrics.get(metric);
            let (Some(&before), Some(&after)) = (before, after) else {
                continue;
            };

            let stat = stats.entry(metric.to_string()).or_default();
            let delta = after - before;
            if delta > DELTA_EPSILON {
                stat.improved += 1;
            } else if delta < -DELTA_EPSILON {
                stat.worsened += 1;
            } else {
                stat.unchanged += 1;
            }
        }
    }

    for stat in stats.values_mut() {
        let total = stat.improved + stat.unchanged + stat.worsened;
        if total > 0 {
            stat.rate = stat.improved as f64 / total as f64;
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::inputs::{HintEntry, QualityEntry};
    use chrono::{Duration, Utc};

    fn aligned_histories(
        hint: &str,
        hint_runs: usize,
        metric: &str,
        values: &[f64],
    ) -> (HintHistory, QualityHistory) {
        let base = Utc::now() - Duration::days(values.len() as i64);
        let quality = QualityHistory {
            entries: values
                .iter()
                .enumerate()
                .map(|(i, &v)| QualityEntry {
                    // Quality lands just after the run's hints.
                    timestamp: base + Duration::days(i as i64) + Duration::minutes(5),
                    metrics: BTreeMap::from([(metric.to_string(), v)]),
                })
                .collect(),
        };
        let hints = HintHistory {
            entries: (0..hint_runs)
                .map(|i| HintEntry {
                    timestamp: base + Duration::days(i as i64),
                    hints: vec![hint.to_string()],
                })
                .collect(),
        };
        (hints, quality)
    }

    #[test]
    fn test_hint_target_metric_first_match_wins() {
        assert_eq!(
            hint_target_metric("Improve fetch coverage for weekend games"),
            Some("fetch_coverage")
        );
        assert_eq!(
            hint_target_metric("Raise enrichment depth"),
            Some("enrichment_quality")
        );
        assert_eq!(hint_target_metric("Water the plants"), None);
    }

    #[test]
    fn test_fatigue_flagged_when_metric_flat() {
        let (hints, quality) =
            aligned_histories("improve coverage of event fetch", 6, "fetch_coverage", &[0.6; 6]);
        let findings = detect_hint_fatigue(&hints, &quality);
        assert_eq!(findings.len(), 1);
        match &findings[0].details {
            PatternDetails::HintFatigue {
                metric, occurrences, ..
            } => {
                assert_eq!(metric, "fetch_coverage");
                assert_eq!(*occurrences, 6);
            }
            other => panic!("Expected HintFatigue, got {:?}", other),
        }
    }

    #[test]
    fn test_fatigue_not_flagged_when_metric_improves() {
        let (hints, quality) = aligned_histories(
            "improve coverage of event fetch",
            6,
            "fetch_coverage",
            &[0.6, 0.62, 0.65, 0.7, 0.75, 0.8],
        );
        assert!(detect_hint_fatigue(&hints, &quality).is_empty());
    }

    #[test]
    fn test_fatigue_needs_five_occurrences() {
        let (hints, quality) =
            aligned_histories("improve coverage of event fetch", 4, "fetch_coverage", &[0.6; 4]);
        assert!(detect_hint_fatigue(&hints, &quality).is_empty());
    }

    #[test]
    fn test_effectiveness_tallies_next_run_deltas() {
        let (hints, quality) = aligned_histories(
            "raise content score",
            4,
            "content_score",
            &[70.0, 75.0, 75.0, 72.0, 80.0],
        );

        let stats = compute_effectiveness(&hints, &quality);
        let stat = &stats["content_score"];
        // Deltas after each hint: +5, 0, -3, +8.
        assert_eq!(stat.improved, 2);
        assert_eq!(stat.unchanged, 1);
        assert_eq!(stat.worsened, 1);
        assert!((stat.rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_effectiveness_ignores_unmapped_hints() {
        let (mut hints, quality) =
            aligned_histories("placeholder", 3, "content_score", &[70.0, 75.0, 80.0]);
        for entry in &mut hints.entries {
            entry.hints = vec!["tune something unrelated".to_string()];
        }
        assert!(compute_effectiveness(&hints, &quality).is_empty());
    }
}
