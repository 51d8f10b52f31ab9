//! Recurring-issue tracking with time-based decay.
//!
//! Issue codes accumulate counts across runs. Entries unseen for 7+ days
//! are pruned outright; entries unseen for 3+ days have their count halved
//! each run and are deleted once below the floor. Resolved problems heal
//! out of the history gradually instead of falling off a cliff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::inputs::HealthReport;
use super::{Pattern, PatternDetails, Severity};

/// Entries unseen this long are removed outright.
const PRUNE_DAYS: i64 = 7;
/// Entries unseen this long decay by half each run.
const DECAY_DAYS: i64 = 3;
/// A decayed count below this is deleted.
const DECAY_FLOOR: u32 = 5;

const RECURRING_HIGH: u32 = 10;
const RECURRING_MEDIUM: u32 = 5;

/// Accumulated sightings of one issue code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssueCodeEntry {
    pub count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Issue code → accumulated sighting record.
pub type IssueCodeHistory = BTreeMap<String, IssueCodeEntry>;

/// Fold the latest health snapshot into the history, then apply decay.
///
/// Only warning-or-worse severities increment counts and refresh
/// `lastSeen`; an informational sighting of a known code neither counts
/// nor refreshes, so decay keeps running on elapsed time alone.
pub fn update_issue_history(
    history: &mut IssueCodeHistory,
    report: &HealthReport,
    now: DateTime<Utc>,
) {
    for issue in &report.issues {
        if !issue.severity.is_actionable() {
            continue;
        }
        history
            .entry(issue.code.clone())
            .and_modify(|entry| {
                entry.count += 1;
                entry.last_seen = now;
            })
            .or_insert(IssueCodeEntry {
                count: 1,
                first_seen: now,
                last_seen: now,
            });
    }

    decay_issue_history(history, now);
}

/// Apply prune-then-decay to every entry.
pub fn decay_issue_history(history: &mut IssueCodeHistory, now: DateTime<Utc>) {
    history.retain(|_, entry| (now - entry.last_seen).num_days() < PRUNE_DAYS);

    history.retain(|_, entry| {
        if (now - entry.last_seen).num_days() >= DECAY_DAYS {
            entry.count /= 2;
            entry.count >= DECAY_FLOOR
        } else {
            true
        }
    });
}

/// Flag codes that keep recurring.
pub fn detect_recurring_issues(history: &IssueCodeHistory) -> Vec<Pattern> {
    let mut findings = Vec::new();

    for (code, entry) in history {
        let severity = if entry.count >= RECURRING_HIGH {
            Severity::High
        } else if entry.count >= RECURRING_MEDIUM {
            Severity::Medium
        } else {
            continue;
        };

        findings.push(Pattern {
            severity,
            details: PatternDetails::RecurringIssue {
                code: code.clone(),
                count: entry.count,
                first_seen: entry.first_seen,
                last_seen: entry.last_seen,
            },
            suggestion: format!(
                "\"{}\" has recurred {} times since {}; fix the underlying cause rather than re-running",
                code,
                entry.count,
                entry.first_seen.format("%Y-%m-%d")
            ),
        });
    }

    findings
}
