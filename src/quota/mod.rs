//! Quota governor: shared AI-capability budget → discrete operating tier.
//!
//! | Submodule | What it owns                                      |
//! |-----------|---------------------------------------------------|
//! | (here)    | `QuotaSnapshot`, tier table, pure `evaluate_tier` |
//! | `probe`   | the side-effecting minimal paid API call          |
//!
//! `evaluate_tier` is a pure function of a snapshot plus the current time,
//! independently testable without network access. The probe degrades every
//! failure to "no data", which evaluates to the permissive green tier.

pub mod probe;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Provider rate-limit headers (reported as 0–1 ratios).
const HEADER_5H_UTILIZATION: &str = "anthropic-ratelimit-unified-5h-utilization";
const HEADER_7D_UTILIZATION: &str = "anthropic-ratelimit-unified-7d-utilization";
const HEADER_5H_RESET: &str = "anthropic-ratelimit-unified-5h-reset";
const HEADER_7D_RESET: &str = "anthropic-ratelimit-unified-7d-reset";

/// A reset this close relaxes the decided tier by one level.
const RESET_RELAXATION_MINUTES: i64 = 60;

/// A point-in-time reading of the shared quota, percentages 0–100.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSnapshot {
    pub five_hour: Option<f64>,
    pub seven_day: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub five_hour_reset: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seven_day_reset: Option<DateTime<Utc>>,
}

/// One row of the tier table.
#[derive(Debug, Clone, Copy)]
pub struct TierSpec {
    pub tier: u8,
    pub name: &'static str,
    /// A tier applies when `max(fiveHour, sevenDay)` is at or below this.
    pub ceiling: f64,
    /// Steps with `quotaPriority` above this are skipped.
    pub max_priority: u8,
    /// Forced model downgrade for AI-dependent steps.
    pub model: Option<&'static str>,
}

/// Ordered most→least permissive; ceilings and priority ceilings are
/// strictly monotonic.
pub const TIERS: [TierSpec; 4] = [
    TierSpec {
        tier: 0,
        name: "green",
        ceiling: 50.0,
        max_priority: 3,
        model: None,
    },
    TierSpec {
        tier: 1,
        name: "moderate",
        ceiling: 70.0,
        max_priority: 2,
        model: None,
    },
    TierSpec {
        tier: 2,
        name: "high",
        ceiling: 85.0,
        max_priority: 2,
        model: Some("claude-haiku"),
    },
    TierSpec {
        tier: 3,
        name: "critical",
        ceiling: 100.0,
        max_priority: 1,
        model: Some("claude-haiku"),
    },
];

/// The derived tier decision, persisted for child-process steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TierEvaluation {
    pub tier: u8,
    pub tier_name: String,
    pub max_priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub constrained: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_note: Option<String>,
}

/// Serializable copy of a tier table row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TierInfo {
    pub tier: u8,
    pub name: String,
    pub ceiling: f64,
    pub max_priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl From<&TierSpec> for TierInfo {
    fn from(spec: &TierSpec) -> Self {
        Self {
            tier: spec.tier,
            name: spec.name.to_string(),
            ceiling: spec.ceiling,
            max_priority: spec.max_priority,
            model: spec.model.map(String::from),
        }
    }
}

/// Snapshot + decision, written to the quota status file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub probed_at: DateTime<Utc>,
    pub quota: Option<QuotaSnapshot>,
    pub evaluation: TierEvaluation,
    pub tiers: Vec<TierInfo>,
}

impl QuotaStatus {
    pub fn new(quota: Option<QuotaSnapshot>, now: DateTime<Utc>) -> Self {
        let evaluation = evaluate_tier(quota.as_ref(), now);
        Self {
            probed_at: now,
            quota,
            evaluation,
            tiers: TIERS.iter().map(TierInfo::from).collect(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize quota status")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write quota status to {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read quota status at {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse quota status at {}", path.display()))
    }

    /// `key=value` lines for shell consumption by child-process steps.
    pub fn shell_lines(&self) -> Vec<String> {
        let e = &self.evaluation;
        vec![
            format!("tier={}", e.tier),
            format!("tierName={}", e.tier_name),
            format!("maxPriority={}", e.max_priority),
            format!("model={}", e.model.as_deref().unwrap_or("default")),
            format!("constrained={}", e.constrained),
        ]
    }
}

/// Extract a quota snapshot from the provider's response headers.
///
/// Utilization ratios are normalized to 0–100. Returns `None` when neither
/// utilization header is present ("no data").
pub fn parse_utilization(headers: &HeaderMap) -> Option<QuotaSnapshot> {
    let five_hour = header_ratio(headers, HEADER_5H_UTILIZATION);
    let seven_day = header_ratio(headers, HEADER_7D_UTILIZATION);
    if five_hour.is_none() && seven_day.is_none() {
        return None;
    }
    Some(QuotaSnapshot {
        five_hour,
        seven_day,
        five_hour_reset: header_timestamp(headers, HEADER_5H_RESET),
        seven_day_reset: header_timestamp(headers, HEADER_7D_RESET),
    })
}

fn header_ratio(headers: &HeaderMap, name: &str) -> Option<f64> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .parse::<f64>()
        .ok()
        .map(|ratio| ratio * 100.0)
}

fn header_timestamp(headers: &HeaderMap, name: &str) -> Option<DateTime<Utc>> {
    let value = headers.get(name)?.to_str().ok()?;
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Decide the operating tier for a snapshot at `now`.
///
/// Walks the tier table most→least permissive and picks the first tier
/// whose ceiling covers `max(fiveHour, sevenDay)`. If the chosen tier is
/// constrained and the *binding* window (the higher percentage) resets
/// within the hour, the tier relaxes by exactly one level: a near-term
/// reset makes today's saturation temporary.
pub fn evaluate_tier(snapshot: Option<&QuotaSnapshot>, now: DateTime<Utc>) -> TierEvaluation {
    let Some(snap) = snapshot else {
        let tier = &TIERS[0];
        return TierEvaluation {
            tier: tier.tier,
            tier_name: tier.name.to_string(),
            max_priority: tier.max_priority,
            model: None,
            constrained: false,
            reason: "no quota data available".to_string(),
            reset_note: None,
        };
    };

    let five = snap.five_hour.unwrap_or(0.0);
    let seven = snap.seven_day.unwrap_or(0.0);
    let binding = five.max(seven);

    let mut index = TIERS
        .iter()
        .position(|t| binding <= t.ceiling)
        .unwrap_or(TIERS.len() - 1);

    let mut reset_note = None;
    if index > 0 {
        let (window, reset) = if five >= seven {
            ("5h", snap.five_hour_reset)
        } else {
            ("7d", snap.seven_day_reset)
        };
        if let Some(reset) = reset {
            let minutes = (reset - now).num_minutes();
            if minutes <= RESET_RELAXATION_MINUTES {
                index -= 1;
                reset_note = Some(format!(
                    "{} window resets in {}m; relaxed one tier",
                    window,
                    minutes.max(0)
                ));
            }
        }
    }

    let tier = &TIERS[index];
    TierEvaluation {
        tier: tier.tier,
        tier_name: tier.name.to_string(),
        max_priority: tier.max_priority,
        model: tier.model.map(String::from),
        constrained: index > 0,
        reason: format!(
            "utilization 5h={:.0}% 7d={:.0}%, binding {:.0}%",
            five, seven, binding
        ),
        reset_note,
    }
}
