//! Phase and pipeline execution.
//!
//! Parallel phases launch every step concurrently and wait for all of them
//! to settle; sequential phases run in manifest order and abort the
//! remainder of the phase the moment a `required` step fails. Once one phase
//! aborts, every later phase is recorded as skipped without execution.

use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

use super::result::{
    Gate, PhaseResult, PhaseStatus, PipelineResult, StepResult, StepStatus,
};
use super::step::execute_step;
use crate::manifest::{ErrorPolicy, Manifest, PhaseSpec, StepSpec};
use crate::config::Config;
use crate::quota::QuotaStatus;

/// Steps whose name carries this marker act as the run's finalization gate:
/// their failure fails the overall gate even under a `continue` policy.
const PRECOMMIT_GATE_MARKER: &str = "pre-commit";

/// Per-run context shared by every phase.
pub struct RunContext {
    pub default_timeout: std::time::Duration,
    /// Priority ceiling from the last persisted quota decision; steps whose
    /// `quotaPriority` exceeds it are skipped.
    pub max_priority: u8,
    pub tier_name: String,
}

impl RunContext {
    /// Build a context from the last persisted quota decision, if any.
    /// No quota file means no constraint (permissive green tier).
    pub fn from_config(config: &Config) -> Self {
        let (max_priority, tier_name) = match QuotaStatus::load(&config.quota_file) {
            Ok(status) => (
                status.evaluation.max_priority,
                status.evaluation.tier_name.clone(),
            ),
            Err(_) => (3, "green".to_string()),
        };
        Self {
            default_timeout: config.default_step_timeout,
            max_priority,
            tier_name,
        }
    }
}

/// Run every phase of the manifest in order and persist nothing; the caller
/// owns serialization of the returned result.
pub async fn run_pipeline(manifest: &Manifest, ctx: &RunContext) -> PipelineResult {
    let started_at = Utc::now();
    let start = Instant::now();
    let mut phases = BTreeMap::new();
    let mut aborted = false;
    let mut gate = Gate::Pass;

    for phase in &manifest.phases {
        if aborted {
            info!(phase = %phase.name, "skipping phase after earlier abort");
            phases.insert(phase.name.clone(), PhaseResult::skipped(&phase.name));
            continue;
        }

        let result = run_phase(phase, ctx).await;

        if result.aborted_by.is_some() {
            aborted = true;
            gate = Gate::Fail;
        }
        if result
            .steps
            .iter()
            .any(|s| s.name.contains(PRECOMMIT_GATE_MARKER) && s.status == StepStatus::Failed)
        {
            gate = Gate::Fail;
        }

        phases.insert(phase.name.clone(), result);
    }

    let completed_at = Utc::now();
    PipelineResult {
        started_at,
        completed_at,
        duration_ms: start.elapsed().as_millis() as u64,
        gate,
        summary: PipelineResult::summarize(&phases),
        phases,
    }
}

/// Run a single phase according to its `parallel` flag.
pub async fn run_phase(phase: &PhaseSpec, ctx: &RunContext) -> PhaseResult {
    info!(phase = %phase.name, parallel = phase.parallel, steps = phase.steps.len(), "running phase");

    let (steps, aborted_by) = if phase.parallel {
        let steps = run_parallel(phase, ctx).await;
        // Every step settled; a failed required step is still a hard
        // phase-level fault.
        let aborted_by = phase
            .steps
            .iter()
            .zip(&steps)
            .find(|(spec, result)| {
                spec.error_policy == ErrorPolicy::Required
                    && result.status == StepStatus::Failed
            })
            .map(|(spec, _)| spec.name.clone());
        (steps, aborted_by)
    } else {
        run_sequential(phase, ctx).await
    };

    let status = phase_status(&steps, &aborted_by);
    PhaseResult {
        name: phase.name.clone(),
        status,
        steps,
        aborted_by,
    }
}

/// Launch every step concurrently and collect all results. A failing or
/// timed-out step cannot suppress its siblings' results.
async fn run_parallel(phase: &PhaseSpec, ctx: &RunContext) -> Vec<StepResult> {
    let futures = phase
        .steps
        .iter()
        .map(|step| run_step_gated(step, ctx));
    join_all(futures).await
}

/// Run steps one at a time; a failing `required` step aborts the remainder
/// of the phase, leaving the unreached steps unrecorded.
async fn run_sequential(phase: &PhaseSpec, ctx: &RunContext) -> (Vec<StepResult>, Option<String>) {
    let mut results = Vec::new();

    for step in &phase.steps {
        let result = run_step_gated(step, ctx).await;
        let failed = result.status == StepStatus::Failed;
        results.push(result);

        if failed {
            match step.error_policy {
                ErrorPolicy::Required => {
                    warn!(phase = %phase.name, step = %step.name, "required step failed, aborting phase");
                    return (results, Some(step.name.clone()));
                }
                ErrorPolicy::Continue => {
                    warn!(phase = %phase.name, step = %step.name, "step failed, continuing");
                }
            }
        }
    }

    (results, None)
}

/// Apply the quota gate, then execute.
async fn run_step_gated(step: &StepSpec, ctx: &RunContext) -> StepResult {
    if let Some(priority) = step.quota_priority {
        if priority > ctx.max_priority {
            let reason = format!(
                "quota tier \"{}\" limits priority to {} (step is priority {})",
                ctx.tier_name, ctx.max_priority, priority
            );
            info!(step = %step.name, %reason, "skipping step");
            return StepResult::skipped(&step.name, reason);
        }
    }
    execute_step(step, ctx.default_timeout).await
}

fn phase_status(steps: &[StepResult], aborted_by: &Option<String>) -> PhaseStatus {
    if aborted_by.is_some() {
        return PhaseStatus::Failed;
    }
    let any_failed = steps.iter().any(|s| s.status == StepStatus::Failed);
    let any_success = steps.iter().any(|s| s.status == StepStatus::Success);
    match (any_failed, any_success) {
        (true, true) => PhaseStatus::Partial,
        (true, false) => PhaseStatus::Failed,
        _ => PhaseStatus::Success,
    }
}
