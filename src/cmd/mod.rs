//! CLI command implementations.

use anyhow::{Context, Result};
use chrono::Utc;
use console::style;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::manifest::Manifest;
use crate::patterns::{AnalyzerInputs, analyze_patterns, scan_architecture};
use crate::pipeline::{Gate, PhaseStatus, PipelineResult, RunContext, run_pipeline};
use crate::quota::probe::{api_key_from_env, probe};
use crate::quota::QuotaStatus;

/// `feedpilot run`: execute the manifest and persist the run result.
///
/// Returns the gate so `main` can mirror it in the process exit code.
pub async fn cmd_run(config: &Config, manifest_path: Option<&Path>) -> Result<Gate> {
    let path = manifest_path.unwrap_or(&config.manifest_file);
    let manifest = Manifest::load(path)?;
    config.ensure_data_dir()?;

    let ctx = RunContext::from_config(config);
    info!(
        manifest = %path.display(),
        phases = manifest.phases.len(),
        steps = manifest.step_count(),
        tier = %ctx.tier_name,
        "starting pipeline run"
    );

    let result = run_pipeline(&manifest, &ctx).await;
    result.save(&config.result_file)?;

    print_run_summary(&result);
    Ok(result.gate)
}

/// `feedpilot quota`: probe (unless asked not to), evaluate, persist, and
/// print `key=value` lines for shell consumers.
pub async fn cmd_quota(config: &Config, no_probe: bool) -> Result<()> {
    let snapshot = if no_probe {
        None
    } else {
        match api_key_from_env() {
            Ok(key) => match probe(&key).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(error = %e, "quota probe failed, degrading to no data");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "skipping quota probe");
                None
            }
        }
    };

    let status = QuotaStatus::new(snapshot, Utc::now());
    config.ensure_data_dir()?;
    status.save(&config.quota_file)?;

    for line in status.shell_lines() {
        println!("{}", line);
    }
    if let Some(note) = &status.evaluation.reset_note {
        eprintln!("  {}", style(note).dim());
    }
    Ok(())
}

/// `feedpilot analyze`: fold fresh run history into the pattern report.
pub fn cmd_analyze(config: &Config) -> Result<()> {
    let mut inputs = AnalyzerInputs::load(config)?;

    // Step count feeds the architecture baseline; an unreadable manifest
    // just means an architecture scan without it.
    let step_count = Manifest::load(&config.manifest_file)
        .map(|m| m.step_count())
        .unwrap_or(0);
    inputs.architecture = Some(scan_architecture(&config.project_dir, step_count));

    let report = analyze_patterns(inputs, &config.architecture, Utc::now());
    config.ensure_data_dir()?;
    report.save(&config.report_file)?;

    println!("{}", style(&report.summary).bold());
    for pattern in &report.patterns {
        let severity = match pattern.severity {
            crate::patterns::Severity::High => style("high  ").red(),
            crate::patterns::Severity::Medium => style("medium").yellow(),
            crate::patterns::Severity::Low => style("low   ").dim(),
        };
        println!("  {} {}", severity, pattern.suggestion);
    }
    Ok(())
}

/// `feedpilot status`: pretty-print the last persisted run result.
pub fn cmd_status(config: &Config) -> Result<()> {
    if !config.result_file.exists() {
        println!("No pipeline run recorded yet");
        return Ok(());
    }
    let result = PipelineResult::load(&config.result_file)
        .context("Last run result exists but could not be loaded")?;
    print_run_summary(&result);
    Ok(())
}

fn print_run_summary(result: &PipelineResult) {
    let gate = match result.gate {
        Gate::Pass => style("PASS").green().bold(),
        Gate::Fail => style("FAIL").red().bold(),
    };
    println!(
        "Gate: {}  ({} steps: {} ok, {} failed, {} skipped, {}ms)",
        gate,
        result.summary.total,
        result.summary.success,
        result.summary.failed,
        result.summary.skipped,
        result.duration_ms
    );

    for (name, phase) in &result.phases {
        let status = match phase.status {
            PhaseStatus::Success => style("success").green(),
            PhaseStatus::Partial => style("partial").yellow(),
            PhaseStatus::Failed => style("failed ").red(),
            PhaseStatus::Skipped => style("skipped").dim(),
        };
        match &phase.aborted_by {
            Some(step) => println!("  {} {} (aborted by {})", status, name, step),
            None => println!("  {} {}", status, name),
        }
    }
}
