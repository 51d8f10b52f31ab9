//! Step execution.
//!
//! Runs one manifest step as a `sh -c` subprocess with a deadline. A step's
//! failure is always captured as a `StepResult`; nothing here returns an
//! error to the phase loop.

use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::result::StepResult;
use crate::manifest::StepSpec;

/// Check that every required environment variable is set.
///
/// Returns `(ok, missing)`; a step with missing requirements is marked
/// skipped and never attempted.
pub fn check_requirements(required: &[String]) -> (bool, Vec<String>) {
    let missing: Vec<String> = required
        .iter()
        .filter(|var| std::env::var(var).map(|v| v.is_empty()).unwrap_or(true))
        .cloned()
        .collect();
    (missing.is_empty(), missing)
}

/// Execute one step with a deadline.
///
/// The deadline is the step's own `timeout` if declared, otherwise
/// `default_timeout`. On expiry the child is killed and the step records a
/// timeout-category failure.
pub async fn execute_step(step: &StepSpec, default_timeout: Duration) -> StepResult {
    let (ok, missing) = check_requirements(&step.requires);
    if !ok {
        let reason = format!("missing required environment: {}", missing.join(", "));
        debug!(step = %step.name, %reason, "skipping step");
        return StepResult::skipped(&step.name, reason);
    }

    let deadline = step
        .timeout
        .map(Duration::from_secs)
        .unwrap_or(default_timeout);

    debug!(step = %step.name, command = %step.command, ?deadline, "executing step");
    let start = Instant::now();

    let spawned = Command::new("sh")
        .arg("-c")
        .arg(&step.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match spawned {
        Ok(child) => child,
        Err(e) => {
            let elapsed = start.elapsed().as_millis() as u64;
            return StepResult::failed(
                &step.name,
                elapsed,
                format!("failed to spawn command: {}", e),
            );
        }
    };

    let output = match timeout(deadline, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            let elapsed = start.elapsed().as_millis() as u64;
            return StepResult::failed(
                &step.name,
                elapsed,
                format!("failed to collect command output: {}", e),
            );
        }
        Err(_) => {
            // kill_on_drop reaps the child when the future is dropped here.
            let elapsed = start.elapsed().as_millis() as u64;
            warn!(step = %step.name, "step timed out");
            return StepResult::failed(
                &step.name,
                elapsed,
                format!("step timed out after {}s", deadline.as_secs()),
            );
        }
    };

    let elapsed = start.elapsed().as_millis() as u64;

    if output.status.success() {
        StepResult::success(&step.name, elapsed)
    } else {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = last_lines(stderr.trim(), 5);
        let message = if detail.is_empty() {
            format!("exited with exit code {}", code)
        } else {
            format!("exited with exit code {}: {}", code, detail)
        };
        StepResult::failed(&step.name, elapsed, message)
    }
}

/// Keep only the tail of a command's stderr for the result record.
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
