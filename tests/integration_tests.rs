//! Integration tests for feedpilot
//!
//! These tests drive the binary end-to-end: manifest execution, gate exit
//! codes, quota evaluation, and the analyzer.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a feedpilot Command
fn feedpilot() -> Command {
    cargo_bin_cmd!("feedpilot")
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

fn write_manifest(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let data_dir = dir.path().join(".feedpilot");
    fs::create_dir_all(&data_dir).unwrap();
    let path = data_dir.join("pipeline.json");
    fs::write(&path, content).unwrap();
    path
}

fn read_result(dir: &TempDir) -> serde_json::Value {
    let content = fs::read_to_string(dir.path().join(".feedpilot/pipeline-result.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        feedpilot().arg("--help").assert().success();
    }

    #[test]
    fn test_version() {
        feedpilot().arg("--version").assert().success();
    }

    #[test]
    fn test_status_without_run() {
        let dir = create_temp_project();
        feedpilot()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No pipeline run recorded yet"));
    }
}

// =============================================================================
// Pipeline Runner Tests
// =============================================================================

mod runner {
    use super::*;

    #[test]
    fn test_required_failure_fails_gate_and_skips_second_phase() {
        let dir = create_temp_project();
        write_manifest(
            &dir,
            r#"{
                "phases": [
                    {
                        "name": "first",
                        "parallel": false,
                        "steps": [
                            {
                                "name": "fetch-events",
                                "command": "echo 'fetch failed: network unreachable' >&2; exit 1",
                                "errorPolicy": "required"
                            }
                        ]
                    },
                    {
                        "name": "second",
                        "parallel": false,
                        "steps": [
                            {"name": "publish", "command": "true", "errorPolicy": "continue"}
                        ]
                    }
                ]
            }"#,
        );

        feedpilot()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .failure()
            .code(1);

        let result = read_result(&dir);
        assert_eq!(result["gate"], "fail");
        assert_eq!(result["phases"]["first"]["abortedBy"], "fetch-events");
        assert_eq!(result["phases"]["second"]["status"], "skipped");
        assert_eq!(result["summary"]["failed"], 1);

        let step = &result["phases"]["first"]["steps"][0];
        assert_eq!(step["errorCategory"], "network");
    }

    #[test]
    fn test_passing_run_exits_zero() {
        let dir = create_temp_project();
        write_manifest(
            &dir,
            r#"{
                "phases": [
                    {
                        "name": "fetch",
                        "parallel": true,
                        "steps": [
                            {"name": "a", "command": "true", "errorPolicy": "continue"},
                            {"name": "b", "command": "true", "errorPolicy": "required"}
                        ]
                    }
                ]
            }"#,
        );

        feedpilot()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .success();

        let result = read_result(&dir);
        assert_eq!(result["gate"], "pass");
        assert_eq!(result["summary"]["success"], 2);
    }

    #[test]
    fn test_invalid_manifest_refuses_to_run() {
        let dir = create_temp_project();
        write_manifest(
            &dir,
            r#"{
                "phases": [
                    {
                        "name": "fetch",
                        "steps": [
                            {"name": "a", "command": "true", "errorPolicy": "maybe"}
                        ]
                    }
                ]
            }"#,
        );

        feedpilot()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("maybe"));

        // Nothing was executed: no result file was written.
        assert!(!dir.path().join(".feedpilot/pipeline-result.json").exists());
    }

    #[test]
    fn test_run_respects_persisted_quota_tier() {
        let dir = create_temp_project();
        write_manifest(
            &dir,
            r#"{
                "phases": [
                    {
                        "name": "enrich",
                        "parallel": false,
                        "steps": [
                            {
                                "name": "ai-preview",
                                "command": "true",
                                "quotaPriority": 3,
                                "errorPolicy": "continue"
                            }
                        ]
                    }
                ]
            }"#,
        );
        fs::write(
            dir.path().join(".feedpilot/quota-status.json"),
            r#"{
                "probedAt": "2026-08-29T08:00:00Z",
                "quota": {"fiveHour": 95.0, "sevenDay": 40.0},
                "evaluation": {
                    "tier": 3,
                    "tierName": "critical",
                    "maxPriority": 1,
                    "model": "claude-haiku",
                    "constrained": true,
                    "reason": "utilization 5h=95% 7d=40%, binding 95%"
                },
                "tiers": []
            }"#,
        )
        .unwrap();

        feedpilot()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .success();

        let result = read_result(&dir);
        let step = &result["phases"]["enrich"]["steps"][0];
        assert_eq!(step["status"], "skipped");
        assert!(step["reason"].as_str().unwrap().contains("critical"));
    }
}

// =============================================================================
// Quota Governor Tests
// =============================================================================

mod quota {
    use super::*;

    #[test]
    fn test_quota_no_probe_defaults_to_green() {
        let dir = create_temp_project();

        feedpilot()
            .current_dir(dir.path())
            .args(["quota", "--no-probe"])
            .assert()
            .success()
            .stdout(predicate::str::contains("tier=0"))
            .stdout(predicate::str::contains("tierName=green"))
            .stdout(predicate::str::contains("maxPriority=3"));

        let content =
            fs::read_to_string(dir.path().join(".feedpilot/quota-status.json")).unwrap();
        let status: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(status["evaluation"]["tier"], 0);
        assert!(status["quota"].is_null());
        assert_eq!(status["tiers"].as_array().unwrap().len(), 4);
    }
}

// =============================================================================
// Pattern Analyzer Tests
// =============================================================================

mod analyzer {
    use super::*;

    #[test]
    fn test_analyze_empty_project() {
        let dir = create_temp_project();

        feedpilot()
            .current_dir(dir.path())
            .arg("analyze")
            .assert()
            .success()
            .stdout(predicate::str::contains("no patterns detected"));

        assert!(dir.path().join(".feedpilot/pattern-report.json").exists());
    }

    #[test]
    fn test_analyze_accumulates_issue_history_across_runs() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".feedpilot")).unwrap();
        fs::write(
            dir.path().join(".feedpilot/health-report.json"),
            r#"{"issues": [{"code": "STALE_STANDINGS", "severity": "warning", "message": "standings stale"}]}"#,
        )
        .unwrap();

        feedpilot()
            .current_dir(dir.path())
            .arg("analyze")
            .assert()
            .success();
        feedpilot()
            .current_dir(dir.path())
            .arg("analyze")
            .assert()
            .success();

        let content =
            fs::read_to_string(dir.path().join(".feedpilot/pattern-report.json")).unwrap();
        let report: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(report["issueCodeHistory"]["STALE_STANDINGS"]["count"], 2);
        // A fresh scan records an architecture baseline every run.
        assert!(report["architectureBaseline"].is_object());
    }
}
