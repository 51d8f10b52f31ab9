//! Pipeline manifest definition and JSON loading.
//!
//! This module provides:
//! - `StepSpec` / `PhaseSpec` / `Manifest` mirroring the manifest file format
//! - `Manifest::load` which parses and structurally validates the file,
//!   collecting *every* defect before refusing to run
//!
//! A manifest that fails validation is never partially executed: validation
//! happens against the raw JSON before anything is typed, so an unknown
//! `errorPolicy` is reported as a named defect rather than a serde error.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::ManifestError;

/// How a step failure affects the rest of its phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Log the failure and keep running the remaining steps.
    #[default]
    Continue,
    /// Abort the rest of the phase and mark subsequent phases skipped.
    Required,
}

/// A single executable step within a phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepSpec {
    /// Step name, unique within its phase by convention
    pub name: String,
    /// Shell command executed via `sh -c`
    pub command: String,
    /// Per-step deadline in seconds (overrides the global default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Environment variables that must be set for this step to run
    #[serde(default)]
    pub requires: Vec<String>,
    /// Quota priority: 1 = essential … 3 = nice-to-have
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_priority: Option<u8>,
    /// What happens to the phase when this step fails
    pub error_policy: ErrorPolicy,
}

/// An ordered group of steps, run either in parallel or sequentially.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parallel: bool,
    pub steps: Vec<StepSpec>,
}

/// The full pipeline manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub phases: Vec<PhaseSpec>,
}

impl Manifest {
    /// Load and validate a manifest from a JSON file.
    ///
    /// Validation collects every structural defect (missing `name`/`command`,
    /// invalid `errorPolicy`) and fails with the complete list, so manifest
    /// authors fix one round of errors instead of playing whack-a-mole.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let raw: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let defects = validate_raw(&raw);
        if !defects.is_empty() {
            return Err(ManifestError::Invalid { defects });
        }

        serde_json::from_value(raw).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Total number of steps across all phases.
    pub fn step_count(&self) -> usize {
        self.phases.iter().map(|p| p.steps.len()).sum()
    }
}

/// Walk the raw JSON and collect every structural defect.
fn validate_raw(raw: &serde_json::Value) -> Vec<String> {
    let mut defects = Vec::new();

    let Some(phases) = raw.get("phases").and_then(|p| p.as_array()) else {
        defects.push("manifest: missing or non-array \"phases\"".to_string());
        return defects;
    };

    for (pi, phase) in phases.iter().enumerate() {
        let phase_label = match phase.get("name").and_then(|n| n.as_str()) {
            Some(name) if !name.trim().is_empty() => format!("phase \"{}\"", name),
            _ => {
                defects.push(format!("phase {}: missing name", pi));
                format!("phase {}", pi)
            }
        };

        let Some(steps) = phase.get("steps").and_then(|s| s.as_array()) else {
            defects.push(format!("{}: missing or non-array \"steps\"", phase_label));
            continue;
        };

        for (si, step) in steps.iter().enumerate() {
            let step_label = match step.get("name").and_then(|n| n.as_str()) {
                Some(name) if !name.trim().is_empty() => {
                    format!("{} step \"{}\"", phase_label, name)
                }
                _ => {
                    defects.push(format!("{} step {}: missing name", phase_label, si));
                    format!("{} step {}", phase_label, si)
                }
            };

            match step.get("command").and_then(|c| c.as_str()) {
                Some(cmd) if !cmd.trim().is_empty() => {}
                _ => defects.push(format!("{}: missing command", step_label)),
            }

            match step.get("errorPolicy").and_then(|e| e.as_str()) {
                Some("continue") | Some("required") => {}
                Some(other) => defects.push(format!(
                    "{}: invalid errorPolicy \"{}\" (expected \"continue\" or \"required\")",
                    step_label, other
                )),
                None => defects.push(format!(
                    "{}: missing errorPolicy (expected \"continue\" or \"required\")",
                    step_label
                )),
            }
        }
    }

    defects
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_manifest(dir: &Path, content: &str) -> std::path::PathBuf {
        let path = dir.join("pipeline.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_valid_manifest() {
        let dir = tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            r#"{
                "phases": [
                    {
                        "name": "fetch",
                        "description": "Pull upstream data",
                        "parallel": true,
                        "steps": [
                            {
                                "name": "fetch-events",
                                "command": "echo events",
                                "timeout": 120,
                                "errorPolicy": "required"
                            },
                            {
                                "name": "fetch-standings",
                                "command": "echo standings",
                                "requires": ["FEED_TOKEN"],
                                "quotaPriority": 2,
                                "errorPolicy": "continue"
                            }
                        ]
                    }
                ]
            }"#,
        );

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.phases.len(), 1);
        assert!(manifest.phases[0].parallel);
        assert_eq!(manifest.step_count(), 2);

        let step = &manifest.phases[0].steps[1];
        assert_eq!(step.requires, vec!["FEED_TOKEN".to_string()]);
        assert_eq!(step.quota_priority, Some(2));
        assert_eq!(step.error_policy, ErrorPolicy::Continue);
        assert_eq!(manifest.phases[0].steps[0].timeout, Some(120));
    }

    #[test]
    fn test_load_invalid_error_policy() {
        let dir = tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
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

        let err = Manifest::load(&path).unwrap_err();
        match err {
            ManifestError::Invalid { defects } => {
                assert_eq!(defects.len(), 1);
                assert!(defects[0].contains("maybe"));
            }
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_load_collects_all_defects() {
        let dir = tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            r#"{
                "phases": [
                    {
                        "steps": [
                            {"command": "true", "errorPolicy": "maybe"},
                            {"name": "b", "errorPolicy": "continue"}
                        ]
                    }
                ]
            }"#,
        );

        let err = Manifest::load(&path).unwrap_err();
        match err {
            ManifestError::Invalid { defects } => {
                // Missing phase name, missing step name, invalid policy,
                // missing command: all reported in one pass.
                assert_eq!(defects.len(), 4);
            }
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_error_policy_is_a_defect() {
        let dir = tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            r#"{"phases": [{"name": "p", "steps": [{"name": "a", "command": "true"}]}]}"#,
        );

        let err = Manifest::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing errorPolicy"));
    }

    #[test]
    fn test_load_not_found() {
        let result = Manifest::load(Path::new("/nonexistent/pipeline.json"));
        assert!(matches!(result, Err(ManifestError::Read { .. })));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = write_manifest(dir.path(), "{ invalid }");
        assert!(matches!(
            Manifest::load(&path),
            Err(ManifestError::Parse { .. })
        ));
    }
}
