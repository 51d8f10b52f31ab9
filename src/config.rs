//! Runtime configuration for feedpilot.
//!
//! `Config` resolves every well-known artifact path under the project's
//! `.feedpilot/` data directory and layers optional overrides from a
//! `feedpilot.toml` file at the project root.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::patterns::architecture::ArchitectureThresholds;

/// Default per-step deadline when a step does not override it.
const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;

/// Runtime configuration: resolved paths plus tunable thresholds.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    /// `.feedpilot/` under the project dir; all artifacts live here
    pub data_dir: PathBuf,
    /// Manifest read by `run` (default `.feedpilot/pipeline.json`)
    pub manifest_file: PathBuf,
    /// Pipeline result, fully overwritten each run
    pub result_file: PathBuf,
    /// Last quota decision, readable by child-process steps
    pub quota_file: PathBuf,
    /// Pattern report, read-modify-written each analyzer run
    pub report_file: PathBuf,
    /// Diagnostic snapshot left behind by pipeline steps
    pub health_file: PathBuf,
    /// Quality metric time series left behind by pipeline steps
    pub quality_file: PathBuf,
    /// Feedback-loop score series
    pub loops_file: PathBuf,
    /// Corrective hints emitted per run
    pub hints_file: PathBuf,
    /// Autopilot task run log
    pub tasks_file: PathBuf,
    pub default_step_timeout: Duration,
    pub architecture: ArchitectureThresholds,
    pub verbose: bool,
}

/// On-disk override file (`feedpilot.toml`), all sections optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    pipeline: PipelineSection,
    #[serde(default)]
    architecture: Option<ArchitectureThresholds>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PipelineSection {
    default_step_timeout_secs: Option<u64>,
}

impl Config {
    /// Resolve configuration for a project directory.
    ///
    /// Reads `feedpilot.toml` if present; a missing file means defaults, a
    /// malformed file is an error (silent fallback would hide typos).
    pub fn new(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;

        let file_config = Self::load_file_config(&project_dir)?;
        let data_dir = project_dir.join(".feedpilot");

        let timeout_secs = file_config
            .pipeline
            .default_step_timeout_secs
            .unwrap_or(DEFAULT_STEP_TIMEOUT_SECS);

        Ok(Self {
            manifest_file: data_dir.join("pipeline.json"),
            result_file: data_dir.join("pipeline-result.json"),
            quota_file: data_dir.join("quota-status.json"),
            report_file: data_dir.join("pattern-report.json"),
            health_file: data_dir.join("health-report.json"),
            quality_file: data_dir.join("quality-history.json"),
            loops_file: data_dir.join("loop-history.json"),
            hints_file: data_dir.join("hint-history.json"),
            tasks_file: data_dir.join("task-log.json"),
            data_dir,
            project_dir,
            default_step_timeout: Duration::from_secs(timeout_secs),
            architecture: file_config.architecture.unwrap_or_default(),
            verbose,
        })
    }

    fn load_file_config(project_dir: &Path) -> Result<FileConfig> {
        let path = project_dir.join("feedpilot.toml");
        if !path.exists() {
            return Ok(FileConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("Failed to create data directory {}", self.data_dir.display())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf(), false).unwrap();

        assert!(config.data_dir.ends_with(".feedpilot"));
        assert!(config.result_file.ends_with("pipeline-result.json"));
        assert_eq!(config.default_step_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_config_reads_toml_overrides() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("feedpilot.toml"),
            r#"
[pipeline]
default_step_timeout_secs = 60

[architecture]
max_modules = 40
max_avg_module_lines = 250
min_test_ratio = 0.5
"#,
        )
        .unwrap();

        let config = Config::new(dir.path().to_path_buf(), false).unwrap();
        assert_eq!(config.default_step_timeout, Duration::from_secs(60));
        assert_eq!(config.architecture.max_modules, 40);
        assert_eq!(config.architecture.min_test_ratio, 0.5);
    }

    #[test]
    fn test_config_malformed_toml_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("feedpilot.toml"), "not [valid").unwrap();
        assert!(Config::new(dir.path().to_path_buf(), false).is_err());
    }

    #[test]
    fn test_ensure_data_dir() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf(), false).unwrap();
        config.ensure_data_dir().unwrap();
        assert!(config.data_dir.exists());
    }
}
