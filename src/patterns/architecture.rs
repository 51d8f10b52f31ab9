//! Architectural-fitness detector: static metrics over the pipeline's own
//! source tree, compared against thresholds and the previous baseline.

use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

use super::{Pattern, PatternDetails, Severity};

/// File extensions counted as code modules.
const CODE_EXTENSIONS: &[&str] = &["js", "mjs", "ts", "py", "rs", "sh"];
/// Directories never descended into.
const SKIP_DIRS: &[&str] = &["node_modules", "target", "dist", "vendor"];

fn default_max_modules() -> usize {
    80
}
fn default_max_avg_module_lines() -> f64 {
    400.0
}
fn default_min_test_ratio() -> f64 {
    0.3
}

/// Configurable fitness thresholds (`[architecture]` in feedpilot.toml).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchitectureThresholds {
    #[serde(default = "default_max_modules")]
    pub max_modules: usize,
    #[serde(default = "default_max_avg_module_lines")]
    pub max_avg_module_lines: f64,
    #[serde(default = "default_min_test_ratio")]
    pub min_test_ratio: f64,
}

impl Default for ArchitectureThresholds {
    fn default() -> Self {
        Self {
            max_modules: default_max_modules(),
            max_avg_module_lines: default_max_avg_module_lines(),
            min_test_ratio: default_min_test_ratio(),
        }
    }
}

/// Snapshot of the tree's shape, persisted for run-over-run comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureBaseline {
    pub module_count: usize,
    pub avg_module_lines: f64,
    pub test_file_count: usize,
    /// test files / source modules
    pub test_ratio: f64,
    /// Step count from the pipeline manifest
    pub step_count: usize,
}

/// Run-over-run change against the recorded baseline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaselineDelta {
    pub module_count: i64,
    pub avg_module_lines: f64,
    pub test_ratio: f64,
    pub step_count: i64,
}

/// Walk the project tree and measure its shape.
pub fn scan_architecture(project_dir: &Path, step_count: usize) -> ArchitectureBaseline {
    let mut module_count = 0usize;
    let mut total_lines = 0usize;
    let mut test_file_count = 0usize;

    let walker = WalkDir::new(project_dir).into_iter().filter_entry(|e| {
        let name = e.file_name().to_string_lossy();
        !(name.starts_with('.') && e.depth() > 0) && !SKIP_DIRS.contains(&name.as_ref())
    });

    for entry in walker.flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !CODE_EXTENSIONS.contains(&ext) {
            continue;
        }

        let lines = std::fs::read_to_string(path)
            .map(|content| content.lines().count())
            .unwrap_or(0);

        if is_test_file(path) {
            test_file_count += 1;
        } else {
            module_count += 1;
            total_lines += lines;
        }
    }

    let avg_module_lines = if module_count > 0 {
        total_lines as f64 / module_count as f64
    } else {
        0.0
    };
    let test_ratio = if module_count > 0 {
        test_file_count as f64 / module_count as f64
    } else {
        0.0
    };

    ArchitectureBaseline {
        module_count,
        avg_module_lines,
        test_file_count,
        test_ratio,
        step_count,
    }
}

fn is_test_file(path: &Path) -> bool {
    let in_test_dir = path.components().any(|c| {
        matches!(
            c.as_os_str().to_string_lossy().as_ref(),
            "test" | "tests" | "__tests__"
        )
    });
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    in_test_dir || name.ends_with("_test") || name.ends_with(".test") || name.ends_with(".spec")
}

/// Compare the fresh scan against thresholds and the prior baseline.
pub fn detect_architecture_drift(
    current: &ArchitectureBaseline,
    thresholds: &ArchitectureThresholds,
    prior: Option<&ArchitectureBaseline>,
) -> (Vec<Pattern>, Option<BaselineDelta>) {
    let mut findings = Vec::new();

    if current.module_count > thresholds.max_modules {
        findings.push(Pattern {
            severity: Severity::Low,
            details: PatternDetails::ArchitectureDrift {
                area: "module_count".to_string(),
                value: current.module_count as f64,
                threshold: thresholds.max_modules as f64,
            },
            suggestion: format!(
                "{} modules exceeds the {} ceiling; consolidate or split the pipeline",
                current.module_count, thresholds.max_modules
            ),
        });
    }

    if current.avg_module_lines > thresholds.max_avg_module_lines {
        findings.push(Pattern {
            severity: Severity::Low,
            details: PatternDetails::ArchitectureDrift {
                area: "avg_module_lines".to_string(),
                value: current.avg_module_lines,
                threshold: thresholds.max_avg_module_lines,
            },
            suggestion: format!(
                "average module size {:.0} lines exceeds {:.0}; the biggest modules are due a split",
                current.avg_module_lines, thresholds.max_avg_module_lines
            ),
        });
    }

    if current.module_count > 0 && current.test_ratio < thresholds.min_test_ratio {
        findings.push(Pattern {
            severity: Severity::Low,
            details: PatternDetails::ArchitectureDrift {
                area: "test_ratio".to_string(),
                value: current.test_ratio,
                threshold: thresholds.min_test_ratio,
            },
            suggestion: format!(
                "test-to-source ratio {:.2} is below {:.2}; recent modules are landing untested",
                current.test_ratio, thresholds.min_test_ratio
            ),
        });
    }

    let delta = prior.map(|prior| BaselineDelta {
        module_count: current.module_count as i64 - prior.module_count as i64,
        avg_module_lines: current.avg_module_lines - prior.avg_module_lines,
        test_ratio: current.test_ratio - prior.test_ratio,
        step_count: current.step_count as i64 - prior.step_count as i64,
    });

    (findings, delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, rel: &str, lines: usize) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "x\n".repeat(lines)).unwrap();
    }

    #[test]
    fn test_scan_counts_modules_and_tests() {
        let dir = tempdir().unwrap();
        write(dir.path(), "scripts/fetch.js", 100);
        write(dir.path(), "scripts/enrich.js", 200);
        write(dir.path(), "tests/fetch_test.js", 50);
        write(dir.path(), "README.md", 10);
        write(dir.path(), "node_modules/pkg/index.js", 5000);

        let baseline = scan_architecture(dir.path(), 7);
        assert_eq!(baseline.module_count, 2);
        assert_eq!(baseline.test_file_count, 1);
        assert_eq!(baseline.avg_module_lines, 150.0);
        assert_eq!(baseline.test_ratio, 0.5);
        assert_eq!(baseline.step_count, 7);
    }

    #[test]
    fn test_is_test_file() {
        assert!(is_test_file(Path::new("tests/foo.js")));
        assert!(is_test_file(Path::new("src/parser_test.rs")));
        assert!(is_test_file(Path::new("src/parser.test.ts")));
        assert!(!is_test_file(Path::new("src/parser.rs")));
    }

    #[test]
    fn test_drift_threshold_violations() {
        let current = ArchitectureBaseline {
            module_count: 90,
            avg_module_lines: 500.0,
            test_file_count: 4,
            test_ratio: 0.04,
            step_count: 10,
        };

        let (findings, delta) =
            detect_architecture_drift(&current, &ArchitectureThresholds::default(), None);
        assert_eq!(findings.len(), 3);
        assert!(findings.iter().all(|f| f.severity == Severity::Low));
        assert!(delta.is_none());
    }

    #[test]
    fn test_drift_delta_against_prior() {
        let prior = ArchitectureBaseline {
            module_count: 40,
            avg_module_lines: 200.0,
            test_file_count: 20,
            test_ratio: 0.5,
            step_count: 8,
        };
        let current = ArchitectureBaseline {
            module_count: 44,
            avg_module_lines: 210.0,
            test_file_count: 20,
            test_ratio: 0.45,
            step_count: 9,
        };

        let (findings, delta) = detect_architecture_drift(
            &current,
            &ArchitectureThresholds::default(),
            Some(&prior),
        );
        assert!(findings.is_empty());
        let delta = delta.unwrap();
        assert_eq!(delta.module_count, 4);
        assert_eq!(delta.step_count, 1);
        assert!((delta.test_ratio + 0.05).abs() < 1e-9);
    }
}
