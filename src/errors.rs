//! Typed error hierarchy for the feedpilot control loop.
//!
//! Two top-level enums cover the failures that are genuinely exceptional:
//! - `ManifestError` — a manifest that must never be partially executed
//! - `QuotaError` — probe-call failures (callers degrade these to "no data")
//!
//! Step failures are deliberately NOT represented here: a failing step is
//! recorded as a `StepResult` and flows through the run as data.

use thiserror::Error;

/// Errors raised while loading or validating a pipeline manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest at {}: {source}", .path.display())]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest at {}: {source}", .path.display())]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Structural validation failed. Every defect found is listed, not just
    /// the first one.
    #[error("Invalid manifest ({} defect(s)):\n{}", .defects.len(), .defects.join("\n"))]
    Invalid { defects: Vec<String> },
}

/// Errors from the quota probe call.
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("No API credential found (set ANTHROPIC_API_KEY)")]
    MissingCredential,

    #[error("Probe request failed: {0}")]
    Probe(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_error_invalid_lists_every_defect() {
        let err = ManifestError::Invalid {
            defects: vec![
                "phase 0 step 1: missing command".to_string(),
                "phase 1 step 0: invalid errorPolicy \"maybe\"".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 defect(s)"));
        assert!(msg.contains("missing command"));
        assert!(msg.contains("maybe"));
    }

    #[test]
    fn manifest_error_read_carries_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = ManifestError::Read {
            path: std::path::PathBuf::from("/tmp/pipeline.json"),
            source: io_err,
        };
        match &err {
            ManifestError::Read { path, source } => {
                assert_eq!(path, &std::path::PathBuf::from("/tmp/pipeline.json"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected Read variant"),
        }
    }

    #[test]
    fn quota_error_missing_credential_names_env_var() {
        let err = QuotaError::MissingCredential;
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ManifestError::Invalid { defects: vec![] });
        assert_std_error(&QuotaError::MissingCredential);
    }
}
