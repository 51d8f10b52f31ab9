//! The quota probe: a minimal paid API call made only to read the
//! provider's rate-limit headers.
//!
//! The probe has a short timeout of its own and never blocks the rest of
//! the pipeline: callers degrade any failure to "no data", which the
//! governor evaluates to the permissive green tier.

use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{QuotaSnapshot, parse_utilization};
use crate::errors::QuotaError;

const PROBE_URL: &str = "https://api.anthropic.com/v1/messages";
const PROBE_MODEL: &str = "claude-haiku-4-5";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Shorter than any step deadline; the probe must never stall a run.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Read the API credential from the environment.
pub fn api_key_from_env() -> Result<String, QuotaError> {
    std::env::var("ANTHROPIC_API_KEY")
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or(QuotaError::MissingCredential)
}

/// Make the probe call and extract a quota snapshot from the response
/// headers. A non-2xx response yields `Ok(None)` ("no data"); transport
/// failures surface as `QuotaError::Probe` so the caller can log them
/// before degrading.
pub async fn probe(api_key: &str) -> Result<Option<QuotaSnapshot>, QuotaError> {
    let client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()?;

    let body = json!({
        "model": PROBE_MODEL,
        "max_tokens": 1,
        "messages": [{"role": "user", "content": "ping"}],
    });

    let response = client
        .post(PROBE_URL)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        warn!(status = %response.status(), "quota probe returned non-success, treating as no data");
        return Ok(None);
    }

    let snapshot = parse_utilization(response.headers());
    debug!(?snapshot, "quota probe completed");
    Ok(snapshot)
}
