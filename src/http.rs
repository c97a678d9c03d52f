// =============================================================================
// Shared HTTP client
// =============================================================================
//
// One `reqwest::Client` serves every request of a run.  Relaxed certificate
// verification is a setting of this client only, never a process-wide switch.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::runtime_config::RuntimeConfig;

/// Build the client used for the constituent page and the chart API.
pub fn build_client(config: &RuntimeConfig) -> Result<reqwest::Client> {
    if config.accept_invalid_certs {
        warn!("TLS certificate verification DISABLED for this run's HTTP client");
    }

    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()
        .context("failed to build reqwest client")?;

    debug!(
        timeout_secs = config.request_timeout_secs,
        accept_invalid_certs = config.accept_invalid_certs,
        "HTTP client initialised"
    );

    Ok(client)
}
