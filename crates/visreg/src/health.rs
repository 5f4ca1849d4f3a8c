//! HTTP reachability probe for the target site.

use crate::result::{VisregError, VisregResult};
use std::time::Duration;

/// Probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteHealth {
    /// HTTP status code
    pub status: u16,
}

impl SiteHealth {
    /// 2xx or 3xx
    #[must_use]
    pub const fn is_up(&self) -> bool {
        self.status >= 200 && self.status < 400
    }
}

/// GET the URL and report its status
pub async fn probe(url: &str, timeout: Duration) -> VisregResult<SiteHealth> {
    let navigation = |message: String| VisregError::Navigation {
        url: url.to_string(),
        message,
    };
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| navigation(e.to_string()))?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| navigation(e.to_string()))?;
    Ok(SiteHealth {
        status: response.status().as_u16(),
    })
}

/// Probe and log the outcome
pub async fn probe_logged(url: &str) -> Option<SiteHealth> {
    match probe(url, DEFAULT_PROBE_TIMEOUT).await {
        Ok(health) if health.is_up() => {
            tracing::info!(url, status = health.status, "site is up");
            Some(health)
        }
        Ok(health) => {
            tracing::warn!(url, status = health.status, "site answered with an error status");
            Some(health)
        }
        Err(e) => {
            tracing::warn!(url, error = %e, "site health check failed");
            None
        }
    }
}
