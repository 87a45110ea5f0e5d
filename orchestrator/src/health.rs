//! HTTP verification of a deployed endpoint.
//!
//! Exhausting the budget degrades confidence in the deployment but never
//! fails it; callers log a warning and keep the run's status.

use crate::retry::{retry_until, RetryExhausted};
use engine::RetryPolicy;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum HealthError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("{0}")]
    Exhausted(#[from] RetryExhausted),
}

/// Poll `url` until it answers with a success status. Returns the attempt
/// number that succeeded.
pub async fn verify(url: &str, policy: &RetryPolicy) -> Result<u32, HealthError> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    let operation = format!("http check of {}", url);
    let attempt = retry_until(policy, &operation, || {
        let client = client.clone();
        let url = url.to_string();
        async move {
            match client.get(&url).send().await {
                Ok(response) => response.status().is_success(),
                Err(_) => false,
            }
        }
    })
    .await?;

    info!(url, attempt, "endpoint is healthy");
    Ok(attempt)
}
