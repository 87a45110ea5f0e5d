//! SSH reachability gate: configuration never runs against a host that does
//! not accept connections yet.

use crate::retry::{retry_until, RetryExhausted};
use engine::RetryPolicy;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::info;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll until a TCP connection to `address:port` succeeds.
pub async fn wait_for_port(
    address: &str,
    port: u16,
    policy: &RetryPolicy,
) -> Result<u32, RetryExhausted> {
    let target = format!("{}:{}", address, port);
    let operation = format!("tcp connect to {}", target);

    let attempt = retry_until(policy, &operation, || {
        let target = target.clone();
        async move {
            matches!(
                timeout(CONNECT_TIMEOUT, TcpStream::connect(&target)).await,
                Ok(Ok(_))
            )
        }
    })
    .await?;

    info!(addr = %target, attempt, "host is reachable");
    Ok(attempt)
}
