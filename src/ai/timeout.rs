//! Timeout helpers
//!
//! Wraps provider futures in a wall-clock bound and maps expiry onto
//! `ForgeError::Timeout`.
//!
//! ```ignore
//! let output = with_timeout(
//!     Duration::from_secs(300),
//!     async { run_cli(prompt).await },
//!     "claude CLI",
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::constants::network as net_constants;
use crate::types::{ForgeError, Result};

/// Timeouts per call type
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Cloud HTTP requests (default: 5 minutes)
    pub http_request: Duration,
    /// One local CLI invocation (default: 5 minutes)
    pub local_cli: Duration,
    /// `<tool> --version` capability probe (default: 10 seconds)
    pub probe: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            http_request: Duration::from_secs(net_constants::DEFAULT_TIMEOUT_SECS),
            local_cli: Duration::from_secs(net_constants::LOCAL_CLI_TIMEOUT_SECS),
            probe: Duration::from_secs(net_constants::PROBE_TIMEOUT_SECS),
        }
    }
}

impl From<&Config> for TimeoutConfig {
    fn from(config: &Config) -> Self {
        Self {
            local_cli: Duration::from_secs(config.local.timeout_secs),
            ..Self::default()
        }
    }
}

/// Execute an async operation with a timeout
///
/// Returns `ForgeError::Timeout` if the operation doesn't complete in time.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(ForgeError::timeout(operation_name, timeout)),
    }
}

/// Like [`with_timeout`] for futures that don't return a `Result`
pub async fn with_timeout_map<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| ForgeError::timeout(operation_name, timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_config_defaults() {
        let config = TimeoutConfig::default();
        assert_eq!(config.http_request.as_secs(), 300);
        assert_eq!(config.local_cli.as_secs(), 300);
        assert!(config.probe < config.local_cli);
    }

    #[test]
    fn test_timeout_config_from_config() {
        let mut config = Config::default();
        config.local.timeout_secs = 42;
        let timeouts = TimeoutConfig::from(&config);
        assert_eq!(timeouts.local_cli, Duration::from_secs(42));
        assert_eq!(timeouts.probe, TimeoutConfig::default().probe);
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, ForgeError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, ForgeError>(42)
            },
            "slow operation",
        )
        .await;
        assert!(matches!(result.unwrap_err(), ForgeError::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_map_expires() {
        let result = with_timeout_map(
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_secs(1)),
            "sleep",
        )
        .await;
        assert!(matches!(result, Err(ForgeError::Timeout { .. })));
    }
}
