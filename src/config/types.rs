//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/bookforge/) and project (.bookforge/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ai::provider::{LocalTool, RetryPolicy};
use crate::constants::{generation, network, pipeline, retry};
use crate::types::{ForgeError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Primary cloud provider (Bedrock runtime)
    pub primary: PrimaryConfig,

    /// Secondary cloud provider (OpenAI-compatible)
    pub secondary: SecondaryConfig,

    /// Local CLI provider
    pub local: LocalConfig,

    /// Research collaborator
    pub research: ResearchConfig,

    /// Pipeline pacing
    pub pipeline: PipelineSettings,

    /// Rate-limit backoff
    pub retry: RetrySettings,

    /// Snapshot storage
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            primary: PrimaryConfig::default(),
            secondary: SecondaryConfig::default(),
            local: LocalConfig::default(),
            research: ResearchConfig::default(),
            pipeline: PipelineSettings::default(),
            retry: RetrySettings::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `ForgeError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.primary.region.trim().is_empty() {
            return Err(ForgeError::Config(
                "primary.region must not be empty".to_string(),
            ));
        }

        for (name, secs) in [
            ("primary.timeout_secs", self.primary.timeout_secs),
            ("secondary.timeout_secs", self.secondary.timeout_secs),
            ("local.timeout_secs", self.local.timeout_secs),
        ] {
            if secs == 0 {
                return Err(ForgeError::Config(format!("{} must be greater than 0", name)));
            }
        }

        if self.primary.max_tokens == 0 || self.secondary.max_tokens == 0 {
            return Err(ForgeError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if !self.secondary.api_base.starts_with("http") {
            return Err(ForgeError::Config(format!(
                "secondary.api_base must be an http(s) URL, got {}",
                self.secondary.api_base
            )));
        }

        if self.retry.max_retries > 10 {
            return Err(ForgeError::Config(format!(
                "retry.max_retries must be at most 10, got {}",
                self.retry.max_retries
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Provider Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryConfig {
    /// AWS region hosting the Bedrock runtime
    pub region: String,

    /// Text model id
    pub model: String,

    /// Image model id
    pub image_model: String,

    pub max_tokens: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            model: "anthropic.claude-3-5-sonnet-20240620-v1:0".to_string(),
            image_model: "amazon.titan-image-generator-v2:0".to_string(),
            max_tokens: generation::DEFAULT_MAX_TOKENS,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryConfig {
    /// OpenAI-compatible API base URL
    pub api_base: String,

    pub model: String,

    pub image_model: String,

    pub max_tokens: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            image_model: "dall-e-3".to_string(),
            max_tokens: generation::DEFAULT_MAX_TOKENS,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Local mode preference (only honored where local CLIs are supported)
    pub enabled: bool,

    /// Wall-clock bound on one CLI invocation
    pub timeout_secs: u64,

    /// Tool to use when both are installed
    pub preferred_tool: Option<LocalTool>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: network::LOCAL_CLI_TIMEOUT_SECS,
            preferred_tool: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub api_base: String,
    pub model: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.perplexity.ai".to_string(),
            model: "sonar".to_string(),
        }
    }
}

// =============================================================================
// Pipeline & Retry
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Pause after each section (milliseconds)
    pub pacing_ms: u64,

    /// Pause after each researched section (milliseconds)
    pub research_pacing_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            pacing_ms: pipeline::PACING_MS,
            research_pacing_ms: pipeline::RESEARCH_PACING_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: usize,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: retry::MAX_RETRIES,
            base_delay_ms: retry::BASE_DELAY_MS,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
    }
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot directory; platform data dir when unset
    pub data_dir: Option<PathBuf>,
}

// =============================================================================
// Tests
// =============================================================================
