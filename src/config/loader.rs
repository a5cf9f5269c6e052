//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/bookforge/config.toml)
//! 3. Project config (.bookforge/config.toml)
//! 4. Environment variables (BOOKFORGE_* prefix, nested with `__`)

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{ForgeError, Result};

/// Credential variables share the prefix but never land in `Config`
const SECRET_ENV_KEYS: &[&str] = &["PRIMARY_API_KEY", "SECONDARY_API_KEY", "RESEARCH_API_KEY"];

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // BOOKFORGE_PRIMARY__REGION -> primary.region
        figment = figment.merge(
            Env::prefixed("BOOKFORGE_")
                .ignore(SECRET_ENV_KEYS)
                .split("__")
                .lowercase(true),
        );

        let config: Config = figment
            .extract()
            .map_err(|e| ForgeError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| ForgeError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/bookforge/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("bookforge"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(".bookforge")
    }

    /// Directory holding book snapshots
    ///
    /// Configured `storage.data_dir` wins, then the platform data directory.
    pub fn data_dir(config: &Config) -> Result<PathBuf> {
        if let Some(dir) = &config.storage.data_dir {
            return Ok(dir.clone());
        }
        ProjectDirs::from("", "", "bookforge")
            .map(|dirs| dirs.data_dir().join("books"))
            .ok_or_else(|| ForgeError::Config("Cannot determine data directory".to_string()))
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path(config: &Config) {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());

        if let Ok(data) = Self::data_dir(config) {
            let exists = if data.exists() { "✓" } else { "✗" };
            println!("  Books:   {} {}", exists, data.display());
        }
    }

    /// Show current effective configuration as `toml`, `json` or `yaml`
    pub fn show_config(config: &Config, format: &str) -> Result<()> {
        println!("{}", Self::render(config, format)?);
        Ok(())
    }

    fn render(config: &Config, format: &str) -> Result<String> {
        match format {
            "json" => Ok(serde_json::to_string_pretty(config)?),
            "yaml" => serde_yaml::to_string(config).map_err(|e| ForgeError::Config(e.to_string())),
            "toml" => toml::to_string_pretty(config).map_err(|e| ForgeError::Config(e.to_string())),
            other => Err(ForgeError::InvalidInput(format!(
                "Unknown format '{}'. Valid values: toml, json, yaml",
                other
            ))),
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            ForgeError::Config("Cannot determine global config directory".to_string())
        })?;
        Self::write_default(&global_dir, force)
    }

    /// Initialize project configuration in the working directory
    pub fn init_project(force: bool) -> Result<PathBuf> {
        Self::write_default(&Self::project_dir(), force)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn write_default(dir: &Path, force: bool) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let config_path = dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config())?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Default config content (TOML)
    fn default_config() -> String {
        r#"# Bookforge Configuration
# API keys are read from the environment only:
#   BOOKFORGE_PRIMARY_API_KEY   (or AWS_BEARER_TOKEN_BEDROCK)
#   BOOKFORGE_SECONDARY_API_KEY (or OPENAI_API_KEY)
#   BOOKFORGE_RESEARCH_API_KEY  (or PERPLEXITY_API_KEY)

version = "1.0"

[primary]
region = "us-east-1"
model = "anthropic.claude-3-5-sonnet-20240620-v1:0"
image_model = "amazon.titan-image-generator-v2:0"

[secondary]
api_base = "https://api.openai.com/v1"
model = "gpt-4o"

# Local CLI generation (claude / gemini)
[local]
enabled = false
timeout_secs = 300

[pipeline]
pacing_ms = 1000
research_pacing_ms = 2000

[retry]
max_retries = 3
base_delay_ms = 1000
"#
        .to_string()
    }
}
