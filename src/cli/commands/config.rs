//! Config Command
//!
//! Manage BookForge configuration.
//!
//! Usage:
//!   bookforge config show [-f toml|json|yaml]
//!   bookforge config path
//!   bookforge config init [-g] [--force]

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged effective configuration
pub fn show(format: &str) -> Result<()> {
    let config = ConfigLoader::load()?;
    ConfigLoader::show_config(&config, format)
}

/// Show configuration and data paths
pub fn path() -> Result<()> {
    let config = ConfigLoader::load()?;
    ConfigLoader::show_path(&config);
    Ok(())
}

pub fn init(global: bool, force: bool) -> Result<()> {
    let path = if global {
        ConfigLoader::init_global(force)?
    } else {
        ConfigLoader::init_project(force)?
    };

    let scope = if global { "global" } else { "project" };
    Output::new().success(&format!("Initialized {} configuration", scope));
    println!("  Config: {}", path.display());
    println!("  API keys are read from the environment, never from this file.");
    Ok(())
}
