//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/bookforge/config.toml)
//! 3. Project config (.bookforge/config.toml)
//! 4. Environment variables (BOOKFORGE_*)
//!
//! Provider credentials never come from files; see [`Credentials::from_env`].

mod credentials;
mod loader;
mod types;

pub use credentials::{
    Credentials, PrimaryCredentials, ResearchCredentials, RuntimeEnvironment,
    SecondaryCredentials, mask_key,
};
pub use loader::ConfigLoader;
pub use types::*;
