//! CLI Common Utilities
//!
//! Shared context and signal wiring for command handlers.

use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::ai::{CancellationToken, ServiceRouter};
use crate::config::{Config, ConfigLoader, Credentials, RuntimeEnvironment};
use crate::pipeline::PipelineConfig;
use crate::storage::BookStore;
use crate::types::{Book, Result};

/// Exit code used when a second interrupt aborts an in-flight call
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Command execution context
///
/// Everything a generation command needs: merged configuration,
/// credentials from the environment, platform flags and the snapshot store.
pub struct CommandContext {
    pub config: Config,
    pub credentials: Credentials,
    pub environment: RuntimeEnvironment,
    pub store: BookStore,
}

impl CommandContext {
    pub fn load() -> Result<Self> {
        let config = ConfigLoader::load()?;
        let store = BookStore::open(ConfigLoader::data_dir(&config)?)?;
        Ok(Self {
            credentials: Credentials::from_env(),
            environment: RuntimeEnvironment::detect(&config),
            config,
            store,
        })
    }

    pub fn router(&self) -> Arc<ServiceRouter> {
        Arc::new(ServiceRouter::from_config(&self.config))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::from(&self.config.pipeline)
    }

    /// Progress callback that persists every snapshot and prints a progress line
    ///
    /// Save failures are logged and generation continues; the next snapshot
    /// overwrites the file anyway.
    pub fn persist_snapshots(&self, quiet: bool) -> impl FnMut(&Book) + '_ {
        let output = super::ui::Output::new();
        move |book: &Book| {
            if let Err(e) = self.store.save(book) {
                warn!(book = %book.id, error = %e, "Failed to save snapshot");
            }
            if !quiet {
                output.progress(book);
            }
        }
    }
}

pub fn runtime() -> Result<Runtime> {
    Ok(Runtime::new()?)
}

/// Cancel `token` on the first Ctrl-C; a second Ctrl-C exits immediately
///
/// Must be called from within a tokio runtime. Abort the returned handle once
/// the guarded work is finished.
pub fn cancel_on_ctrl_c(token: &CancellationToken) -> JoinHandle<()> {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, stopping after the current step (Ctrl-C again to abort)");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    })
}
