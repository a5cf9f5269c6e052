//! BookForge - Multi-Provider AI Book Generator
//!
//! Routes generation requests across a local CLI model and two cloud
//! providers, and drives a resumable, cancellable pipeline that fills in a
//! book's chapter outlines and section prose one node at a time.
//!
//! ## Core Features
//!
//! - **Service Router**: local CLI first when available, then primary and
//!   secondary cloud providers, with fallback on failure
//! - **Rate-Limit Retry**: exponential backoff on cloud rate limits only
//! - **Resumable Pipeline**: completed sections are skipped on re-run
//! - **Heat-Level Conversion**: derive a book at a different content intensity
//!
//! ## Quick Start
//!
//! ```ignore
//! use bookforge::{ConfigLoader, Credentials, GenerationPipeline, PipelineConfig};
//!
//! let config = ConfigLoader::load()?;
//! let router = Arc::new(ServiceRouter::from_config(&config));
//! let pipeline = GenerationPipeline::new(router, PipelineConfig::from(&config.pipeline));
//! pipeline
//!     .generate_all(&mut book, &Credentials::from_env(), &env, &mut |b| { let _ = store.save(b); }, &cancel)
//!     .await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: provider backends, routing, prompts, research, cancellation
//! - [`pipeline`]: whole-book generation and heat-level conversion
//! - [`config`]: layered configuration and credentials
//! - [`storage`]: JSON snapshot store used by the CLI
//! - [`types`]: book tree and error types

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod pipeline;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, Credentials, RuntimeEnvironment};

// Error Types
pub use types::error::{ErrorCategory, ForgeError, Result};

// Book Tree
pub use types::{Book, BookStatus, Chapter, HeatLevel, NodeStatus, Perspective, SubChapter};

// Storage
pub use storage::BookStore;

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{GenerationPipeline, HeatLevelConverter, PipelineConfig};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    CancellationToken, OutlineRequest, ProviderKind, ProviderRequest, ProviderResponse, Routed,
    ServiceRouter, TimeoutConfig, with_timeout,
};
