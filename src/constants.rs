//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Rate-limit retry constants
pub mod retry {
    /// Retries after the first attempt
    pub const MAX_RETRIES: usize = 3;

    /// Delay before the first retry (milliseconds)
    pub const BASE_DELAY_MS: u64 = 1000;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;
}

/// Generation pipeline constants
pub mod pipeline {
    /// Pause between section content calls (milliseconds)
    pub const PACING_MS: u64 = 1000;

    /// Pause between sections when each one also does a research call (milliseconds)
    pub const RESEARCH_PACING_MS: u64 = 2000;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Wall-clock bound on one local CLI invocation (seconds)
    pub const LOCAL_CLI_TIMEOUT_SECS: u64 = 300;

    /// Bound on a capability probe (`<tool> --version`) (seconds)
    pub const PROBE_TIMEOUT_SECS: u64 = 10;
}

/// Generation limits
pub mod generation {
    /// Maximum output tokens for text calls
    pub const DEFAULT_MAX_TOKENS: usize = 4096;

    /// Target words per generated section
    pub const SECTION_WORDS: &str = "1500-2500";

    /// Section count requested per chapter outline
    pub const SECTIONS_PER_CHAPTER: &str = "3-6";
}
