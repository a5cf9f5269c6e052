//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Provides error classification for retry and fallback decisions.
//!
//! ## Error Categories
//!
//! - **RateLimit**: API throttling (backoff and retry the same provider)
//! - **Auth**: Authentication failures (fail fast)
//! - **Network**: Connectivity issues
//! - **Unavailable**: Provider or tool unavailable
//! - **ParseError**: Response could not be decoded
//!
//! Only `RateLimit` is retried inside a provider adapter. Everything else is
//! either surfaced directly or handed to the router for provider fallback.

use std::time::Duration;
use thiserror::Error;

use crate::ai::provider::{OperationKind, ProviderKind};

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories used for retry and fallback decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - back off then retry same provider
    RateLimit,
    /// Authentication failed
    Auth,
    /// Network/connectivity issues
    Network,
    /// Provider unavailable (5xx, missing tool)
    Unavailable,
    /// Invalid request
    BadRequest,
    /// Decoding the provider response failed
    ParseError,
    /// Temporary server issues
    Transient,
    /// Unknown error
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Provider failure with category and provider name
#[derive(Debug, Clone)]
pub struct LlmError {
    /// Error category for routing decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.category == ErrorCategory::RateLimit
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps raw provider failures onto error categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any provider
    pub fn classify(message: &str, provider: &str) -> LlmError {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("throttl")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota exceeded")
        {
            return LlmError::with_provider(ErrorCategory::RateLimit, message, provider);
        }

        if lower.contains("unauthorized")
            || lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("access denied")
        {
            return LlmError::with_provider(ErrorCategory::Auth, message, provider);
        }

        if lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("timed out")
            || lower.contains("unreachable")
        {
            return LlmError::with_provider(ErrorCategory::Network, message, provider);
        }

        if lower.contains("503")
            || lower.contains("502")
            || lower.contains("service unavailable")
            || lower.contains("not installed")
            || lower.contains("not found")
        {
            return LlmError::with_provider(ErrorCategory::Unavailable, message, provider);
        }

        if lower.contains("overloaded") || lower.contains("temporary") {
            return LlmError::with_provider(ErrorCategory::Transient, message, provider);
        }

        LlmError::with_provider(ErrorCategory::Unknown, message, provider)
    }

    /// Classify HTTP status code directly (more accurate than string matching)
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        match status {
            429 => LlmError::with_provider(ErrorCategory::RateLimit, message, provider),
            401 | 403 => LlmError::with_provider(ErrorCategory::Auth, message, provider),
            400 | 422 => {
                // Bedrock reports throttling on some models as a 400 with an exception type
                if message.contains("ThrottlingException") {
                    LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                } else {
                    LlmError::with_provider(ErrorCategory::BadRequest, message, provider)
                }
            }
            500 | 502 | 503 | 504 => {
                LlmError::with_provider(ErrorCategory::Transient, message, provider)
            }
            404 => LlmError::with_provider(ErrorCategory::Unavailable, message, provider),
            _ => Self::classify(message, provider),
        }
    }
}

// =============================================================================
// Image Errors
// =============================================================================

/// Distinct image-generation failure modes
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image response had no body")]
    MissingBody,

    #[error("image provider reported an error: {0}")]
    Provider(String),

    #[error("image provider returned no images")]
    NoImages,

    #[error("image payload could not be decoded: {0}")]
    Decode(String),
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ForgeError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Provider Errors
    // -------------------------------------------------------------------------
    /// The caller's cancellation token was set at a poll point
    #[error("Generation cancelled")]
    Cancelled,

    #[error("Provider error: {0}")]
    Provider(LlmError),

    /// No parseable JSON, or JSON missing required fields
    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("Image generation failed ({provider}): {source}")]
    Image {
        provider: String,
        #[source]
        source: ImageError,
    },

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Routing Errors
    // -------------------------------------------------------------------------
    #[error("No provider available for {operation}")]
    NoProviderAvailable { operation: OperationKind },

    #[error("All providers failed (tried: {}): {source}", format_tried(.tried))]
    AllProvidersFailed {
        tried: Vec<ProviderKind>,
        #[source]
        source: Box<ForgeError>,
    },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Research failed: {0}")]
    Research(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Book not found: {0}")]
    BookNotFound(String),
}

fn format_tried(tried: &[ProviderKind]) -> String {
    tried
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<LlmError> for ForgeError {
    fn from(err: LlmError) -> Self {
        ForgeError::Provider(err)
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl ForgeError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn image(provider: impl Into<String>, source: ImageError) -> Self {
        Self::Image {
            provider: provider.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Rate-limit signals are the only errors retried inside an adapter
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_rate_limited())
    }

    /// Whether the router may try another provider after this error
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::Provider(_)
                | Self::MalformedResponse { .. }
                | Self::Image { .. }
                | Self::Timeout { .. }
                | Self::Io(_)
                | Self::Json(_)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RATE_LIMIT");
        assert_eq!(ErrorCategory::Auth.to_string(), "AUTH");
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = ErrorClassifier::classify("Too many requests, slow down", "openai");
        assert_eq!(err.category, ErrorCategory::RateLimit);

        let err = ErrorClassifier::classify("ThrottlingException: Rate exceeded", "bedrock");
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_classify_http_status() {
        let rate_limit = ErrorClassifier::classify_http_status(429, "slow down", "test");
        assert_eq!(rate_limit.category, ErrorCategory::RateLimit);

        let throttled =
            ErrorClassifier::classify_http_status(400, "ThrottlingException: wait", "test");
        assert_eq!(throttled.category, ErrorCategory::RateLimit);

        let auth = ErrorClassifier::classify_http_status(401, "Unauthorized", "test");
        assert_eq!(auth.category, ErrorCategory::Auth);

        let server = ErrorClassifier::classify_http_status(503, "down", "test");
        assert_eq!(server.category, ErrorCategory::Transient);
    }

    #[test]
    fn test_classify_unknown() {
        let err = ErrorClassifier::classify("Something weird happened", "test");
        assert_eq!(err.category, ErrorCategory::Unknown);
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::with_provider(ErrorCategory::RateLimit, "Too many requests", "openai");
        assert_eq!(err.to_string(), "[openai:RATE_LIMIT] Too many requests");

        let err_no_provider = LlmError::new(ErrorCategory::Network, "Connection failed");
        assert_eq!(err_no_provider.to_string(), "[NETWORK] Connection failed");
    }

    #[test]
    fn test_forge_error_predicates() {
        let rate: ForgeError = LlmError::new(ErrorCategory::RateLimit, "slow").into();
        assert!(rate.is_rate_limited());
        assert!(rate.is_provider_failure());

        let malformed = ForgeError::malformed("primary", "no JSON");
        assert!(!malformed.is_rate_limited());
        assert!(malformed.is_provider_failure());

        assert!(ForgeError::Cancelled.is_cancelled());
        assert!(!ForgeError::Cancelled.is_provider_failure());
        assert!(!ForgeError::InvalidInput("x".into()).is_provider_failure());
    }

    #[test]
    fn test_all_providers_failed_names_providers() {
        let err = ForgeError::AllProvidersFailed {
            tried: vec![ProviderKind::Primary, ProviderKind::Secondary],
            source: Box::new(ForgeError::malformed("secondary", "no JSON")),
        };
        let message = err.to_string();
        assert!(message.contains("primary"));
        assert!(message.contains("secondary"));
    }
}
