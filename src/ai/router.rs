//! Service Router
//!
//! Picks the backend for each generation request and falls back between
//! providers on failure.
//!
//! ## Strategy
//!
//! 1. Local CLI first, when the platform supports it, the user enabled it,
//!    the operation is text, and the (cached) probe found an installed tool
//! 2. Primary cloud provider, when its credentials are present
//! 3. Secondary cloud provider, when its credentials are present
//!
//! Each candidate is tried once, in order. A cancellation is never fallen
//! back from, and input errors surface directly since every provider would
//! reject them the same way.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::ai::cancel::CancellationToken;
use crate::ai::provider::{
    BedrockProvider, CapabilityProbe, CliCapabilityProbe, ImageRequest, LocalCapabilities,
    LocalCliProvider, LocalTool, OpenAiProvider, OperationKind, OutlineRequest, ProviderAdapter,
    ProviderKind, RetryPolicy,
};
use crate::ai::timeout::TimeoutConfig;
use crate::config::{
    Config, Credentials, PrimaryConfig, PrimaryCredentials, RuntimeEnvironment,
    SecondaryConfig, SecondaryCredentials,
};
use crate::types::{Book, ForgeError, HeatLevel, Perspective, Result, SubChapter};

// =============================================================================
// Requests & Responses
// =============================================================================

/// One logical generation operation with its inputs
#[derive(Debug, Clone)]
pub enum ProviderRequest {
    Outline(OutlineRequest),
    ChapterOutline {
        title: String,
        description: String,
    },
    Content {
        title: String,
        description: String,
    },
    ContentWithIntensity {
        title: String,
        description: String,
        heat_level: HeatLevel,
        perspective: Option<Perspective>,
    },
    Image(ImageRequest),
}

impl ProviderRequest {
    pub fn operation(&self) -> OperationKind {
        match self {
            ProviderRequest::Outline(_) => OperationKind::Outline,
            ProviderRequest::ChapterOutline { .. } => OperationKind::ChapterOutline,
            ProviderRequest::Content { .. } => OperationKind::Content,
            ProviderRequest::ContentWithIntensity { .. } => OperationKind::ContentWithIntensity,
            ProviderRequest::Image(_) => OperationKind::Image,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ProviderResponse {
    Outline(Book),
    ChapterOutline(Vec<SubChapter>),
    Content(String),
    Image(Vec<u8>),
}

/// A result plus which provider produced it
#[derive(Debug, Clone)]
pub struct Routed<T> {
    pub value: T,
    /// Provider that produced `value`
    pub provider: ProviderKind,
    /// Every provider tried, in order, ending with `provider`
    pub attempted: Vec<ProviderKind>,
}

impl<T> Routed<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Routed<U> {
        Routed {
            value: f(self.value),
            provider: self.provider,
            attempted: self.attempted,
        }
    }

    pub fn fell_back(&self) -> bool {
        self.attempted.len() > 1
    }
}

// =============================================================================
// Adapter Factory
// =============================================================================

/// Builds adapters from per-call credentials
pub trait AdapterFactory: Send + Sync {
    fn local(&self, tool: LocalTool) -> Result<ProviderAdapter>;
    fn primary(&self, credentials: &PrimaryCredentials) -> Result<ProviderAdapter>;
    fn secondary(&self, credentials: &SecondaryCredentials) -> Result<ProviderAdapter>;
}

/// Real backends: Bedrock, OpenAI-compatible, local CLI
pub struct HttpAdapterFactory {
    primary: PrimaryConfig,
    secondary: SecondaryConfig,
    timeouts: TimeoutConfig,
    retry: RetryPolicy,
}

impl HttpAdapterFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            primary: config.primary.clone(),
            secondary: config.secondary.clone(),
            timeouts: TimeoutConfig::from(config),
            retry: config.retry.policy(),
        }
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn local(&self, tool: LocalTool) -> Result<ProviderAdapter> {
        let backend = LocalCliProvider::new(tool, self.timeouts.local_cli);
        Ok(ProviderAdapter::for_backend(Arc::new(backend), self.retry.clone()))
    }

    fn primary(&self, credentials: &PrimaryCredentials) -> Result<ProviderAdapter> {
        let backend = BedrockProvider::new(credentials, &self.primary)?;
        Ok(ProviderAdapter::for_backend(Arc::new(backend), self.retry.clone()))
    }

    fn secondary(&self, credentials: &SecondaryCredentials) -> Result<ProviderAdapter> {
        let backend = OpenAiProvider::new(credentials, &self.secondary)?;
        Ok(ProviderAdapter::for_backend(Arc::new(backend), self.retry.clone()))
    }
}

// =============================================================================
// Router
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    Local(LocalTool),
    Primary,
    Secondary,
}

impl Candidate {
    fn kind(&self) -> ProviderKind {
        match self {
            Candidate::Local(_) => ProviderKind::Local,
            Candidate::Primary => ProviderKind::Primary,
            Candidate::Secondary => ProviderKind::Secondary,
        }
    }
}

pub struct ServiceRouter {
    factory: Arc<dyn AdapterFactory>,
    probe: Arc<dyn CapabilityProbe>,
    preferred_tool: Option<LocalTool>,
    /// Probe result for this router session
    capabilities: Mutex<Option<LocalCapabilities>>,
}

impl ServiceRouter {
    pub fn new(factory: Arc<dyn AdapterFactory>, probe: Arc<dyn CapabilityProbe>) -> Self {
        Self {
            factory,
            probe,
            preferred_tool: None,
            capabilities: Mutex::new(None),
        }
    }

    /// Router over the real backends configured in `config`
    pub fn from_config(config: &Config) -> Self {
        let probe = CliCapabilityProbe::new(TimeoutConfig::from(config).probe);
        Self::new(Arc::new(HttpAdapterFactory::new(config)), Arc::new(probe))
            .with_preferred_tool(config.local.preferred_tool)
    }

    pub fn with_preferred_tool(mut self, tool: Option<LocalTool>) -> Self {
        self.preferred_tool = tool;
        self
    }

    /// Installed local tools, probing once per router session
    pub async fn capabilities(&self) -> LocalCapabilities {
        let mut cached = self.capabilities.lock().await;
        if let Some(caps) = *cached {
            return caps;
        }
        let caps = self.probe.probe().await;
        debug!(claude = caps.claude, gemini = caps.gemini, "Probed local tools");
        *cached = Some(caps);
        caps
    }

    /// Forget the cached probe so the next local-eligible request probes again
    pub async fn invalidate_capabilities(&self) {
        *self.capabilities.lock().await = None;
    }

    /// Route any request and return the untyped response
    pub async fn route(
        &self,
        request: &ProviderRequest,
        credentials: &Credentials,
        environment: &RuntimeEnvironment,
        cancel: &CancellationToken,
    ) -> Result<Routed<ProviderResponse>> {
        match request {
            ProviderRequest::Outline(req) => Ok(self
                .generate_outline(req, credentials, environment, cancel)
                .await?
                .map(ProviderResponse::Outline)),
            ProviderRequest::ChapterOutline { title, description } => Ok(self
                .generate_chapter_outline(title, description, credentials, environment, cancel)
                .await?
                .map(ProviderResponse::ChapterOutline)),
            ProviderRequest::Content { title, description } => Ok(self
                .generate_content(title, description, credentials, environment, cancel)
                .await?
                .map(ProviderResponse::Content)),
            ProviderRequest::ContentWithIntensity {
                title,
                description,
                heat_level,
                perspective,
            } => Ok(self
                .generate_content_with_intensity(
                    title,
                    description,
                    *heat_level,
                    *perspective,
                    credentials,
                    environment,
                    cancel,
                )
                .await?
                .map(ProviderResponse::Content)),
            ProviderRequest::Image(req) => Ok(self
                .generate_image(req, credentials, environment, cancel)
                .await?
                .map(ProviderResponse::Image)),
        }
    }

    pub async fn generate_outline(
        &self,
        request: &OutlineRequest,
        credentials: &Credentials,
        environment: &RuntimeEnvironment,
        cancel: &CancellationToken,
    ) -> Result<Routed<Book>> {
        self.route_with(OperationKind::Outline, credentials, environment, cancel, |adapter| async move {
            adapter.generate_outline(request, cancel).await
        })
        .await
    }

    pub async fn generate_chapter_outline(
        &self,
        title: &str,
        description: &str,
        credentials: &Credentials,
        environment: &RuntimeEnvironment,
        cancel: &CancellationToken,
    ) -> Result<Routed<Vec<SubChapter>>> {
        self.route_with(
            OperationKind::ChapterOutline,
            credentials,
            environment,
            cancel,
            |adapter| async move { adapter.generate_chapter_outline(title, description, cancel).await },
        )
        .await
    }

    pub async fn generate_content(
        &self,
        title: &str,
        description: &str,
        credentials: &Credentials,
        environment: &RuntimeEnvironment,
        cancel: &CancellationToken,
    ) -> Result<Routed<String>> {
        self.route_with(OperationKind::Content, credentials, environment, cancel, |adapter| async move {
            adapter.generate_content(title, description, cancel).await
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn generate_content_with_intensity(
        &self,
        title: &str,
        description: &str,
        heat_level: HeatLevel,
        perspective: Option<Perspective>,
        credentials: &Credentials,
        environment: &RuntimeEnvironment,
        cancel: &CancellationToken,
    ) -> Result<Routed<String>> {
        self.route_with(
            OperationKind::ContentWithIntensity,
            credentials,
            environment,
            cancel,
            |adapter| async move {
                adapter
                    .generate_content_with_intensity(title, description, heat_level, perspective, cancel)
                    .await
            },
        )
        .await
    }

    pub async fn generate_image(
        &self,
        request: &ImageRequest,
        credentials: &Credentials,
        environment: &RuntimeEnvironment,
        cancel: &CancellationToken,
    ) -> Result<Routed<Vec<u8>>> {
        self.route_with(OperationKind::Image, credentials, environment, cancel, |adapter| async move {
            adapter.generate_image(request, cancel).await
        })
        .await
    }

    // -------------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------------

    /// Ordered candidates for an operation
    async fn plan(
        &self,
        operation: OperationKind,
        credentials: &Credentials,
        environment: &RuntimeEnvironment,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::with_capacity(3);

        if environment.allows_local() && operation.is_text() {
            if let Some(tool) = self.capabilities().await.pick(self.preferred_tool) {
                candidates.push(Candidate::Local(tool));
            } else {
                debug!("Local mode enabled but no local tool installed");
            }
        }
        if credentials.primary.is_some() {
            candidates.push(Candidate::Primary);
        }
        if credentials.secondary.is_some() {
            candidates.push(Candidate::Secondary);
        }
        candidates
    }

    fn build(&self, candidate: Candidate, credentials: &Credentials) -> Result<Option<ProviderAdapter>> {
        let adapter = match candidate {
            Candidate::Local(tool) => Some(self.factory.local(tool)?),
            Candidate::Primary => match &credentials.primary {
                Some(creds) => Some(self.factory.primary(creds)?),
                None => None,
            },
            Candidate::Secondary => match &credentials.secondary {
                Some(creds) => Some(self.factory.secondary(creds)?),
                None => None,
            },
        };
        Ok(adapter)
    }

    #[instrument(skip_all, fields(operation = %operation))]
    async fn route_with<T, F, Fut>(
        &self,
        operation: OperationKind,
        credentials: &Credentials,
        environment: &RuntimeEnvironment,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<Routed<T>>
    where
        F: Fn(ProviderAdapter) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempted = Vec::new();
        let mut last_error = None;

        for candidate in self.plan(operation, credentials, environment).await {
            let adapter = match self.build(candidate, credentials) {
                Ok(Some(adapter)) => adapter,
                Ok(None) => continue,
                Err(err) => {
                    warn!(provider = %candidate.kind(), error = %err, "Provider could not be built, trying next");
                    attempted.push(candidate.kind());
                    last_error = Some(err);
                    continue;
                }
            };
            if !adapter.supports(operation) {
                debug!(provider = adapter.name(), "Provider does not support operation");
                continue;
            }

            cancel.check()?;
            let kind = adapter.kind();
            let name = adapter.name().to_string();
            attempted.push(kind);
            debug!(provider = %name, attempt = attempted.len(), "Trying provider");

            match call(adapter).await {
                Ok(value) => {
                    if attempted.len() > 1 {
                        info!(provider = %name, tried = attempted.len(), "Fallback provider succeeded");
                    } else {
                        info!(provider = %name, "Provider succeeded");
                    }
                    return Ok(Routed {
                        value,
                        provider: kind,
                        attempted,
                    });
                }
                Err(err) if err.is_provider_failure() => {
                    warn!(provider = %name, error = %err, "Provider failed, trying next");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        match last_error {
            Some(source) => Err(ForgeError::AllProvidersFailed {
                tried: attempted,
                source: Box::new(source),
            }),
            None => Err(ForgeError::NoProviderAvailable { operation }),
        }
    }
}
