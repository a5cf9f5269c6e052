//! Provider Abstraction
//!
//! A closed set of backends (`Primary`, `Secondary`, `Local`) sits behind the
//! `CompletionBackend` trait. `ProviderAdapter` wraps one backend and exposes
//! the book-generation operations: it builds prompts, applies the rate-limit
//! retry policy for cloud backends, extracts JSON from raw output and shapes it
//! into `Book` / `SubChapter` values.
//!
//! ## Modules
//!
//! - `bedrock`: primary cloud backend (Bedrock runtime, Anthropic models, Titan images)
//! - `openai`: secondary cloud backend (OpenAI-compatible chat and images)
//! - `local_cli`: local CLI backend and capability probe
//! - `retry`: rate-limit backoff
//! - `image`: image payload decoding

mod bedrock;
mod image;
mod local_cli;
mod openai;
mod retry;

pub use bedrock::BedrockProvider;
pub use image::{decode_single_image, images_from_payload};
pub use local_cli::{CapabilityProbe, CliCapabilityProbe, LocalCapabilities, LocalCliProvider, LocalTool};
pub use openai::OpenAiProvider;
pub(crate) use openai::{ensure_success, send_error};
pub use retry::{RetryPolicy, with_rate_limit_retry};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ai::cancel::CancellationToken;
use crate::ai::prompt::PromptTemplates;
use crate::ai::validation::{
    ExtractError, JsonShape, extract_json_shaped, optional_str, required_str,
};
use crate::types::{
    Book, BookStatus, Chapter, ForgeError, HeatLevel, Perspective, Result, SubChapter,
};

// =============================================================================
// Provider & Operation Tags
// =============================================================================

/// Which backend serviced a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Primary,
    Secondary,
    Local,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Primary => "primary",
            ProviderKind::Secondary => "secondary",
            ProviderKind::Local => "local",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical generation operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Outline,
    ChapterOutline,
    Content,
    ContentWithIntensity,
    Image,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Outline => "outline",
            OperationKind::ChapterOutline => "chapter-outline",
            OperationKind::Content => "content",
            OperationKind::ContentWithIntensity => "content-with-intensity",
            OperationKind::Image => "image",
        }
    }

    pub fn is_text(&self) -> bool {
        !matches!(self, OperationKind::Image)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Fields for whole-book outline generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlineRequest {
    /// Free-form premise from the author
    pub prompt: String,
    pub genre: String,
    pub sub_genre: Option<String>,
    pub author: Option<String>,
    pub tone: Option<String>,
    pub target_audience: Option<String>,
    pub heat_level: Option<HeatLevel>,
    pub perspective: Option<Perspective>,
    /// Desired chapter count; the model picks when absent
    pub chapter_count: Option<usize>,
}

/// Fields for illustration generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageRequest {
    pub title: String,
    pub description: String,
    pub genre: Option<String>,
    pub style: Option<String>,
}

// =============================================================================
// Backend Trait
// =============================================================================

/// One provider backend: raw prompt in, raw text out
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Whether this backend can service the operation at all
    fn supports(&self, operation: OperationKind) -> bool {
        operation.is_text()
    }

    /// Single completion call, no retry
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Single image call returning exactly one decoded image
    async fn generate_image(&self, _prompt: &str) -> Result<Vec<u8>> {
        Err(ForgeError::InvalidInput(format!(
            "{} does not support image generation",
            self.name()
        )))
    }
}

pub type SharedBackend = Arc<dyn CompletionBackend>;

// =============================================================================
// Provider Adapter
// =============================================================================

/// Uniform book-generation interface over one backend
#[derive(Clone)]
pub struct ProviderAdapter {
    backend: SharedBackend,
    /// Rate-limit retry for cloud text calls; `None` for single-shot backends
    retry: Option<RetryPolicy>,
}

impl ProviderAdapter {
    pub fn new(backend: SharedBackend, retry: Option<RetryPolicy>) -> Self {
        Self { backend, retry }
    }

    /// Cloud backends get the rate-limit retry policy, local ones run once
    pub fn for_backend(backend: SharedBackend, policy: RetryPolicy) -> Self {
        let retry = match backend.kind() {
            ProviderKind::Local => None,
            ProviderKind::Primary | ProviderKind::Secondary => Some(policy),
        };
        Self::new(backend, retry)
    }

    pub fn kind(&self) -> ProviderKind {
        self.backend.kind()
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn supports(&self, operation: OperationKind) -> bool {
        self.backend.supports(operation)
    }

    /// Generate a whole-book outline
    pub async fn generate_outline(
        &self,
        request: &OutlineRequest,
        cancel: &CancellationToken,
    ) -> Result<Book> {
        require_non_empty("prompt", &request.prompt)?;
        require_non_empty("genre", &request.genre)?;

        let prompt = PromptTemplates::book_outline(request);
        let value = self.complete_json(&prompt, JsonShape::Object, cancel).await?;

        let title = required_str(&value, "title").map_err(|m| self.malformed(m))?;
        let entries = value
            .get("chapters")
            .and_then(|c| c.as_array())
            .ok_or_else(|| self.malformed("missing required field 'chapters'"))?;
        if entries.is_empty() {
            return Err(self.malformed("outline has no chapters"));
        }

        let mut book = Book::new(title, request.genre.clone());
        book.description = optional_str(&value, "description")
            .unwrap_or(&request.prompt)
            .to_string();
        book.author = request.author.clone().unwrap_or_default();
        book.sub_genre = request.sub_genre.clone();
        book.tone = request.tone.clone();
        book.target_audience = request.target_audience.clone();
        book.heat_level = request.heat_level;
        book.perspective = request.perspective;
        book.status = BookStatus::Draft;
        book.chapters = entries
            .iter()
            .map(|entry| {
                let (title, description) = self.title_and_description(entry)?;
                Ok(Chapter::new(title, description))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            provider = self.name(),
            chapters = book.chapters.len(),
            "Generated book outline"
        );
        Ok(book)
    }

    /// Generate the ordered section list for one chapter
    pub async fn generate_chapter_outline(
        &self,
        title: &str,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SubChapter>> {
        require_non_empty("title", title)?;
        require_non_empty("description", description)?;

        let prompt = PromptTemplates::chapter_outline(title, description);
        let value = self.complete_json(&prompt, JsonShape::Any, cancel).await?;

        let entries = match &value {
            serde_json::Value::Array(items) => items,
            obj => ["subChapters", "sections"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(|v| v.as_array()))
                .ok_or_else(|| self.malformed("expected an array of sections"))?,
        };
        if entries.is_empty() {
            return Err(self.malformed("chapter outline has no sections"));
        }

        entries
            .iter()
            .map(|entry| {
                let (title, description) = self.title_and_description(entry)?;
                Ok(SubChapter::new(title, description))
            })
            .collect()
    }

    /// Generate prose for one section
    pub async fn generate_content(
        &self,
        title: &str,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        require_non_empty("title", title)?;
        require_non_empty("description", description)?;

        let prompt = PromptTemplates::section_content(title, description);
        self.content_from(&prompt, cancel).await
    }

    /// Generate prose for one section at a given heat level
    pub async fn generate_content_with_intensity(
        &self,
        title: &str,
        description: &str,
        level: HeatLevel,
        perspective: Option<Perspective>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        require_non_empty("title", title)?;
        require_non_empty("description", description)?;

        let prompt =
            PromptTemplates::section_content_with_intensity(title, description, level, perspective);
        self.content_from(&prompt, cancel).await
    }

    /// Generate one illustration. Never retried.
    pub async fn generate_image(
        &self,
        request: &ImageRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        require_non_empty("title", &request.title)?;
        require_non_empty("description", &request.description)?;

        cancel.check()?;
        let prompt = PromptTemplates::illustration(request);
        let image = self.backend.generate_image(&prompt).await?;
        cancel.check()?;
        Ok(image)
    }

    // -------------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------------

    async fn content_from(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        let value = self.complete_json(prompt, JsonShape::Object, cancel).await?;
        let content = required_str(&value, "content").map_err(|m| self.malformed(m))?;
        Ok(content.to_string())
    }

    /// Run one completion under the retry policy, then extract JSON
    async fn complete_json(
        &self,
        prompt: &str,
        shape: JsonShape,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let backend = &self.backend;
        let raw = match &self.retry {
            Some(policy) => {
                with_rate_limit_retry(policy, cancel, backend.name(), || backend.complete(prompt))
                    .await?
            }
            None => {
                cancel.check()?;
                let raw = backend.complete(prompt).await?;
                cancel.check()?;
                raw
            }
        };

        debug!(provider = backend.name(), bytes = raw.len(), "Parsing provider output");
        extract_json_shaped(&raw, shape).map_err(|e| self.malformed_from(e))
    }

    fn title_and_description(&self, entry: &Value) -> Result<(String, String)> {
        let title = required_str(entry, "title").map_err(|m| self.malformed(m))?;
        let description = optional_str(entry, "description").unwrap_or(title);
        Ok((title.to_string(), description.to_string()))
    }

    fn malformed(&self, message: impl Into<String>) -> ForgeError {
        ForgeError::malformed(self.name(), message)
    }

    fn malformed_from(&self, err: ExtractError) -> ForgeError {
        self.malformed(err.to_string())
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ForgeError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted backend shared by adapter, router and pipeline tests

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub type Script = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

    pub struct MockBackend {
        pub kind: ProviderKind,
        pub name: String,
        pub calls: AtomicUsize,
        pub prompts: Mutex<Vec<String>>,
        queued: Mutex<VecDeque<Result<String>>>,
        fallback: Script,
        images: bool,
    }

    impl MockBackend {
        pub fn new(kind: ProviderKind, fallback: Script) -> Self {
            Self {
                kind,
                name: kind.as_str().to_string(),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                queued: Mutex::new(VecDeque::new()),
                fallback,
                images: false,
            }
        }

        /// Answers every prompt like a well-behaved model
        pub fn book_writer(kind: ProviderKind) -> Self {
            Self::new(kind, Box::new(|prompt| Ok(canned_response(prompt))))
        }

        pub fn failing(kind: ProviderKind, message: &'static str) -> Self {
            Self::new(
                kind,
                Box::new(move |_| Err(ForgeError::Provider(crate::types::LlmError::new(
                    crate::types::ErrorCategory::Unknown,
                    message,
                )))),
            )
        }

        pub fn with_images(mut self) -> Self {
            self.images = true;
            self
        }

        /// Responses served before the fallback script
        pub fn queue(self, responses: Vec<Result<String>>) -> Self {
            self.queued.lock().unwrap().extend(responses);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    /// Content answers echo the section title so tests can tell them apart
    pub fn canned_response(prompt: &str) -> String {
        if prompt.contains("<TASK>book-outline</TASK>") {
            r#"Here you go:
```json
{"title": "The Lighthouse Keeper", "description": "A slow-burn romance",
 "chapters": [
   {"id": "model-id", "title": "Arrival", "description": "She arrives", "status": "completed"},
   {"title": "Storm", "description": "The storm hits"}
 ]}
```"#
                .to_string()
        } else if prompt.contains("<TASK>chapter-outline</TASK>") {
            r#"[{"title": "Part A", "description": "First beat"},
                {"title": "Part B", "description": "Second beat"},
                {"title": "Part C", "description": "Third beat"}]"#
                .to_string()
        } else {
            let title = prompt
                .lines()
                .find_map(|l| l.strip_prefix("**Section title**: "))
                .unwrap_or("section");
            serde_json::json!({ "content": format!("Prose for {}", title) }).to_string()
        }
    }

    #[async_trait]
    impl CompletionBackend for MockBackend {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        fn supports(&self, operation: OperationKind) -> bool {
            operation.is_text() || self.images
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let queued = self.queued.lock().unwrap().pop_front();
            match queued {
                Some(response) => response,
                None => (self.fallback)(prompt),
            }
        }

        async fn generate_image(&self, _prompt: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::types::{ErrorCategory, LlmError, NodeStatus};

    fn adapter(backend: MockBackend) -> (ProviderAdapter, Arc<MockBackend>) {
        let backend = Arc::new(backend);
        let adapter = ProviderAdapter::for_backend(backend.clone(), RetryPolicy::immediate());
        (adapter, backend)
    }

    fn outline_request() -> OutlineRequest {
        OutlineRequest {
            prompt: "A keeper falls for a stranded sailor".to_string(),
            genre: "Romance".to_string(),
            heat_level: Some(HeatLevel::Sweet),
            perspective: Some(Perspective::FirstPerson),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_outline_assigns_fresh_ids_and_pending() {
        let (adapter, _) = adapter(MockBackend::book_writer(ProviderKind::Primary));
        let book = adapter
            .generate_outline(&outline_request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(book.title, "The Lighthouse Keeper");
        assert_eq!(book.status, BookStatus::Draft);
        assert_eq!(book.heat_level, Some(HeatLevel::Sweet));
        assert_eq!(book.chapters.len(), 2);
        assert_ne!(book.chapters[0].id, "model-id");
        assert_ne!(book.chapters[0].id, book.chapters[1].id);
        assert!(book.chapters.iter().all(|c| c.status == NodeStatus::Pending));
        assert!(book.chapters.iter().all(|c| c.sub_chapters.is_none()));
    }

    #[tokio::test]
    async fn test_chapter_outline_accepts_wrapped_object() {
        let (adapter, _) = adapter(
            MockBackend::book_writer(ProviderKind::Secondary).queue(vec![Ok(
                r#"{"subChapters": [{"title": "Only", "description": "One"}]}"#.to_string(),
            )]),
        );
        let sections = adapter
            .generate_chapter_outline("Arrival", "She arrives", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].status, NodeStatus::Pending);
    }

    #[tokio::test]
    async fn test_content_missing_field_is_malformed() {
        let (adapter, _) = adapter(
            MockBackend::book_writer(ProviderKind::Primary)
                .queue(vec![Ok(r#"{"text": "wrong key"}"#.to_string())]),
        );
        let err = adapter
            .generate_content("Arrival", "She arrives", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_no_json_is_malformed_and_not_retried() {
        let (adapter, backend) = adapter(
            MockBackend::book_writer(ProviderKind::Primary)
                .queue(vec![Ok("I'd rather not.".to_string())]),
        );
        let err = adapter
            .generate_content("Arrival", "She arrives", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::MalformedResponse { .. }));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected_before_call() {
        let (adapter, backend) = adapter(MockBackend::book_writer(ProviderKind::Primary));
        let err = adapter
            .generate_content("", "desc", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidInput(_)));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_intensity_prompt_carries_level_and_perspective() {
        let (adapter, backend) = adapter(MockBackend::book_writer(ProviderKind::Primary));
        adapter
            .generate_content_with_intensity(
                "Arrival",
                "She arrives",
                HeatLevel::Steamy,
                Some(Perspective::ThirdLimited),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("Steamy"));
        assert!(prompts[0].contains("third person limited"));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let (adapter, backend) = adapter(MockBackend::book_writer(ProviderKind::Local));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = adapter
            .generate_content("Arrival", "She arrives", &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_local_backend_is_not_retried() {
        let rate_limited = || {
            Err(ForgeError::Provider(LlmError::new(
                ErrorCategory::RateLimit,
                "slow down",
            )))
        };
        let (adapter, backend) = adapter(
            MockBackend::book_writer(ProviderKind::Local).queue(vec![rate_limited()]),
        );
        let err = adapter
            .generate_content("Arrival", "She arrives", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(backend.call_count(), 1);
    }
}
