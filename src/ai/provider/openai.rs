//! OpenAI-Compatible Provider
//!
//! Secondary cloud backend using the Chat Completions and Images APIs.
//! Single-shot calls; rate-limit retry lives in `ProviderAdapter`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::image::decode_single_image;
use super::{CompletionBackend, OperationKind, ProviderKind};
use crate::config::{SecondaryConfig, SecondaryCredentials};
use crate::types::{ErrorClassifier, ForgeError, ImageError, Result};

const SYSTEM_PROMPT: &str =
    "You are a professional author and editor. Always respond with valid JSON.";

/// OpenAI-compatible provider with secure API key handling
pub struct OpenAiProvider {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    image_model: String,
    max_tokens: usize,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("image_model", &self.image_model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(credentials: &SecondaryCredentials, config: &SecondaryConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForgeError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: credentials.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            image_model: config.image_model.clone(),
            max_tokens: config.max_tokens,
            timeout,
            client,
        })
    }

    fn build_request(&self, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens: Some(self.max_tokens),
        }
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.api_base, path);
        self.client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| send_error(e, self.name(), self.timeout))
    }
}

#[async_trait]
impl CompletionBackend for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Secondary
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports(&self, _operation: OperationKind) -> bool {
        true
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        info!(model = %self.model, "Generating with OpenAI");

        let request = self.build_request(prompt);
        let response = self.post("chat/completions", &request).await?;
        let body = ensure_success(response, self.name(), self.timeout).await?;

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| ForgeError::malformed(self.name(), format!("unexpected body: {}", e)))?;

        debug!("Received response from OpenAI");
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ForgeError::malformed(self.name(), "no content in response"))
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        info!(model = %self.image_model, "Generating image with OpenAI");

        let request = ImageGenerationRequest {
            model: self.image_model.clone(),
            prompt: prompt.to_string(),
            n: 1,
            size: "1024x1024".to_string(),
            response_format: "b64_json".to_string(),
        };
        let response = self.post("images/generations", &request).await?;
        let body = ensure_success(response, self.name(), self.timeout).await?;

        let payload = parse_image_body(&body, self.name())?;
        decode_single_image(payload.as_ref(), "data").map_err(|e| ForgeError::image(self.name(), e))
    }
}

// =============================================================================
// Shared HTTP helpers
// =============================================================================

pub(crate) fn send_error(err: reqwest::Error, provider: &str, timeout: Duration) -> ForgeError {
    if err.is_timeout() {
        return ForgeError::timeout(format!("{} request", provider), timeout);
    }
    ErrorClassifier::classify(&err.to_string(), provider).into()
}

/// Body text of a successful response, or a classified provider error
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    provider: &str,
    timeout: Duration,
) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| send_error(e, provider, timeout))?;

    if !status.is_success() {
        return Err(ErrorClassifier::classify_http_status(
            status.as_u16(),
            &format!("API error ({}): {}", status, body),
            provider,
        )
        .into());
    }
    Ok(body)
}

/// An empty body is reported as missing rather than as bad JSON
pub(super) fn parse_image_body(body: &str, provider: &str) -> Result<Option<Value>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
        .map(Some)
        .map_err(|e| ForgeError::image(provider, ImageError::Decode(e.to_string())))
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageGenerationRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
    response_format: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiProvider {
        let credentials = SecondaryCredentials {
            api_key: SecretString::from("sk-test-key".to_string()),
        };
        OpenAiProvider::new(&credentials, &SecondaryConfig::default()).unwrap()
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", provider());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-test-key"));
    }

    #[test]
    fn test_build_request_shape() {
        let request = serde_json::to_value(provider().build_request("hello")).unwrap();
        assert_eq!(request["model"], "gpt-4o");
        assert_eq!(request["messages"][0]["role"], "system");
        assert_eq!(request["messages"][1]["content"], "hello");
        assert_eq!(request["max_tokens"], 4096);
    }

    #[test]
    fn test_parse_image_body() {
        assert!(parse_image_body("  ", "openai").unwrap().is_none());
        assert!(matches!(
            parse_image_body("not json", "openai"),
            Err(ForgeError::Image {
                source: ImageError::Decode(_),
                ..
            })
        ));
    }

    #[test]
    fn test_chat_response_content() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "{\"content\": \"x\"}"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some(r#"{"content": "x"}"#)
        );
    }
}
