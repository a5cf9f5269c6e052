//! Amazon Bedrock Runtime Provider
//!
//! Primary cloud backend. Text goes through `InvokeModel` with an Anthropic
//! messages body; images go through a Titan image model whose reply is
//! `{"images": [...], "error": ...}`. Authenticates with a Bedrock API key
//! sent as a bearer token.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::image::decode_single_image;
use super::openai::{ensure_success, parse_image_body, send_error};
use super::{CompletionBackend, OperationKind, ProviderKind};
use crate::config::{PrimaryConfig, PrimaryCredentials};
use crate::types::{ForgeError, Result};

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Titan rejects longer prompts
const TITAN_PROMPT_LIMIT: usize = 512;

pub struct BedrockProvider {
    api_key: SecretString,
    region: String,
    model: String,
    image_model: String,
    max_tokens: usize,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for BedrockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockProvider")
            .field("api_key", &"[REDACTED]")
            .field("region", &self.region)
            .field("model", &self.model)
            .field("image_model", &self.image_model)
            .finish()
    }
}

impl BedrockProvider {
    pub fn new(credentials: &PrimaryCredentials, config: &PrimaryConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForgeError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: credentials.api_key.clone(),
            region: config.region.clone(),
            model: config.model.clone(),
            image_model: config.image_model.clone(),
            max_tokens: config.max_tokens,
            timeout,
            client,
        })
    }

    /// `https://bedrock-runtime.{region}.amazonaws.com/model/{model}/invoke`
    fn invoke_url(&self, model: &str) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "https://bedrock-runtime.{}.amazonaws.com",
            self.region
        ))
        .map_err(|e| ForgeError::Config(format!("Invalid Bedrock region '{}': {}", self.region, e)))?;

        url.path_segments_mut()
            .map_err(|_| ForgeError::Config("Bedrock URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["model", model, "invoke"]);
        Ok(url)
    }

    fn text_body(&self, prompt: &str) -> Value {
        json!({
            "anthropic_version": ANTHROPIC_VERSION,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "user", "content": prompt }
            ]
        })
    }

    fn image_body(prompt: &str) -> Value {
        let text: String = prompt.chars().take(TITAN_PROMPT_LIMIT).collect();
        json!({
            "taskType": "TEXT_IMAGE",
            "textToImageParams": { "text": text },
            "imageGenerationConfig": {
                "numberOfImages": 1,
                "width": 1024,
                "height": 1024,
                "cfgScale": 8.0
            }
        })
    }

    async fn invoke(&self, model: &str, body: &Value) -> Result<String> {
        let url = self.invoke_url(model)?;
        debug!(model, "Invoking Bedrock model");

        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| send_error(e, self.name(), self.timeout))?;

        ensure_success(response, self.name(), self.timeout).await
    }
}

#[async_trait]
impl CompletionBackend for BedrockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Primary
    }

    fn name(&self) -> &str {
        "bedrock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports(&self, _operation: OperationKind) -> bool {
        true
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        info!(model = %self.model, region = %self.region, "Generating with Bedrock");

        let body = self.invoke(&self.model, &self.text_body(prompt)).await?;
        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| ForgeError::malformed(self.name(), format!("unexpected body: {}", e)))?;

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            return Err(ForgeError::malformed(self.name(), "no text content in response"));
        }
        Ok(text)
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        info!(model = %self.image_model, "Generating image with Bedrock");

        let body = self.invoke(&self.image_model, &Self::image_body(prompt)).await?;
        let payload = parse_image_body(&body, self.name())?;
        decode_single_image(payload.as_ref(), "images")
            .map_err(|e| ForgeError::image(self.name(), e))
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}
