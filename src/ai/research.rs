//! Research collaborator
//!
//! Gathers background facts for a section before its prose is written.
//! The default client talks to Perplexity's OpenAI-compatible chat endpoint.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

use crate::ai::prompt::PromptTemplates;
use crate::ai::provider::{ensure_success, send_error};
use crate::config::{ResearchConfig, ResearchCredentials};
use crate::types::{ForgeError, Result};

/// Produces research findings for a topic
#[async_trait]
pub trait ResearchClient: Send + Sync {
    async fn research(&self, topic: &str, context: &str) -> Result<String>;
}

pub struct PerplexityResearch {
    api_key: SecretString,
    api_base: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for PerplexityResearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerplexityResearch")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl PerplexityResearch {
    pub fn new(
        credentials: &ResearchCredentials,
        config: &ResearchConfig,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForgeError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: credentials.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout,
            client,
        })
    }

    async fn ask(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ]
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, "perplexity", self.timeout))?;
        let text = ensure_success(response, "perplexity", self.timeout).await?;

        findings_from(&serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ResearchClient for PerplexityResearch {
    async fn research(&self, topic: &str, context: &str) -> Result<String> {
        info!(topic, model = %self.model, "Researching section");
        let prompt = PromptTemplates::research(topic, context);
        let findings = self
            .ask(&prompt)
            .await
            .map_err(|e| ForgeError::Research(e.to_string()))?;
        debug!(bytes = findings.len(), "Research findings received");
        Ok(findings)
    }
}

fn findings_from(body: &Value) -> Result<String> {
    body.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .ok_or_else(|| ForgeError::Research("no findings in response".to_string()))
}

/// Section description extended with research findings
pub fn enrich_description(description: &str, findings: &str) -> String {
    let findings = findings.trim();
    if findings.is_empty() {
        return description.to_string();
    }
    format!("{}\n\nResearch notes:\n{}", description.trim_end(), findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::timeout::TimeoutConfig;

    #[test]
    fn test_findings_from_body() {
        let body = json!({"choices": [{"message": {"content": "  - fact one\n"}}]});
        assert_eq!(findings_from(&body).unwrap(), "- fact one");

        let empty = json!({"choices": [{"message": {"content": ""}}]});
        assert!(matches!(findings_from(&empty), Err(ForgeError::Research(_))));
    }

    #[test]
    fn test_enrich_description() {
        let enriched = enrich_description("They meet at the docks", "- fog season is March");
        assert!(enriched.starts_with("They meet at the docks"));
        assert!(enriched.ends_with("- fog season is March"));
        assert_eq!(enrich_description("plain", "  "), "plain");
    }

    #[test]
    fn test_debug_redacts_key() {
        let research = PerplexityResearch::new(
            &ResearchCredentials {
                api_key: SecretString::from("pplx-secret".to_string()),
            },
            &ResearchConfig::default(),
            TimeoutConfig::default().http_request,
        )
        .unwrap();
        assert!(!format!("{:?}", research).contains("pplx-secret"));
        assert_eq!(research.timeout, Duration::from_secs(300));
    }
}
