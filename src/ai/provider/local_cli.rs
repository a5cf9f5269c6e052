//! Local CLI Provider
//!
//! Runs generation through a locally installed model CLI (`claude` or
//! `gemini`). Text only, single-shot, bounded by a wall-clock timeout.
//! Which tools exist is answered by a `CapabilityProbe`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::{CompletionBackend, ProviderKind};
use crate::ai::timeout::{with_timeout, with_timeout_map};
use crate::types::{ErrorCategory, ErrorClassifier, ForgeError, LlmError, Result};

/// Supported local tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalTool {
    Claude,
    Gemini,
}

impl LocalTool {
    pub fn binary(&self) -> &'static str {
        match self {
            LocalTool::Claude => "claude",
            LocalTool::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for LocalTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary())
    }
}

/// Which local tools answered the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LocalCapabilities {
    pub claude: bool,
    pub gemini: bool,
}

impl LocalCapabilities {
    pub fn any(&self) -> bool {
        self.claude || self.gemini
    }

    pub fn has(&self, tool: LocalTool) -> bool {
        match tool {
            LocalTool::Claude => self.claude,
            LocalTool::Gemini => self.gemini,
        }
    }

    /// Preferred tool if installed, else the first installed one
    pub fn pick(&self, preferred: Option<LocalTool>) -> Option<LocalTool> {
        preferred
            .filter(|tool| self.has(*tool))
            .or_else(|| {
                [LocalTool::Claude, LocalTool::Gemini]
                    .into_iter()
                    .find(|tool| self.has(*tool))
            })
    }
}

/// Reports installed local tools
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    async fn probe(&self) -> LocalCapabilities;
}

/// Probe that runs `<tool> --version`
pub struct CliCapabilityProbe {
    timeout: Duration,
}

impl CliCapabilityProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn installed(&self, tool: LocalTool) -> bool {
        let run = Command::new(tool.binary())
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match with_timeout_map(self.timeout, run, tool.binary()).await {
            Ok(Ok(output)) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!(tool = %tool, version = version.trim(), "Local CLI available");
                true
            }
            Ok(Ok(_)) => false,
            Ok(Err(e)) => {
                debug!(tool = %tool, error = %e, "Local CLI not found");
                false
            }
            Err(e) => {
                debug!(tool = %tool, error = %e, "Local CLI probe timed out");
                false
            }
        }
    }
}

#[async_trait]
impl CapabilityProbe for CliCapabilityProbe {
    async fn probe(&self) -> LocalCapabilities {
        let (claude, gemini) = tokio::join!(
            self.installed(LocalTool::Claude),
            self.installed(LocalTool::Gemini)
        );
        LocalCapabilities { claude, gemini }
    }
}

/// Local CLI backend
///
/// Retry and fallback are not handled here: a failed local call goes
/// straight back to the router.
pub struct LocalCliProvider {
    tool: LocalTool,
    timeout: Duration,
}

impl LocalCliProvider {
    pub fn new(tool: LocalTool, timeout: Duration) -> Self {
        Self { tool, timeout }
    }

    fn command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(self.tool.binary());
        match self.tool {
            LocalTool::Claude => {
                cmd.arg("-p").arg(prompt).arg("--output-format").arg("json");
            }
            LocalTool::Gemini => {
                cmd.arg("-p").arg(prompt);
            }
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn execute(&self, prompt: &str) -> Result<String> {
        let child = self.command(prompt).spawn().map_err(|e| {
            LlmError::with_provider(
                ErrorCategory::Unavailable,
                format!("Failed to spawn {}: {}. Is it installed?", self.tool, e),
                self.name(),
            )
        })?;

        let output = child.wait_with_output().await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            if let Some(message) = cli_error(&stdout) {
                return Err(ErrorClassifier::classify(&message, self.name()).into());
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                "Process exited with non-zero status".to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(ErrorClassifier::classify(&message, self.name()).into());
        }

        match self.tool {
            LocalTool::Claude => parse_claude_output(&stdout, self.name()),
            LocalTool::Gemini => Ok(stdout.into_owned()),
        }
    }
}

#[async_trait]
impl CompletionBackend for LocalCliProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn name(&self) -> &str {
        match self.tool {
            LocalTool::Claude => "claude-cli",
            LocalTool::Gemini => "gemini-cli",
        }
    }

    fn model(&self) -> &str {
        self.tool.binary()
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        info!(tool = %self.tool, "Generating with local CLI");
        with_timeout(self.timeout, self.execute(prompt), self.name()).await
    }
}

/// `claude --output-format json` wraps the model text in `result`
fn parse_claude_output(stdout: &str, provider: &str) -> Result<String> {
    let response: Value = serde_json::from_str(stdout.trim())
        .map_err(|e| ForgeError::malformed(provider, format!("unparseable CLI output: {}", e)))?;

    if let Some(message) = error_message(&response) {
        return Err(ErrorClassifier::classify(&message, provider).into());
    }

    match response.get("result") {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) if other.is_object() || other.is_array() => Ok(other.to_string()),
        _ => Err(ForgeError::malformed(provider, "no result in CLI output")),
    }
}

fn cli_error(stdout: &str) -> Option<String> {
    serde_json::from_str::<Value>(stdout.trim())
        .ok()
        .and_then(|v| error_message(&v))
}

fn error_message(response: &Value) -> Option<String> {
    let is_error = response
        .get("is_error")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    is_error.then(|| {
        response
            .get("result")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown CLI error")
            .to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_prefers_configured_tool() {
        let both = LocalCapabilities {
            claude: true,
            gemini: true,
        };
        assert_eq!(both.pick(Some(LocalTool::Gemini)), Some(LocalTool::Gemini));
        assert_eq!(both.pick(None), Some(LocalTool::Claude));

        let gemini_only = LocalCapabilities {
            claude: false,
            gemini: true,
        };
        assert_eq!(gemini_only.pick(Some(LocalTool::Claude)), Some(LocalTool::Gemini));
        assert_eq!(LocalCapabilities::default().pick(None), None);
        assert!(!LocalCapabilities::default().any());
    }

    #[test]
    fn test_parse_claude_output() {
        let stdout = r#"{"type": "result", "is_error": false, "result": "{\"content\": \"hi\"}"}"#;
        assert_eq!(
            parse_claude_output(stdout, "claude-cli").unwrap(),
            r#"{"content": "hi"}"#
        );
    }

    #[test]
    fn test_parse_claude_error_is_classified() {
        let stdout = r#"{"is_error": true, "result": "Rate limit reached"}"#;
        let err = parse_claude_output(stdout, "claude-cli").unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_parse_claude_garbage_is_malformed() {
        let err = parse_claude_output("not json", "claude-cli").unwrap_err();
        assert!(matches!(err, ForgeError::MalformedResponse { .. }));
    }

    #[test]
    fn test_local_tool_serde() {
        let tool: LocalTool = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(tool, LocalTool::Gemini);
        assert_eq!(LocalTool::Claude.to_string(), "claude");
    }

    #[tokio::test]
    #[ignore = "requires claude CLI installed"]
    async fn test_probe_real_tools() {
        let caps = CliCapabilityProbe::new(Duration::from_secs(10)).probe().await;
        assert!(caps.claude);
    }
}
