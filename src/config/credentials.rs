//! Provider credentials and runtime capability flags
//!
//! Credentials are read from the environment only and never written to
//! config files. Keys are held as `SecretString` so they stay out of logs.

use secrecy::{ExposeSecret, SecretString};

use super::types::Config;

const PRIMARY_KEY_VARS: &[&str] = &["BOOKFORGE_PRIMARY_API_KEY", "AWS_BEARER_TOKEN_BEDROCK"];
const SECONDARY_KEY_VARS: &[&str] = &["BOOKFORGE_SECONDARY_API_KEY", "OPENAI_API_KEY"];
const RESEARCH_KEY_VARS: &[&str] = &["BOOKFORGE_RESEARCH_API_KEY", "PERPLEXITY_API_KEY"];

/// Bedrock runtime API key
#[derive(Debug, Clone)]
pub struct PrimaryCredentials {
    pub api_key: SecretString,
}

/// OpenAI-compatible API key
#[derive(Debug, Clone)]
pub struct SecondaryCredentials {
    pub api_key: SecretString,
}

#[derive(Debug, Clone)]
pub struct ResearchCredentials {
    pub api_key: SecretString,
}

/// Whatever credentials the caller has; absent providers are skipped by the router
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub primary: Option<PrimaryCredentials>,
    pub secondary: Option<SecondaryCredentials>,
    pub research: Option<ResearchCredentials>,
}

impl Credentials {
    /// Read credentials from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through an arbitrary lookup, first non-empty variable wins
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let key = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
                .map(SecretString::from)
        };

        Self {
            primary: key(PRIMARY_KEY_VARS).map(|api_key| PrimaryCredentials { api_key }),
            secondary: key(SECONDARY_KEY_VARS).map(|api_key| SecondaryCredentials { api_key }),
            research: key(RESEARCH_KEY_VARS).map(|api_key| ResearchCredentials { api_key }),
        }
    }

    pub fn primary(api_key: &str) -> Self {
        Self {
            primary: Some(PrimaryCredentials {
                api_key: SecretString::from(api_key.to_string()),
            }),
            ..Default::default()
        }
    }

    pub fn with_secondary(mut self, api_key: &str) -> Self {
        self.secondary = Some(SecondaryCredentials {
            api_key: SecretString::from(api_key.to_string()),
        });
        self
    }

    pub fn has_cloud(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }
}

/// Masked key for display, e.g. `sk-a…9f2c`
pub fn mask_key(secret: &SecretString) -> String {
    let key = secret.expose_secret();
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

/// Where the process runs and what the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeEnvironment {
    /// Platform can spawn local CLI tools at all
    pub local_cli_supported: bool,
    /// User preference for local generation
    pub local_mode_enabled: bool,
}

impl RuntimeEnvironment {
    pub fn detect(config: &Config) -> Self {
        Self {
            local_cli_supported: cfg!(any(
                target_os = "linux",
                target_os = "macos",
                target_os = "windows"
            )),
            local_mode_enabled: config.local.enabled,
        }
    }

    pub fn cloud_only() -> Self {
        Self::default()
    }

    pub fn local_preferred() -> Self {
        Self {
            local_cli_supported: true,
            local_mode_enabled: true,
        }
    }

    pub fn allows_local(&self) -> bool {
        self.local_cli_supported && self.local_mode_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_lookup_prefers_bookforge_vars() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("BOOKFORGE_PRIMARY_API_KEY", "bf-key"),
            ("AWS_BEARER_TOKEN_BEDROCK", "aws-key"),
            ("OPENAI_API_KEY", "  "),
            ("PERPLEXITY_API_KEY", "pplx-key"),
        ]);
        let creds = Credentials::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(
            creds.primary.unwrap().api_key.expose_secret(),
            "bf-key"
        );
        assert!(creds.secondary.is_none());
        assert!(creds.research.is_some());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let creds = Credentials::primary("super-secret-value");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("super-secret-value"));
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(&SecretString::from("short")), "****");
        assert_eq!(
            mask_key(&SecretString::from("sk-abcdefgh1234")),
            "sk-a…1234"
        );
    }

    #[test]
    fn test_environment_gate() {
        let mut config = Config::default();
        assert!(!RuntimeEnvironment::detect(&config).allows_local());
        config.local.enabled = true;
        let env = RuntimeEnvironment::detect(&config);
        assert_eq!(env.allows_local(), env.local_cli_supported);
        assert!(!RuntimeEnvironment::cloud_only().allows_local());
    }
}
