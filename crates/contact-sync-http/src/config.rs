/// Connection settings for the hotel contacts REST API
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const ENV_API_URL: &str = "CONTACT_SYNC_API_URL";
pub const ENV_TOKEN: &str = "CONTACT_SYNC_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "CONTACT_SYNC_TIMEOUT_SECS";

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("contact-sync/", env!("CARGO_PKG_VERSION")).to_string()
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root, e.g. `https://admin.example.com/api`
    pub base_url: String,

    /// Bearer token of the signed-in admin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Token if present and non-blank
    pub fn bearer_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing API config to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading API config from {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("parsing API config {}", path.display()))?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; used by `from_env`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup(ENV_API_URL).with_context(|| format!("{} is not set", ENV_API_URL))?;
        let mut config = Self::new(base_url);

        if let Some(token) = lookup(ENV_TOKEN) {
            config = config.with_token(token);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{} must be a number of seconds, got '{}'", ENV_TIMEOUT_SECS, raw))?;
            config = config.with_timeout(secs);
        }

        Ok(config)
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_builder_defaults() {
        let config = ApiConfig::new("http://localhost:8000/api")
            .with_token("abc")
            .with_timeout(5);

        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.bearer_token(), Some("abc"));
        assert!(config.user_agent.starts_with("contact-sync/"));
    }

    #[test]
    fn test_blank_token_counts_as_missing() {
        let config = ApiConfig::new("http://localhost").with_token("   ");
        assert_eq!(config.bearer_token(), None);
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ApiConfig::new("http://localhost").with_token("secret-token");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.json");
        let config = ApiConfig::new("https://admin.example.com/api").with_token("t0k");

        config.save(&path).unwrap();
        assert_eq!(ApiConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.json");
        std::fs::write(&path, r#"{ "base_url": "http://h" }"#).unwrap();

        let config = ApiConfig::load(&path).unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "http://api.local"),
            (ENV_TOKEN, "tok"),
            (ENV_TIMEOUT_SECS, " 12 "),
        ]);
        let config = ApiConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.base_url, "http://api.local");
        assert_eq!(config.bearer_token(), Some("tok"));
        assert_eq!(config.timeout_secs, 12);
    }

    #[test]
    fn test_from_lookup_requires_url_and_numeric_timeout() {
        assert!(ApiConfig::from_lookup(|_| None).is_err());

        let err = ApiConfig::from_lookup(|k| match k {
            ENV_API_URL => Some("http://api.local".to_string()),
            ENV_TIMEOUT_SECS => Some("soon".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(err.to_string().contains(ENV_TIMEOUT_SECS));
    }
}
