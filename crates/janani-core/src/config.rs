//! Runtime settings shared by the server and the one-shot commands.

use std::time::Duration;

/// Settings for the hosted text-generation API.
///
/// Plain data: the binary fills it in from flags, environment and config
/// file. Nothing here reads the process environment.
#[derive(Clone)]
pub struct LlmConfig {
    /// API key. When absent every answer uses the offline fallback.
    pub api_key: Option<String>,
    pub model: String,
    /// Scheme and host of the API, without the `/v1/messages` path.
    pub base_url: String,
    pub max_tokens: u32,
    /// Upper bound on one generation call. A caller on the phone is waiting.
    pub timeout: Duration,
}

impl LlmConfig {
    pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
    pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
    pub const DEFAULT_MAX_TOKENS: u32 = 1024;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 8;

    /// Build a config from an explicit key (useful for tests and CLI flags).
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: Self::DEFAULT_MODEL.to_owned(),
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    /// URL of the messages endpoint.
    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

// The API key must never reach the logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Settings for the in-memory context store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Contexts idle for longer than this are dropped.
    pub ttl: Duration,
    /// How often the server sweeps expired contexts.
    pub sweep_interval: Duration,
}

impl StoreConfig {
    pub const DEFAULT_TTL_SECS: u64 = 30 * 60;
    pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        Self { ttl, sweep_interval }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(Self::DEFAULT_TTL_SECS),
            Duration::from_secs(Self::DEFAULT_SWEEP_INTERVAL_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_api_key_is_treated_as_missing() {
        assert!(LlmConfig::new(Some("   ".to_string())).api_key.is_none());
        assert!(LlmConfig::new(None).api_key.is_none());
        assert_eq!(
            LlmConfig::new(Some("sk-test".to_string())).api_key.as_deref(),
            Some("sk-test")
        );
    }

    #[test]
    fn messages_url_joins_cleanly() {
        let mut cfg = LlmConfig::new(None);
        assert_eq!(cfg.messages_url(), "https://api.anthropic.com/v1/messages");
        cfg.base_url = "http://127.0.0.1:9999/".to_string();
        assert_eq!(cfg.messages_url(), "http://127.0.0.1:9999/v1/messages");
    }

    #[test]
    fn debug_redacts_api_key() {
        let cfg = LlmConfig::new(Some("sk-very-secret".to_string()));
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn new_ignores_process_environment() {
        // SAFETY: no other test in this crate reads these variables.
        unsafe {
            std::env::set_var("JANANI_LLM_MODEL", "from-env-model");
            std::env::set_var("JANANI_LLM_BASE_URL", "http://from-env.invalid");
        }
        let cfg = LlmConfig::new(None);
        unsafe {
            std::env::remove_var("JANANI_LLM_MODEL");
            std::env::remove_var("JANANI_LLM_BASE_URL");
        }
        assert_eq!(cfg.model, LlmConfig::DEFAULT_MODEL);
        assert_eq!(cfg.base_url, LlmConfig::DEFAULT_BASE_URL);
    }

    #[test]
    fn store_defaults() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.ttl, Duration::from_secs(1800));
        assert_eq!(cfg.sweep_interval, Duration::from_secs(60));
    }
}
