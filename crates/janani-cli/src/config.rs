//! Configuration file management for janani.
//!
//! Provides a TOML-based config file at `~/.config/janani/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use janani_core::config::{LlmConfig, StoreConfig};

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub contexts: ContextsSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ContextsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_interval_secs: Option<u64>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the janani config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/janani` or `~/.config/janani`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("janani");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("janani")
}

/// Return the path to the janani config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Load the config file if there is one. A file that exists but does not
/// parse is an error.
pub fn load_config_if_present() -> Result<Option<ConfigFile>> {
    if !config_path().exists() {
        return Ok(None);
    }
    load_config().map(Some)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix since it may hold an API key.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct JananiConfig {
    pub bind: String,
    pub port: u16,
    pub llm: LlmConfig,
    pub store: StoreConfig,
}

/// Read and parse an env var. Unset or empty is `None`; unparseable is an
/// error naming the variable.
fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} is not valid: {value:?}")),
        _ => Ok(None),
    }
}

impl JananiConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - bind: `cli_bind` > `JANANI_BIND` > `server.bind` > `0.0.0.0`
    /// - port: `cli_port` > `JANANI_PORT` > `server.port` > `5000`
    /// - API key: `ANTHROPIC_API_KEY` > `llm.api_key` > none (fallback answers only)
    /// - model, base URL, timeout: `JANANI_LLM_*` > `[llm]` > built-in defaults
    /// - context TTL: `JANANI_CONTEXT_TTL_SECS` > `contexts.ttl_secs` > 30 minutes
    pub fn resolve(cli_bind: Option<&str>, cli_port: Option<u16>) -> Result<Self> {
        let file = load_config_if_present()?.unwrap_or_default();

        let bind = match cli_bind {
            Some(bind) => bind.to_string(),
            None => env_parse::<String>("JANANI_BIND")?
                .or(file.server.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
        };
        let port = match cli_port {
            Some(port) => port,
            None => env_parse("JANANI_PORT")?
                .or(file.server.port)
                .unwrap_or(DEFAULT_PORT),
        };

        let api_key = env_parse::<String>("ANTHROPIC_API_KEY")?.or(file.llm.api_key);
        let mut llm = LlmConfig::new(api_key);
        if let Some(model) = env_parse::<String>("JANANI_LLM_MODEL")?.or(file.llm.model) {
            llm.model = model;
        }
        if let Some(url) = env_parse::<String>("JANANI_LLM_BASE_URL")?.or(file.llm.base_url) {
            llm.base_url = url;
        }
        if let Some(max_tokens) = file.llm.max_tokens {
            llm.max_tokens = max_tokens;
        }
        if let Some(secs) = env_parse::<u64>("JANANI_LLM_TIMEOUT_SECS")?.or(file.llm.timeout_secs)
        {
            llm.timeout = Duration::from_secs(secs);
        }

        let mut store = StoreConfig::default();
        if let Some(secs) = env_parse::<u64>("JANANI_CONTEXT_TTL_SECS")?.or(file.contexts.ttl_secs)
        {
            store.ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = file.contexts.sweep_interval_secs {
            store.sweep_interval = Duration::from_secs(secs.max(1));
        }

        Ok(Self {
            bind,
            port,
            llm,
            store,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
