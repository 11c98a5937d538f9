//! Text-generation backends.
//!
//! The use-case handler phrases its answers through a [`Generator`]. A
//! generation either succeeds with text or fails with a
//! [`GenerationError`]; callers are expected to have a deterministic answer
//! ready for the failure case rather than surfacing it.
//!
//! ```text
//! TestScreening --generate(system, prompt)--> &dyn Generator
//!                                                 |
//!                         AnthropicGenerator -----+----- DisabledGenerator
//!                         (HTTPS, bounded timeout)        (always fails)
//! ```

pub mod anthropic;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::LlmConfig;

pub use anthropic::AnthropicGenerator;

/// Why a generation produced no text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("generation timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed API response: {0}")]
    Malformed(String),

    #[error("API response contained no text")]
    EmptyResponse,
}

impl GenerationError {
    /// Short machine-friendly label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Malformed(_) => "malformed",
            Self::EmptyResponse => "empty_response",
        }
    }
}

/// A backend that turns a persona and an instruction into natural language.
///
/// Object-safe so it can be shared as `Arc<dyn Generator>`.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable backend name (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Generate a single reply.
    ///
    /// `system` carries the persona and tone rules; `prompt` carries the
    /// per-turn instruction and data.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Generator) {}
};

/// Generator used when no API key is configured. Every call fails, so
/// every answer comes from the offline fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _system: &str, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::MissingApiKey)
    }
}

/// Pick the backend for a config: the hosted API when a key is set,
/// otherwise [`DisabledGenerator`].
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn Generator>, GenerationError> {
    if config.api_key.is_none() {
        tracing::warn!("no API key configured; every answer will use the offline fallback");
        return Ok(Arc::new(DisabledGenerator));
    }
    let generator = AnthropicGenerator::new(config)?;
    tracing::info!(model = generator.model(), "using hosted text generation");
    Ok(Arc::new(generator))
}
