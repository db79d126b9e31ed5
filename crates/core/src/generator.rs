//! Generator trait: the abstraction over text-generation backends.
//!
//! A Generator turns a fully composed prompt into a completion and, when the
//! backend exposes one, tokenizes text with the model's own vocabulary so
//! prompt budgets can be measured in real tokens.
//!
//! Implementations: llama.cpp server, OpenAI-compatible completions,
//! ordered fallback chains, and the [`UnavailableGenerator`] sentinel.

use async_trait::async_trait;
use crate::error::GenerationError;

/// The core Generator trait.
#[async_trait]
pub trait Generator: Send + Sync {
    /// A human-readable name for this backend (e.g., "llamacpp").
    fn name(&self) -> &str;

    /// False only for the "no generator configured" sentinel.
    fn is_available(&self) -> bool {
        true
    }

    /// Complete `prompt`, producing at most `max_tokens` tokens and stopping
    /// at any of `stop`.
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: usize,
        stop: &[String],
    ) -> std::result::Result<String, GenerationError>;

    /// Tokenize with the model's vocabulary.
    ///
    /// Default implementation reports that tokenization isn't supported.
    async fn tokenize(&self, _text: &str) -> std::result::Result<Vec<u32>, GenerationError> {
        Err(GenerationError::NotSupported(format!(
            "tokenize on '{}'",
            self.name()
        )))
    }

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, GenerationError> {
        Ok(true)
    }
}

/// Measures text in tokens. Never fails: implementations fall back to an
/// estimate when their tokenizer is unreachable.
#[async_trait]
pub trait TokenCounter: Send + Sync {
    async fn count(&self, text: &str) -> usize;
}

/// The "not available" state of the generation collaborator.
///
/// Constructed when no endpoint is configured. The chat pipeline checks
/// [`Generator::is_available`] and fails fast instead of composing a prompt
/// nobody will read.
#[derive(Debug, Clone)]
pub struct UnavailableGenerator {
    reason: String,
}

impl UnavailableGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Default for UnavailableGenerator {
    fn default() -> Self {
        Self::new("no generator endpoint configured")
    }
}

#[async_trait]
impl Generator for UnavailableGenerator {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        _prompt: &str,
        _max_tokens: usize,
        _stop: &[String],
    ) -> std::result::Result<String, GenerationError> {
        Err(GenerationError::NotAvailable(self.reason.clone()))
    }

    async fn health_check(&self) -> std::result::Result<bool, GenerationError> {
        Ok(false)
    }
}
