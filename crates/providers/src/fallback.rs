//! Generator fallback: an ordered chain with per-endpoint timeouts.
//!
//! When an endpoint fails (timeout, HTTP error, network error), the next
//! endpoint in the chain is tried with the same prompt.

use async_trait::async_trait;
use caduceus_core::{GenerationError, Generator};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A generator that wraps an ordered list of generators and falls back on failure.
pub struct FallbackGenerator {
    name: String,
    chain: Vec<FallbackEntry>,
}

/// A single entry in the fallback chain.
struct FallbackEntry {
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl FallbackGenerator {
    /// Create a new fallback generator with no entries.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
        }
    }

    /// Add a generator to the chain with a custom timeout.
    pub fn add(mut self, generator: Arc<dyn Generator>, timeout: Duration) -> Self {
        self.chain.push(FallbackEntry { generator, timeout });
        self
    }

    /// Add a generator with the default timeout (120s).
    pub fn add_default(self, generator: Arc<dyn Generator>) -> Self {
        self.add(generator, Duration::from_secs(120))
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[async_trait]
impl Generator for FallbackGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.chain.iter().any(|entry| entry.generator.is_available())
    }

    async fn generate(
        &self,
        prompt: &str,
        max_tokens: usize,
        stop: &[String],
    ) -> Result<String, GenerationError> {
        let mut last_error = GenerationError::NotAvailable("No generators in fallback chain".into());

        for (i, entry) in self.chain.iter().enumerate() {
            let generator_name = entry.generator.name().to_string();

            info!(
                generator = %generator_name,
                attempt = i + 1,
                total = self.chain.len(),
                "Fallback: trying generator"
            );

            match tokio::time::timeout(entry.timeout, entry.generator.generate(prompt, max_tokens, stop))
                .await
            {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(e)) => {
                    warn!(
                        generator = %generator_name,
                        error = %e,
                        "Fallback: generator failed, trying next"
                    );
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        generator = %generator_name,
                        timeout_secs = entry.timeout.as_secs(),
                        "Fallback: generator timed out, trying next"
                    );
                    last_error = GenerationError::Timeout(format!(
                        "Generator '{}' timed out after {}s",
                        generator_name,
                        entry.timeout.as_secs()
                    ));
                }
            }
        }

        Err(last_error)
    }

    /// The first endpoint whose tokenizer answers wins.
    async fn tokenize(&self, text: &str) -> Result<Vec<u32>, GenerationError> {
        let mut last_error = GenerationError::NotSupported(format!("tokenize on '{}'", self.name));
        for entry in &self.chain {
            match entry.generator.tokenize(text).await {
                Ok(tokens) => return Ok(tokens),
                Err(GenerationError::NotSupported(_)) => continue,
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        for entry in &self.chain {
            if let Ok(true) = entry.generator.health_check().await {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
