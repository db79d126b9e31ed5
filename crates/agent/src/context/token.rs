//! Token counting.
//!
//! The real count comes from the generator's own tokenizer. When that is
//! unreachable or unsupported we fall back to a character heuristic:
//! ~4 characters per token, rounded up. Counting never fails.

use async_trait::async_trait;
use caduceus_core::{Generator, TokenCounter};
use std::sync::Arc;
use tracing::debug;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Length-based counter used when no tokenizer is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimateCounter;

#[async_trait]
impl TokenCounter for EstimateCounter {
    async fn count(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

/// Counts with [`Generator::tokenize`], estimating on any error.
pub struct GeneratorCounter {
    generator: Arc<dyn Generator>,
}

impl GeneratorCounter {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl TokenCounter for GeneratorCounter {
    async fn count(&self, text: &str) -> usize {
        match self.generator.tokenize(text).await {
            Ok(tokens) => tokens.len(),
            Err(e) => {
                debug!(
                    generator = self.generator.name(),
                    error = %e,
                    "Tokenizer unavailable, estimating"
                );
                estimate_tokens(text)
            }
        }
    }
}
