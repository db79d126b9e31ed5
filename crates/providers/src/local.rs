//! Local token counting with a HuggingFace `tokenizer.json`.
//!
//! Lets prompts be measured in the model's real tokens without a round
//! trip to the generation server. Only built with the `local` feature.

use async_trait::async_trait;
use caduceus_core::{GenerationError, TokenCounter};
use std::path::Path;
use std::str::FromStr;
use tokenizers::Tokenizer;
use tracing::{debug, info};

pub struct LocalTokenizer {
    tokenizer: Tokenizer,
}

impl LocalTokenizer {
    /// Load a `tokenizer.json`.
    pub fn from_file(path: &Path) -> Result<Self, GenerationError> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            GenerationError::Tokenize(format!("Failed to load tokenizer {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), "Local tokenizer loaded");
        Ok(Self { tokenizer })
    }

    /// Parse a tokenizer definition from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, GenerationError> {
        let tokenizer = Tokenizer::from_str(json)
            .map_err(|e| GenerationError::Tokenize(format!("Failed to parse tokenizer: {e}")))?;
        Ok(Self { tokenizer })
    }

    pub fn encode_len(&self, text: &str) -> Result<usize, GenerationError> {
        self.tokenizer
            .encode(text, false)
            .map(|encoding| encoding.len())
            .map_err(|e| GenerationError::Tokenize(e.to_string()))
    }
}

#[async_trait]
impl TokenCounter for LocalTokenizer {
    async fn count(&self, text: &str) -> usize {
        match self.encode_len(text) {
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "Local tokenizer failed, estimating");
                // ~4 bytes per token, rounded up
                text.len().div_ceil(4)
            }
        }
    }
}
