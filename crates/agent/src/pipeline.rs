//! The chat pipeline: grounding, prompt fitting and generation.
//!
//! ```text
//! message ─▶ EvidenceAggregator ─▶ fit_to_budget ─▶ Generator ─▶ reply
//!                  │                     │
//!            Cache + sources       PromptComposer + TokenCounter
//! ```
//!
//! Only generation failures reach the caller. Every grounding failure has
//! already been absorbed by the aggregator.

use crate::context::{
    FittedPrompt, GeneratorCounter, PromptComposer, PromptParts, TrimPolicy, fit_to_budget,
};
use crate::grounding::{AggregatorSettings, EvidenceAggregator, ReferenceLibrary, TermExtractor};
use caduceus_cache::Cache;
use caduceus_config::AppConfig;
use caduceus_core::{
    EvidenceItem, GenerationError, Generator, HistoryTurn, PromptBudget, Result, TokenCounter,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Budget and generation settings for one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub budget: PromptBudget,
    pub max_trim_iterations: usize,
    pub user_text_floor: usize,
    pub stop: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            budget: PromptBudget::default(),
            max_trim_iterations: 64,
            user_text_floor: 256,
            stop: vec!["User:".into(), "AI:".into()],
        }
    }
}

impl PipelineSettings {
    fn trim_policy(&self) -> TrimPolicy {
        TrimPolicy {
            max_tokens: self.budget.max_prompt_tokens(),
            max_iterations: self.max_trim_iterations,
            user_text_floor: self.user_text_floor,
        }
    }
}

/// Evidence and the fitted prompt, before generation.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedPrompt {
    /// Everything the aggregator found, before trimming.
    pub evidence: Vec<EvidenceItem>,
    pub fitted: FittedPrompt,
}

pub struct ChatPipeline {
    aggregator: EvidenceAggregator,
    composer: PromptComposer,
    counter: Arc<dyn TokenCounter>,
    generator: Arc<dyn Generator>,
    settings: PipelineSettings,
    cache: Cache,
}

impl ChatPipeline {
    pub fn new(
        aggregator: EvidenceAggregator,
        composer: PromptComposer,
        generator: Arc<dyn Generator>,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            aggregator,
            composer,
            counter,
            generator,
            settings: PipelineSettings::default(),
            cache: Cache::disabled(),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The cache the sources were built over, reported by health checks.
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = cache;
        self
    }

    /// Wire every collaborator from configuration.
    ///
    /// `counter` defaults to the generator's tokenizer with the length
    /// estimate as fallback.
    pub async fn from_config(
        config: &AppConfig,
        generator: Arc<dyn Generator>,
        counter: Option<Arc<dyn TokenCounter>>,
    ) -> Result<Self> {
        let cache = caduceus_cache::build_from_config(&config.cache).await;
        let http = caduceus_sources::http_client(&config.sources)?;

        let mut reference = ReferenceLibrary::builtin();
        if let Some(path) = &config.grounding.reference_file {
            reference.extend(ReferenceLibrary::load_file(path)?);
        }

        let grounding = &config.grounding;
        let chain = caduceus_sources::build_chain(&grounding.chain, Arc::clone(&http), &cache);
        let mut aggregator = EvidenceAggregator::new(reference, chain)
            .with_extractor(TermExtractor::heuristic(grounding.max_terms), grounding.max_sentences)
            .with_settings(AggregatorSettings {
                max_evidence: grounding.max_evidence,
                max_definitions: grounding.max_definitions,
                chain_mode: grounding.chain_mode,
                // Search-then-page sources make two requests.
                fetch_timeout: config.sources.timeout() * 2,
            });
        if grounding.dictionary {
            aggregator = aggregator.with_dictionary(caduceus_sources::build_dictionary(http, &cache));
        }

        let history_limit = config.conversation.history_limit;
        let composer = match &grounding.system_prompt_override {
            Some(preamble) => PromptComposer::new(preamble.as_str(), history_limit),
            None => PromptComposer::clinical(history_limit),
        };

        let counter = counter
            .unwrap_or_else(|| Arc::new(GeneratorCounter::new(Arc::clone(&generator))));

        info!(
            generator = generator.name(),
            cache = cache.backend_name(),
            chain = ?aggregator.chain_names(),
            "Chat pipeline ready"
        );

        Ok(Self::new(aggregator, composer, generator, counter)
            .with_settings(PipelineSettings {
                budget: config.budget.prompt_budget(),
                max_trim_iterations: config.budget.max_trim_iterations,
                user_text_floor: config.conversation.user_text_floor,
                stop: config.generator.stop.clone(),
            })
            .with_cache(cache))
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn composer(&self) -> &PromptComposer {
        &self.composer
    }

    /// Ground `message` and fit the prompt, without generating.
    pub async fn prepare(&self, message: &str, history: &[HistoryTurn]) -> PreparedPrompt {
        let message = message.trim();
        let evidence = self.aggregator.build_grounding(message).await;
        let parts = PromptParts::new(evidence.clone(), history.to_vec(), message);
        let fitted = fit_to_budget(
            &self.composer,
            self.counter.as_ref(),
            parts,
            self.settings.trim_policy(),
        )
        .await;

        if !fitted.within_budget {
            warn!(
                tokens = fitted.tokens,
                budget = fitted.budget,
                "Prompt still over budget after trimming"
            );
        }
        info!(
            evidence = evidence.len(),
            kept = fitted.parts.evidence.len(),
            steps = fitted.steps.len(),
            tokens = fitted.tokens,
            budget = fitted.budget,
            "Prompt prepared"
        );
        PreparedPrompt { evidence, fitted }
    }

    /// Answer `message`. Fails fast when no generator is available.
    pub async fn respond(
        &self,
        message: &str,
        history: &[HistoryTurn],
    ) -> std::result::Result<String, GenerationError> {
        if !self.generator.is_available() {
            return Err(GenerationError::NotAvailable(format!(
                "generator '{}' is not available",
                self.generator.name()
            )));
        }

        let prepared = self.prepare(message, history).await;
        let reply = self
            .generator
            .generate(
                &prepared.fitted.prompt,
                self.settings.budget.reserved_for_generation,
                &self.settings.stop,
            )
            .await?;
        Ok(reply.trim().to_string())
    }
}
