//! Evidence grounding and token-budget prompt assembly.
//!
//! A request flows through four stages:
//!
//! 1. **Ground**: the [`EvidenceAggregator`] collects reference summaries,
//!    dictionary definitions and one external lookup, in priority order
//! 2. **Compose**: the [`PromptComposer`] renders preamble, evidence,
//!    recent history and the question
//! 3. **Fit**: [`fit_to_budget`] sheds history, then low-priority evidence,
//!    then user text, then raw characters until the prompt fits
//! 4. **Generate**: the [`ChatPipeline`] hands the prompt to the generator
//!
//! Stages 1–3 never fail. Only generation errors reach the caller.

pub mod context;
pub mod grounding;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{
    DEFAULT_SYSTEM_PROMPT, EstimateCounter, FittedPrompt, GENERATION_CUE, GeneratorCounter,
    PromptComposer, PromptParts, TrimPolicy, TrimStep, estimate_tokens, fit_to_budget,
};
pub use grounding::{
    AggregatorSettings, EvidenceAggregator, ReferenceEntry, ReferenceLibrary, RelevanceSelector,
    TermExtractor,
};
pub use pipeline::{ChatPipeline, PipelineSettings, PreparedPrompt};
