//! Prompt assembly under a token budget.
//!
//! # Reduction order
//!
//! | Step | Target | Strategy |
//! |------|--------|----------|
//! | 1 | Conversation history | Oldest turn dropped |
//! | 2 | Evidence | Last item of the lowest priority dropped, one always kept |
//! | 3 | User text | Cut to the floor length with `...` |
//! | 4 | Rendered prompt | Proportional raw truncation, then halving |

pub mod composer;
pub mod token;
pub mod trimmer;

pub use composer::{DEFAULT_SYSTEM_PROMPT, GENERATION_CUE, PromptComposer, PromptParts};
pub use token::{EstimateCounter, GeneratorCounter, estimate_tokens};
pub use trimmer::{
    FittedPrompt, MIN_PROMPT_CHARS, TrimPolicy, TrimStep, fit_to_budget, removal_index,
};
