//! Token-budget trimming.
//!
//! Recompose and re-measure after every reduction, applying the cheapest
//! applicable reduction each round:
//!
//! 1. drop the oldest history turn
//! 2. drop the tail item of the lowest evidence priority present, while
//!    more than one item remains
//! 3. cut user text longer than the floor to `floor - 3` chars plus `...`
//! 4. cut the rendered prompt itself, proportionally to the overshoot
//!
//! Once step 4 starts the prompt shrinks by at least one char per round.
//! The round count is capped; if the cap is reached while still over
//! budget, the prompt is halved until it fits. Neither cut goes below
//! [`MIN_PROMPT_CHARS`], so an unreachable budget yields a short prefix
//! that is over budget rather than an empty prompt.

use crate::context::composer::{PromptComposer, PromptParts};
use caduceus_core::{EvidenceItem, EvidencePriority, HistoryTurn, TokenCounter, truncate_chars};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Marker appended to shortened user text.
const ELLIPSIS: &str = "...";

/// Halving rounds in the final fallback.
const MAX_HALVINGS: usize = 64;

/// Truncation never cuts the prompt below this many chars.
pub const MIN_PROMPT_CHARS: usize = 10;

// ── Types ─────────────────────────────────────────────────────────────────

/// Limits for one trimming run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimPolicy {
    /// Largest acceptable token count.
    pub max_tokens: usize,
    /// Ceiling on reduction rounds before the halving fallback.
    pub max_iterations: usize,
    /// User text at or below this many chars is never shortened.
    pub user_text_floor: usize,
}

impl Default for TrimPolicy {
    fn default() -> Self {
        Self {
            max_tokens: 624,
            max_iterations: 64,
            user_text_floor: 256,
        }
    }
}

/// One reduction applied by the trimmer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TrimStep {
    DroppedHistoryTurn,
    DroppedEvidence {
        description: String,
        priority: EvidencePriority,
    },
    TruncatedUserText {
        from_chars: usize,
        to_chars: usize,
    },
    RawTruncation {
        from_chars: usize,
        to_chars: usize,
    },
    HardTruncation {
        from_chars: usize,
        to_chars: usize,
    },
}

/// The outcome of trimming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPrompt {
    /// The final prompt text.
    pub prompt: String,
    /// Its measured size.
    pub tokens: usize,
    /// The budget it was fitted to.
    pub budget: usize,
    /// Reductions applied, in order.
    pub steps: Vec<TrimStep>,
    /// The parts the prompt was last composed from. After raw truncation
    /// the prompt is a prefix of their rendering.
    pub parts: PromptParts,
    /// `tokens <= budget`.
    pub within_budget: bool,
}

impl FittedPrompt {
    /// True if any raw or hard truncation was needed.
    pub fn was_truncated(&self) -> bool {
        self.steps.iter().any(|s| {
            matches!(s, TrimStep::RawTruncation { .. } | TrimStep::HardTruncation { .. })
        })
    }
}

// ── Trimmer ───────────────────────────────────────────────────────────────

/// Index of the evidence item to drop: the last item of the lowest
/// priority present. Pinned items go only when nothing else is left, and
/// then from the tail.
pub fn removal_index(evidence: &[EvidenceItem]) -> Option<usize> {
    let lowest = evidence.iter().map(EvidenceItem::priority).min()?;
    evidence.iter().rposition(|item| item.priority() == lowest)
}

/// Fit `parts` into `policy.max_tokens`.
///
/// `parts` is consumed as the working copy; history is first narrowed to
/// the composer's live window.
pub async fn fit_to_budget(
    composer: &PromptComposer,
    counter: &dyn TokenCounter,
    mut parts: PromptParts,
    policy: TrimPolicy,
) -> FittedPrompt {
    let mut steps = Vec::new();
    let live = HistoryTurn::recent(&parts.history, composer.history_limit()).len();
    parts.history.drain(..parts.history.len() - live);

    let mut prompt = composer.render(&parts);
    let mut tokens = counter.count(&prompt).await;
    let mut raw_mode = false;

    for _ in 0..policy.max_iterations {
        if tokens <= policy.max_tokens {
            break;
        }

        if !raw_mode {
            if let Some(step) = reduce_parts(&mut parts, policy.user_text_floor) {
                debug!(?step, tokens, budget = policy.max_tokens, "Trimmed prompt input");
                steps.push(step);
                prompt = composer.render(&parts);
                tokens = counter.count(&prompt).await;
                continue;
            }
            raw_mode = true;
        }

        let from_chars = prompt.chars().count();
        if from_chars <= MIN_PROMPT_CHARS {
            break;
        }
        let proportional = from_chars * policy.max_tokens / tokens.max(1);
        let to_chars = proportional.clamp(MIN_PROMPT_CHARS, from_chars - 1);
        prompt = truncate_chars(&prompt, to_chars).to_string();
        tokens = counter.count(&prompt).await;
        debug!(from_chars, to_chars, tokens, "Raw-truncated prompt");
        steps.push(TrimStep::RawTruncation { from_chars, to_chars });
    }

    let mut halvings = 0;
    while tokens > policy.max_tokens && halvings < MAX_HALVINGS {
        let from_chars = prompt.chars().count();
        if from_chars <= MIN_PROMPT_CHARS {
            break;
        }
        let to_chars = (from_chars / 2).max(MIN_PROMPT_CHARS);
        prompt = truncate_chars(&prompt, to_chars).to_string();
        tokens = counter.count(&prompt).await;
        steps.push(TrimStep::HardTruncation { from_chars, to_chars });
        halvings += 1;
    }

    let within_budget = tokens <= policy.max_tokens;
    if !within_budget {
        warn!(tokens, budget = policy.max_tokens, "Prompt still over budget after trimming");
    }

    FittedPrompt {
        prompt,
        tokens,
        budget: policy.max_tokens,
        steps,
        parts,
        within_budget,
    }
}

/// Apply the first applicable structural reduction, if any.
fn reduce_parts(parts: &mut PromptParts, user_text_floor: usize) -> Option<TrimStep> {
    if !parts.history.is_empty() {
        parts.history.remove(0);
        return Some(TrimStep::DroppedHistoryTurn);
    }

    if parts.evidence.len() > 1 {
        let index = removal_index(&parts.evidence)?;
        let removed = parts.evidence.remove(index);
        return Some(TrimStep::DroppedEvidence {
            description: removed.description().to_string(),
            priority: removed.priority(),
        });
    }

    let from_chars = parts.user_text.chars().count();
    if from_chars > user_text_floor {
        let keep = user_text_floor.saturating_sub(ELLIPSIS.len());
        parts.user_text = format!("{}{ELLIPSIS}", truncate_chars(&parts.user_text, keep));
        return Some(TrimStep::TruncatedUserText {
            from_chars,
            to_chars: parts.user_text.chars().count(),
        });
    }

    None
}
