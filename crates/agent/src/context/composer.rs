//! Prompt composition: renders one completion prompt from its parts.
//!
//! Layout, in fixed order:
//!
//! | Section | Content |
//! |---------|---------|
//! | Preamble | clinical instructions |
//! | `[Background Knowledge]` | `[i] description: content`, priority order |
//! | `[Sources]` | `[i] description: url`, items with a URL only |
//! | History | last `history_limit` turns as `User:` / `AI:` lines |
//! | Question | `User: {user_text}` |
//! | Cue | `AI: Let's analyze and reason step by step.` |
//!
//! # Determinism
//!
//! Composition is a pure function of its inputs: no I/O, no clock, no
//! randomness. The trimmer relies on this to recompose after every
//! reduction. Changing one input changes only that input's section.

use caduceus_core::{EvidenceItem, HistoryTurn};
use serde::{Deserialize, Serialize};

/// Built-in instruction preamble for clinical question answering.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an evidence-based medical assistant for clinicians and pharmacists. \
You have access to dictionary definitions, research articles, clinical guidelines, and trusted health sites. \
First explain any key terms using the dictionary definitions provided. \
Tailor your answer to the clinical context: if the scenario is psychiatric, focus on psychiatric assessment and management; \
discuss cardiac or hemodynamic issues only when the context is medical or cardiac. \
If the prompt includes clinical data (e.g., EF 25%), recognize the clinical context (e.g., HFrEF). \
Prioritize guideline recommendations and RCT evidence, and mention class of recommendation or level of evidence when available. \
Start with a **Clinical Summary**: a concise, actionable recommendation. \
Then give details with bullet points, bold key terms, and headings. \
Mention hemodynamic stability, risk stratification (e.g., CHA2DS2-VASc), contraindications, and cautions where relevant. \
If guidelines differ, explain the differences. If further workup or specialist input is needed, say so. \
If the context is unclear, list possible differentials or ask clarifying questions. \
Cite sources as [1], [2], etc. If you are unsure, say so. This is not medical advice.";

/// The generation cue that ends every prompt.
pub const GENERATION_CUE: &str = "AI: Let's analyze and reason step by step.";

/// The mutable inputs of one prompt. The trimmer works on an owned copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptParts {
    /// Evidence in priority order (index 0 = highest).
    pub evidence: Vec<EvidenceItem>,
    /// Chronological history.
    pub history: Vec<HistoryTurn>,
    pub user_text: String,
}

impl PromptParts {
    pub fn new(evidence: Vec<EvidenceItem>, history: Vec<HistoryTurn>, user_text: impl Into<String>) -> Self {
        Self {
            evidence,
            history,
            user_text: user_text.into(),
        }
    }
}

/// Renders prompts. Stateless apart from its settings; create one and reuse it.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    preamble: String,
    history_limit: usize,
}

impl PromptComposer {
    pub fn new(preamble: impl Into<String>, history_limit: usize) -> Self {
        Self {
            preamble: preamble.into(),
            history_limit,
        }
    }

    /// The built-in clinical preamble with the given history window.
    pub fn clinical(history_limit: usize) -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT, history_limit)
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Render a prompt from its parts.
    pub fn compose(
        &self,
        evidence: &[EvidenceItem],
        history: &[HistoryTurn],
        user_text: &str,
    ) -> String {
        let mut out = String::new();

        // ── Preamble ───────────────────────────────────────────────────────
        out.push_str(self.preamble.trim_end());
        out.push('\n');

        // ── Evidence ───────────────────────────────────────────────────────
        if !evidence.is_empty() {
            out.push_str("\n[Background Knowledge]\n");
            for (i, item) in evidence.iter().enumerate() {
                out.push_str(&format!("[{}] {}: {}\n", i + 1, item.description(), item.content()));
            }

            if evidence.iter().any(|item| item.url().is_some()) {
                out.push_str("\n[Sources]\n");
                for (i, item) in evidence.iter().enumerate() {
                    if let Some(url) = item.url() {
                        out.push_str(&format!("[{}] {}: {}\n", i + 1, item.description(), url));
                    }
                }
            }
        }

        // ── Conversation ───────────────────────────────────────────────────
        out.push('\n');
        for turn in HistoryTurn::recent(history, self.history_limit) {
            out.push_str(&format!("User: {}\nAI: {}\n", turn.user, turn.ai));
        }
        out.push_str(&format!("User: {user_text}\n"));
        out.push_str(GENERATION_CUE);

        out
    }

    /// Render [`PromptParts`].
    pub fn render(&self, parts: &PromptParts) -> String {
        self.compose(&parts.evidence, &parts.history, &parts.user_text)
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::clinical(3)
    }
}
