use serde::{Deserialize, Serialize};

/// Process-wide token budget, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBudget {
    /// Total context window of the generator, in tokens.
    pub context_window: usize,
    /// Tokens held back for the completion.
    pub reserved_for_generation: usize,
}

impl PromptBudget {
    pub fn new(context_window: usize, reserved_for_generation: usize) -> Self {
        Self {
            context_window,
            reserved_for_generation,
        }
    }

    /// Tokens the composed prompt may occupy.
    pub fn max_prompt_tokens(&self) -> usize {
        self.context_window.saturating_sub(self.reserved_for_generation)
    }
}

impl Default for PromptBudget {
    fn default() -> Self {
        Self::new(1024, 400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget() {
        assert_eq!(PromptBudget::default().max_prompt_tokens(), 624);
    }

    #[test]
    fn reservation_larger_than_window_saturates() {
        assert_eq!(PromptBudget::new(100, 400).max_prompt_tokens(), 0);
    }
}
