//! Conversation history as sent by the client.

use serde::{Deserialize, Serialize};

/// One prior exchange. Missing fields deserialize as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub ai: String,
}

impl HistoryTurn {
    pub fn new(user: impl Into<String>, ai: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ai: ai.into(),
        }
    }

    /// The most recent `limit` turns, in chronological order.
    pub fn recent(history: &[HistoryTurn], limit: usize) -> &[HistoryTurn] {
        let start = history.len().saturating_sub(limit);
        &history[start..]
    }
}
