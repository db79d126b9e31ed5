//! Evidence domain types.
//!
//! An [`EvidenceItem`] is one attributed fragment of grounding text. A
//! [`SourceHit`] is the raw, uniform result of a single knowledge source
//! before it has been narrowed down to the relevant sentences.

use serde::{Deserialize, Serialize};

/// Upper bound on the characters of content carried by one evidence item.
pub const MAX_EVIDENCE_CHARS: usize = 600;

/// How valuable an evidence item is. Ordering is significant:
/// `Pinned > Reference > Definition > Lookup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidencePriority {
    /// Free-text lookups against external knowledge bases and sites.
    Lookup,
    /// Dictionary definitions of extracted key terms.
    Definition,
    /// Locally-held clinical reference content matched by keyword.
    Reference,
    /// Always-include guidance. Never dropped while anything else remains.
    Pinned,
}

impl EvidencePriority {
    pub fn is_pinned(self) -> bool {
        self == Self::Pinned
    }
}

/// One unit of grounding text attributed to one named source.
///
/// Immutable once constructed. Content is always sanitized, bounded to
/// [`MAX_EVIDENCE_CHARS`] and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    description: String,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    priority: EvidencePriority,
}

impl EvidenceItem {
    /// Build an item, or `None` when the content is empty after sanitizing.
    pub fn new(
        description: impl Into<String>,
        content: &str,
        url: Option<String>,
        priority: EvidencePriority,
    ) -> Option<Self> {
        let content = sanitize_text(content, MAX_EVIDENCE_CHARS);
        if content.is_empty() {
            return None;
        }
        Some(Self {
            description: description.into(),
            content,
            url: url.filter(|u| !u.trim().is_empty()),
            priority,
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn priority(&self) -> EvidencePriority {
        self.priority
    }

    pub fn is_pinned(&self) -> bool {
        self.priority.is_pinned()
    }
}

/// The uniform result shape returned by every knowledge source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHit {
    /// Free text returned by the source, if any.
    #[serde(default)]
    pub text: Option<String>,

    /// Canonical URL of the page the text came from.
    #[serde(default)]
    pub url: Option<String>,

    /// Title of the record (papers, articles), if the source has one.
    #[serde(default)]
    pub title: Option<String>,
}

impl SourceHit {
    /// The "no result" sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>, url: Option<String>) -> Self {
        Self {
            text: Some(text.into()),
            url,
            title: None,
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// True when the hit carries no usable text.
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(|t| t.trim().is_empty())
    }

    /// The text, if non-blank.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Apply content-safety normalization to every string payload.
    pub fn sanitize(&mut self, max_chars: usize) {
        for field in [&mut self.text, &mut self.url, &mut self.title] {
            if let Some(value) = field.as_mut() {
                *value = sanitize_text(value, max_chars);
            }
        }
    }
}

/// Content-safety normalization for text that ends up in a prompt.
///
/// Control characters other than newline become spaces, runs of spaces
/// collapse, and the result is cut to `max_chars` characters and trimmed.
pub fn sanitize_text(text: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(text.len().min(max_chars * 4));
    let mut last_space = false;
    let mut count = 0;

    for c in text.chars() {
        if count >= max_chars {
            break;
        }
        let c = if c == '\n' {
            c
        } else if c.is_control() || c.is_whitespace() {
            ' '
        } else {
            c
        };
        if c == ' ' {
            if last_space {
                continue;
            }
            last_space = true;
        } else {
            last_space = false;
        }
        out.push(c);
        count += 1;
    }

    out.trim().to_string()
}

/// Cut `text` to at most `max_chars` characters without splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
