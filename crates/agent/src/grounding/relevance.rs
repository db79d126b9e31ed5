//! Query-relevant sentence selection.

use super::terms::TermExtractor;

/// Split prose into sentences: a break follows any of `.`, `!` or `?`
/// when whitespace comes next. Sentences are trimmed and blanks dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace())
        {
            let end = i + c.len_utf8();
            sentences.push(&text[start..end]);
            start = end;
        }
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// The first `max_sentences` sentences of `text`, joined by single spaces.
pub fn trim_to_sentences(text: &str, max_sentences: usize) -> String {
    split_sentences(text)
        .into_iter()
        .take(max_sentences)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Picks the sentences of a passage that mention the query's key terms.
#[derive(Clone)]
pub struct RelevanceSelector {
    extractor: TermExtractor,
    max_sentences: usize,
}

impl RelevanceSelector {
    pub fn new(extractor: TermExtractor, max_sentences: usize) -> Self {
        Self {
            extractor,
            max_sentences: max_sentences.max(1),
        }
    }

    pub fn max_sentences(&self) -> usize {
        self.max_sentences
    }

    /// Up to `max_sentences` sentences containing any query term
    /// (case-insensitive substring), in text order. When none match, the
    /// leading sentences are returned instead, so the result is empty only
    /// when `text` has no sentences at all.
    pub fn select_relevant(&self, text: &str, query: &str) -> String {
        let sentences = split_sentences(text);
        let terms = self.extractor.extract_terms(query);

        let matching: Vec<&str> = sentences
            .iter()
            .copied()
            .filter(|sentence| {
                let lower = sentence.to_lowercase();
                terms.iter().any(|term| lower.contains(term.as_str()))
            })
            .take(self.max_sentences)
            .collect();

        if matching.is_empty() {
            sentences
                .into_iter()
                .take(self.max_sentences)
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            matching.join(" ")
        }
    }
}

impl Default for RelevanceSelector {
    fn default() -> Self {
        Self::new(TermExtractor::default(), 2)
    }
}
