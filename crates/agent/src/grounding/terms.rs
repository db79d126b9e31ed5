//! Key-term extraction.
//!
//! Candidates come from three channels, merged into one ordered list:
//!
//! 1. noun-phrase spans from the [`PhraseTagger`]
//! 2. named-entity spans from the [`PhraseTagger`]
//! 3. bare alphabetic words of five or more letters
//!
//! The third channel needs no tagger, so any text with a long word yields
//! at least one term. Candidates shorter than the minimum are discarded,
//! the rest are lower-cased, sorted by (first offset, channel, longer
//! first), de-duplicated and capped.

use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

/// Candidates must be longer than this many chars.
const MIN_TERM_CHARS: usize = 4;

/// Longest noun phrase, in words.
const MAX_PHRASE_WORDS: usize = 4;

static LONG_WORD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z]{5,}\b").ok());

/// A tagged span of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    /// Byte offset of the span in the input.
    pub offset: usize,
}

impl Span {
    pub fn new(text: impl Into<String>, offset: usize) -> Self {
        Self {
            text: text.into(),
            offset,
        }
    }
}

/// Noun-phrase and entity span extraction.
pub trait PhraseTagger: Send + Sync {
    fn noun_phrases(&self, text: &str) -> Vec<Span>;
    fn entities(&self, text: &str) -> Vec<Span>;
}

/// Rule-based tagger.
///
/// Noun phrases are runs of up to four consecutive content words, broken by
/// stopwords and punctuation. Entities are runs of capitalised words that
/// do not open a sentence, acronyms, and tokens mixing letters and digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTagger;

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "been", "before", "being", "between", "both", "but", "by", "can", "could", "did", "do",
    "does", "doing", "during", "each", "either", "for", "from", "had", "has", "have", "having",
    "he", "her", "here", "hers", "him", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "just", "may", "me", "might", "more", "most", "must", "my", "no", "nor", "not", "now", "of",
    "on", "only", "or", "other", "our", "ours", "over", "own", "same", "she", "should", "so",
    "some", "such", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "those", "through", "to", "too", "under", "until", "up", "very", "was", "we",
    "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with",
    "without", "would", "you", "your", "yours",
];

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word.to_ascii_lowercase().as_str())
}

/// A word token with its byte range and whether only whitespace separates
/// it from the previous token.
struct Token<'a> {
    text: &'a str,
    start: usize,
    end: usize,
    joined: bool,
    sentence_start: bool,
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let is_word_char = |c: char| c.is_alphanumeric() || c == '-' || c == '\'';
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut gap_clean = false;
    let mut sentence_start = true;

    for (i, c) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
        match (start, is_word_char(c) && i < text.len()) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                tokens.push(Token {
                    text: &text[s..i],
                    start: s,
                    end: i,
                    joined: gap_clean && !tokens.is_empty(),
                    sentence_start,
                });
                start = None;
                gap_clean = true;
                sentence_start = false;
            }
            _ => {}
        }
        if start.is_none() && i < text.len() && !c.is_whitespace() && !is_word_char(c) {
            gap_clean = false;
            if matches!(c, '.' | '!' | '?') {
                sentence_start = true;
            }
        }
    }
    tokens
}

fn spans_of_runs(text: &str, tokens: &[Token<'_>], runs: Vec<(usize, usize)>) -> Vec<Span> {
    runs.into_iter()
        .map(|(first, last)| Span::new(&text[tokens[first].start..tokens[last].end], tokens[first].start))
        .collect()
}

impl PhraseTagger for HeuristicTagger {
    fn noun_phrases(&self, text: &str) -> Vec<Span> {
        let tokens = tokenize(text);
        let mut runs = Vec::new();
        let mut current: Option<(usize, usize)> = None;

        for (i, token) in tokens.iter().enumerate() {
            let content = !is_stopword(token.text) && token.text.chars().any(char::is_alphabetic);
            current = match (current, content) {
                (Some((first, _)), true) if token.joined && i - first < MAX_PHRASE_WORDS => {
                    Some((first, i))
                }
                (Some(run), true) => {
                    runs.push(run);
                    Some((i, i))
                }
                (None, true) => Some((i, i)),
                (Some(run), false) => {
                    runs.push(run);
                    None
                }
                (None, false) => None,
            };
        }
        if let Some(run) = current {
            runs.push(run);
        }
        spans_of_runs(text, &tokens, runs)
    }

    fn entities(&self, text: &str) -> Vec<Span> {
        let tokens = tokenize(text);
        let is_entity = |t: &Token<'_>| {
            let letters = t.text.chars().filter(|c| c.is_alphabetic()).count();
            let upper = t.text.chars().filter(|c| c.is_uppercase()).count();
            let has_digit = t.text.chars().any(|c| c.is_ascii_digit());
            let capitalised = t.text.chars().next().is_some_and(char::is_uppercase);
            (upper >= 2 && letters > 0)
                || (has_digit && letters > 0)
                || (capitalised && !t.sentence_start && !is_stopword(t.text))
        };

        let mut runs = Vec::new();
        let mut current: Option<(usize, usize)> = None;
        for (i, token) in tokens.iter().enumerate() {
            current = match (current, is_entity(token)) {
                (Some((first, _)), true) if token.joined => Some((first, i)),
                (Some(run), true) => {
                    runs.push(run);
                    Some((i, i))
                }
                (None, true) => Some((i, i)),
                (Some(run), false) => {
                    runs.push(run);
                    None
                }
                (None, false) => None,
            };
        }
        if let Some(run) = current {
            runs.push(run);
        }
        spans_of_runs(text, &tokens, runs)
    }
}

/// Turns free text into a short, ordered list of lower-cased key terms.
#[derive(Clone)]
pub struct TermExtractor {
    tagger: Arc<dyn PhraseTagger>,
    max_terms: usize,
}

impl TermExtractor {
    pub fn new(tagger: Arc<dyn PhraseTagger>, max_terms: usize) -> Self {
        Self { tagger, max_terms }
    }

    /// The rule-based tagger with the given cap.
    pub fn heuristic(max_terms: usize) -> Self {
        Self::new(Arc::new(HeuristicTagger), max_terms)
    }

    pub fn max_terms(&self) -> usize {
        self.max_terms
    }

    /// Extract at most `max_terms` terms. Blank input yields none.
    pub fn extract_terms(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() || self.max_terms == 0 {
            return Vec::new();
        }

        // (offset, channel, text)
        let mut candidates: Vec<(usize, u8, String)> = Vec::new();
        for span in self.tagger.noun_phrases(text) {
            candidates.push((span.offset, 0, span.text));
        }
        for span in self.tagger.entities(text) {
            candidates.push((span.offset, 1, span.text));
        }
        if let Some(re) = LONG_WORD.as_ref() {
            for m in re.find_iter(text) {
                candidates.push((m.start(), 2, m.as_str().to_string()));
            }
        }

        candidates.retain(|(_, _, t)| t.trim().chars().count() > MIN_TERM_CHARS);
        candidates.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then(b.2.len().cmp(&a.2.len()))
        });

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .map(|(_, _, t)| t.trim().to_lowercase())
            .filter(|t| seen.insert(t.clone()))
            .take(self.max_terms)
            .collect()
    }
}

impl Default for TermExtractor {
    fn default() -> Self {
        Self::heuristic(5)
    }
}
