//! Evidence grounding: key terms, relevant sentences, the local reference
//! library and the aggregator that orders them all.

pub mod aggregator;
pub mod reference;
pub mod relevance;
pub mod terms;

pub use aggregator::{AggregatorSettings, DEFINITIONS_LABEL, EvidenceAggregator, cap_evidence};
pub use reference::{ReferenceEntry, ReferenceLibrary};
pub use relevance::{RelevanceSelector, split_sentences, trim_to_sentences};
pub use terms::{HeuristicTagger, PhraseTagger, Span, TermExtractor};
