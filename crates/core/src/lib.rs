//! # Caduceus Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! Caduceus clinical grounding runtime. This crate has **no framework
//! dependencies**: it defines the model every other crate implements
//! against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Testing with scripted stand-ins
//! - A clean dependency graph (all crates depend inward on core)

pub mod budget;
pub mod conversation;
pub mod error;
pub mod evidence;
pub mod generator;
pub mod source;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use budget::PromptBudget;
pub use conversation::HistoryTurn;
pub use error::{CacheError, Error, FetchError, GenerationError, Result};
pub use evidence::{
    EvidenceItem, EvidencePriority, MAX_EVIDENCE_CHARS, SourceHit, sanitize_text, truncate_chars,
};
pub use generator::{Generator, TokenCounter, UnavailableGenerator};
pub use source::KnowledgeSource;
pub use store::KvStore;
