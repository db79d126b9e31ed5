//! KnowledgeSource trait: one external provider of grounding text.

use async_trait::async_trait;
use crate::error::FetchError;
use crate::evidence::SourceHit;

/// Each fetcher (Wikipedia, PubMed, MedlinePlus, ...) implements this trait.
///
/// A fetch that finds nothing returns `Ok(SourceHit::empty())`; `Err` is
/// reserved for failures (network, status, parse, timeout).
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Stable identifier. Used as the cache logical key and in config.
    fn name(&self) -> &str;

    /// Human-readable attribution, used as the evidence description.
    fn label(&self) -> &str;

    /// Look up `query`.
    async fn fetch(&self, query: &str) -> std::result::Result<SourceHit, FetchError>;
}
