//! Knowledge-source fetchers for Caduceus.
//!
//! Every fetcher implements [`KnowledgeSource`] over the [`HttpGet`]
//! collaborator and returns one uniform [`SourceHit`]:
//!
//! | name | provider |
//! |------|----------|
//! | `dictionary` | dictionaryapi.dev definitions |
//! | `wikipedia` | Wikipedia REST summaries |
//! | `medlineplus` | MedlinePlus search + article |
//! | `cdc` | CDC search + page |
//! | `mayo` | Mayo Clinic drug pages |
//! | `semantic_scholar` | Semantic Scholar abstracts |
//! | `pubmed` | PubMed titles |
//!
//! [`CachedSource`] puts any fetcher behind the shared [`Cache`].

pub mod dictionary;
pub mod http;
pub mod pubmed;
pub mod semantic_scholar;
pub mod site;
pub mod wikipedia;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use dictionary::DictionarySource;
pub use http::{HttpGet, HttpReply, ReqwestClient};
pub use pubmed::PubMedSource;
pub use semantic_scholar::SemanticScholarSource;
pub use site::{CDC, MAYO_CLINIC, MEDLINEPLUS, Site, SiteSource};
pub use wikipedia::WikipediaSource;

use async_trait::async_trait;
use caduceus_cache::Cache;
use caduceus_config::SourcesConfig;
use caduceus_core::{FetchError, KnowledgeSource, SourceHit};
use std::sync::Arc;
use tracing::warn;

/// A fetcher whose results go through the cache, keyed by source name and
/// query.
pub struct CachedSource {
    inner: Arc<dyn KnowledgeSource>,
    cache: Cache,
}

impl CachedSource {
    pub fn new(inner: Arc<dyn KnowledgeSource>, cache: Cache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl KnowledgeSource for CachedSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn label(&self) -> &str {
        self.inner.label()
    }

    async fn fetch(&self, query: &str) -> Result<SourceHit, FetchError> {
        self.cache
            .lookup(self.inner.name(), &[query], || self.inner.fetch(query))
            .await
    }
}

/// The shared HTTP client described by `[sources]`.
pub fn http_client(config: &SourcesConfig) -> Result<Arc<dyn HttpGet>, FetchError> {
    Ok(Arc::new(ReqwestClient::new(config.timeout(), &config.user_agent)?))
}

/// A chain fetcher by config name. `None` for unknown names.
pub fn source_by_name(name: &str, http: Arc<dyn HttpGet>) -> Option<Arc<dyn KnowledgeSource>> {
    let source: Arc<dyn KnowledgeSource> = match name {
        "wikipedia" => Arc::new(WikipediaSource::new(http)),
        "medlineplus" => Arc::new(SiteSource::new(MEDLINEPLUS, http)),
        "cdc" => Arc::new(SiteSource::new(CDC, http)),
        "mayo" => Arc::new(SiteSource::new(MAYO_CLINIC, http)),
        "semantic_scholar" => Arc::new(SemanticScholarSource::new(http)),
        "pubmed" => Arc::new(PubMedSource::new(http)),
        _ => return None,
    };
    Some(source)
}

/// Cache-wrapped fetchers for `names`, in order.
pub fn build_chain(
    names: &[String],
    http: Arc<dyn HttpGet>,
    cache: &Cache,
) -> Vec<Arc<dyn KnowledgeSource>> {
    names
        .iter()
        .filter_map(|name| match source_by_name(name, Arc::clone(&http)) {
            Some(source) => Some(Arc::new(CachedSource::new(source, cache.clone()))
                as Arc<dyn KnowledgeSource>),
            None => {
                warn!(source = %name, "Unknown knowledge source, skipping");
                None
            }
        })
        .collect()
}

/// The cache-wrapped dictionary fetcher.
pub fn build_dictionary(http: Arc<dyn HttpGet>, cache: &Cache) -> Arc<dyn KnowledgeSource> {
    Arc::new(CachedSource::new(
        Arc::new(DictionarySource::new(http)),
        cache.clone(),
    ))
}
