//! PubMed article titles via NCBI E-utilities (esearch + esummary).

use crate::http::HttpGet;
use async_trait::async_trait;
use caduceus_core::{FetchError, KnowledgeSource, SourceHit};
use serde::Deserialize;
use std::sync::Arc;

const EUTILS: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const ARTICLE_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";
const LIMIT: usize = 2;

#[derive(Deserialize)]
struct SearchResponse {
    esearchresult: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    result: serde_json::Map<String, serde_json::Value>,
}

/// The hit text is `title (journal)` of the first search result that has
/// a title; the url points at the article page.
pub struct PubMedSource {
    http: Arc<dyn HttpGet>,
}

impl PubMedSource {
    pub fn new(http: Arc<dyn HttpGet>) -> Self {
        Self { http }
    }

    fn search_url(query: &str) -> String {
        format!(
            "{EUTILS}/esearch.fcgi?db=pubmed&retmode=json&retmax={LIMIT}&term={}",
            urlencoding::encode(query.trim())
        )
    }

    fn summary_url(ids: &[String]) -> String {
        format!("{EUTILS}/esummary.fcgi?db=pubmed&retmode=json&id={}", ids.join(","))
    }
}

#[async_trait]
impl KnowledgeSource for PubMedSource {
    fn name(&self) -> &str {
        "pubmed"
    }

    fn label(&self) -> &str {
        "PubMed"
    }

    async fn fetch(&self, query: &str) -> Result<SourceHit, FetchError> {
        if query.trim().is_empty() {
            return Ok(SourceHit::empty());
        }

        let search: SearchResponse = self
            .http
            .get(&Self::search_url(query))
            .await?
            .require_success(self.name())?
            .json(self.name())?;
        let ids = search.esearchresult.idlist;
        if ids.is_empty() {
            return Ok(SourceHit::empty());
        }

        let summaries: SummaryResponse = self
            .http
            .get(&Self::summary_url(&ids))
            .await?
            .require_success(self.name())?
            .json(self.name())?;

        for id in &ids {
            let Some(record) = summaries.result.get(id) else {
                continue;
            };
            let title = record["title"].as_str().unwrap_or_default().trim();
            if title.is_empty() {
                continue;
            }
            let text = match record["source"].as_str().map(str::trim) {
                Some(journal) if !journal.is_empty() => format!("{title} ({journal})"),
                _ => title.to_string(),
            };
            return Ok(SourceHit::with_text(text, Some(format!("{ARTICLE_URL}/{id}/"))));
        }

        Ok(SourceHit::empty())
    }
}
