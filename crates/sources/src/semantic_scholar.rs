//! Paper abstracts from the Semantic Scholar graph API.

use crate::http::HttpGet;
use async_trait::async_trait;
use caduceus_core::{FetchError, KnowledgeSource, SourceHit};
use serde::Deserialize;
use std::sync::Arc;

const SEARCH_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
const LIMIT: usize = 2;

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Deserialize)]
struct Paper {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// The hit is the first paper (of the top two) that has an abstract. The
/// paper title is kept so the evidence line can name it.
pub struct SemanticScholarSource {
    http: Arc<dyn HttpGet>,
}

impl SemanticScholarSource {
    pub fn new(http: Arc<dyn HttpGet>) -> Self {
        Self { http }
    }

    fn search_url(query: &str) -> String {
        format!(
            "{SEARCH_URL}?query={}&limit={LIMIT}&fields=title,abstract,url",
            urlencoding::encode(query.trim())
        )
    }
}

#[async_trait]
impl KnowledgeSource for SemanticScholarSource {
    fn name(&self) -> &str {
        "semantic_scholar"
    }

    fn label(&self) -> &str {
        "Semantic Scholar"
    }

    async fn fetch(&self, query: &str) -> Result<SourceHit, FetchError> {
        if query.trim().is_empty() {
            return Ok(SourceHit::empty());
        }

        let response: SearchResponse = self
            .http
            .get(&Self::search_url(query))
            .await?
            .require_success(self.name())?
            .json(self.name())?;

        let paper = response
            .data
            .into_iter()
            .find(|p| p.abstract_text.as_deref().is_some_and(|a| !a.trim().is_empty()));

        Ok(match paper {
            Some(paper) => {
                let hit = SourceHit::with_text(
                    paper.abstract_text.unwrap_or_default(),
                    paper.url.filter(|u| !u.is_empty()),
                );
                match paper.title.filter(|t| !t.trim().is_empty()) {
                    Some(title) => hit.titled(title),
                    None => hit,
                }
            }
            None => SourceHit::empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::CannedHttp;

    #[tokio::test]
    async fn skips_papers_without_abstract() {
        let body = r#"{"total":2,"data":[
            {"paperId":"a","title":"No abstract here","abstract":null,"url":"https://s2/a"},
            {"paperId":"b","title":"SGLT2 inhibitors in HFrEF","abstract":"Dapagliflozin reduced worsening heart failure.","url":"https://s2/b"}]}"#;
        let http = CannedHttp::new().reply(
            &SemanticScholarSource::search_url("heart failure"),
            200,
            body,
        );

        let hit = SemanticScholarSource::new(Arc::new(http))
            .fetch("heart failure")
            .await
            .unwrap();
        assert_eq!(hit.title.as_deref(), Some("SGLT2 inhibitors in HFrEF"));
        assert_eq!(hit.text(), Some("Dapagliflozin reduced worsening heart failure."));
        assert_eq!(hit.url.as_deref(), Some("https://s2/b"));
    }

    #[tokio::test]
    async fn no_papers_is_empty() {
        let http = CannedHttp::new().reply(
            &SemanticScholarSource::search_url("xyz"),
            200,
            r#"{"total":0}"#,
        );
        let hit = SemanticScholarSource::new(Arc::new(http)).fetch("xyz").await.unwrap();
        assert!(hit.is_empty());
    }

    #[test]
    fn search_url_shape() {
        assert_eq!(
            SemanticScholarSource::search_url("chest pain"),
            "https://api.semanticscholar.org/graph/v1/paper/search?query=chest%20pain&limit=2&fields=title,abstract,url"
        );
    }
}
