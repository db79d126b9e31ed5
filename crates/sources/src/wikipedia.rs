//! Wikipedia page summaries via the REST API.

use crate::http::HttpGet;
use async_trait::async_trait;
use caduceus_core::{FetchError, KnowledgeSource, SourceHit};
use serde::Deserialize;
use std::sync::Arc;

const SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";
const PAGE_URL: &str = "https://en.wikipedia.org/wiki";

#[derive(Deserialize)]
struct Summary {
    #[serde(default)]
    extract: Option<String>,
}

pub struct WikipediaSource {
    http: Arc<dyn HttpGet>,
}

impl WikipediaSource {
    pub fn new(http: Arc<dyn HttpGet>) -> Self {
        Self { http }
    }
}

/// `chest pain` → `chest_pain`, percent-encoded.
fn page_title(query: &str) -> String {
    let underscored = query.split_whitespace().collect::<Vec<_>>().join("_");
    urlencoding::encode(&underscored).into_owned()
}

#[async_trait]
impl KnowledgeSource for WikipediaSource {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn label(&self) -> &str {
        "Wikipedia"
    }

    async fn fetch(&self, query: &str) -> Result<SourceHit, FetchError> {
        let title = page_title(query);
        if title.is_empty() {
            return Ok(SourceHit::empty());
        }

        let reply = self.http.get(&format!("{SUMMARY_URL}/{title}")).await?;
        if reply.status == 404 {
            return Ok(SourceHit::empty());
        }
        let summary: Summary = reply.require_success(self.name())?.json(self.name())?;

        Ok(match summary.extract.filter(|e| !e.trim().is_empty()) {
            Some(extract) => SourceHit::with_text(extract, Some(format!("{PAGE_URL}/{title}"))),
            None => SourceHit::empty(),
        })
    }
}
