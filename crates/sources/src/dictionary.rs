//! Dictionary definitions from dictionaryapi.dev.

use crate::http::HttpGet;
use async_trait::async_trait;
use caduceus_core::{FetchError, KnowledgeSource, SourceHit};
use serde::Deserialize;
use std::sync::Arc;

const BASE_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries/en";

#[derive(Deserialize)]
struct Entry {
    #[serde(default)]
    meanings: Vec<Meaning>,
}

#[derive(Deserialize)]
struct Meaning {
    #[serde(default)]
    definitions: Vec<Definition>,
}

#[derive(Deserialize)]
struct Definition {
    #[serde(default)]
    definition: String,
}

/// Looks up a single term. The text of the hit is the first definition of
/// the first meaning.
pub struct DictionarySource {
    http: Arc<dyn HttpGet>,
}

impl DictionarySource {
    pub fn new(http: Arc<dyn HttpGet>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl KnowledgeSource for DictionarySource {
    fn name(&self) -> &str {
        "dictionary"
    }

    fn label(&self) -> &str {
        "Dictionary definitions"
    }

    async fn fetch(&self, term: &str) -> Result<SourceHit, FetchError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(SourceHit::empty());
        }

        let url = format!("{BASE_URL}/{}", urlencoding::encode(term));
        let reply = self.http.get(&url).await?;
        // Unknown words come back as 404 with a "No Definitions Found" body.
        if reply.status == 404 {
            return Ok(SourceHit::empty());
        }
        let entries: Vec<Entry> = reply.require_success(self.name())?.json(self.name())?;

        let definition = entries
            .into_iter()
            .next()
            .and_then(|e| e.meanings.into_iter().next())
            .and_then(|m| m.definitions.into_iter().next())
            .map(|d| d.definition)
            .filter(|d| !d.trim().is_empty());

        Ok(match definition {
            Some(text) => SourceHit::with_text(text, None),
            None => SourceHit::empty(),
        })
    }
}
