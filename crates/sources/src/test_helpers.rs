//! Canned HTTP collaborator for fetcher tests.

use crate::http::{HttpGet, HttpReply};
use async_trait::async_trait;
use caduceus_core::FetchError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves fixed replies by exact URL. Unknown URLs get a 404.
#[derive(Default)]
pub struct CannedHttp {
    replies: HashMap<String, Result<HttpReply, FetchError>>,
    requested: Mutex<Vec<String>>,
}

impl CannedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, url: &str, status: u16, body: &str) -> Self {
        self.replies.insert(
            url.to_string(),
            Ok(HttpReply {
                status,
                body: body.to_string(),
            }),
        );
        self
    }

    pub fn fail(mut self, url: &str, err: FetchError) -> Self {
        self.replies.insert(url.to_string(), Err(err));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpGet for CannedHttp {
    async fn get(&self, url: &str) -> Result<HttpReply, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.replies.get(url).cloned().unwrap_or(Ok(HttpReply {
            status: 404,
            body: String::new(),
        }))
    }
}
