//! HTTP collaborator used by every fetcher.

use async_trait::async_trait;
use caduceus_core::FetchError;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Status and body of a completed GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail with [`FetchError::Status`] unless 2xx.
    pub fn require_success(self, source_name: &str) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                source_name: source_name.into(),
                status: self.status,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self, source_name: &str) -> Result<T, FetchError> {
        serde_json::from_str(&self.body).map_err(|e| FetchError::parse(source_name, e))
    }
}

/// Timeout-bounded GET.
#[async_trait]
pub trait HttpGet: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpReply, FetchError>;
}

/// [`HttpGet`] over a shared `reqwest::Client`.
pub struct ReqwestClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::network("http-client", e))?;
        Ok(Self { client, timeout })
    }
}

/// The host part of `url`, used to attribute transport errors.
fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[async_trait]
impl HttpGet for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpReply, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    source_name: host_of(url),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                FetchError::network(&host_of(url), e)
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::network(&host_of(url), e))?;

        Ok(HttpReply { status, body })
    }
}
