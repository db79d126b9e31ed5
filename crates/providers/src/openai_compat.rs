//! OpenAI-compatible completions backend.
//!
//! Works with: OpenAI, vLLM, Ollama, llama.cpp's `/v1` shim, Together AI,
//! and any endpoint exposing the legacy `/completions` route.
//!
//! These APIs expose no tokenizer, so token counting falls back to the
//! length estimate.

use crate::{check_status, http_client, request_error};
use async_trait::async_trait;
use caduceus_core::{GenerationError, Generator};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// An OpenAI-compatible completions endpoint.
pub struct OpenAiCompatGenerator {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatGenerator {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
            temperature: 0.2,
            client: http_client(timeout)?,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completion_body(&self, prompt: &str, max_tokens: usize, stop: &[String]) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "max_tokens": max_tokens,
            "temperature": self.temperature,
            "stream": false,
        });
        if !stop.is_empty() {
            // The API accepts at most four stop sequences.
            body["stop"] = serde_json::json!(stop.iter().take(4).collect::<Vec<_>>());
        }
        body
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    text: String,
}

fn parse_completion(body: &str) -> Result<String, GenerationError> {
    let response: ApiResponse = serde_json::from_str(body).map_err(|e| GenerationError::Api {
        status_code: 200,
        message: format!("Failed to parse response: {e}"),
    })?;
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.text)
        .ok_or_else(|| GenerationError::Api {
            status_code: 200,
            message: "No choices in response".into(),
        })
}

#[async_trait]
impl Generator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        prompt: &str,
        max_tokens: usize,
        stop: &[String],
    ) -> Result<String, GenerationError> {
        let url = format!("{}/completions", self.base_url);
        debug!(generator = %self.name, model = %self.model, "Sending completion request");

        let response = self
            .authorized(self.client.post(&url))
            .json(&self.completion_body(prompt, max_tokens, stop))
            .send()
            .await
            .map_err(request_error)?;
        let body = check_status(&self.name, response)
            .await?
            .text()
            .await
            .map_err(request_error)?;

        parse_completion(&body)
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        let response = self
            .authorized(self.client.get(format!("{}/models", self.base_url)))
            .send()
            .await
            .map_err(request_error)?;
        Ok(response.status().is_success())
    }
}
