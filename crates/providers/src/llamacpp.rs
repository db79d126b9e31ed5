//! llama.cpp server backend.
//!
//! Talks to the native `llama-server` endpoints:
//! - `POST /completion` for text completion
//! - `POST /tokenize` for real token counts
//! - `GET /health` for readiness

use crate::{check_status, http_client, request_error};
use async_trait::async_trait;
use caduceus_core::{GenerationError, Generator};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// A llama.cpp server endpoint.
pub struct LlamaCppGenerator {
    base_url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl LlamaCppGenerator {
    pub fn new(
        base_url: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            temperature,
            client: http_client(timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completion_body(&self, prompt: &str, max_tokens: usize, stop: &[String]) -> serde_json::Value {
        serde_json::json!({
            "prompt": prompt,
            "n_predict": max_tokens,
            "temperature": self.temperature,
            "stop": stop,
            "stream": false,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    #[serde(default)]
    tokens: Vec<u32>,
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str, what: &str) -> Result<T, GenerationError> {
    serde_json::from_str(body).map_err(|e| GenerationError::Api {
        status_code: 200,
        message: format!("Failed to parse {what} response: {e}"),
    })
}

#[async_trait]
impl Generator for LlamaCppGenerator {
    fn name(&self) -> &str {
        "llamacpp"
    }

    async fn generate(
        &self,
        prompt: &str,
        max_tokens: usize,
        stop: &[String],
    ) -> Result<String, GenerationError> {
        let url = format!("{}/completion", self.base_url);
        debug!(url = %url, prompt_chars = prompt.len(), max_tokens, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .json(&self.completion_body(prompt, max_tokens, stop))
            .send()
            .await
            .map_err(request_error)?;
        let body = check_status(self.name(), response)
            .await?
            .text()
            .await
            .map_err(request_error)?;

        let parsed: CompletionResponse = parse_json(&body, "completion")?;
        Ok(parsed.content)
    }

    async fn tokenize(&self, text: &str) -> Result<Vec<u32>, GenerationError> {
        let url = format!("{}/tokenize", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "content": text }))
            .send()
            .await
            .map_err(|e| GenerationError::Tokenize(e.to_string()))?;
        let body = check_status(self.name(), response)
            .await?
            .text()
            .await
            .map_err(|e| GenerationError::Tokenize(e.to_string()))?;

        let parsed: TokenizeResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::Tokenize(format!("Bad tokenize response: {e}")))?;
        Ok(parsed.tokens)
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(request_error)?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    /// Serve `app` on an ephemeral port and return its base URL.
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn generator(base_url: &str) -> LlamaCppGenerator {
        LlamaCppGenerator::new(base_url, 0.2, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        assert_eq!(generator("http://127.0.0.1:8080/").base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn completion_body_shape() {
        let body = generator("http://x").completion_body("User: hi\nAI:", 400, &["User:".into()]);
        assert_eq!(body["prompt"], "User: hi\nAI:");
        assert_eq!(body["n_predict"], 400);
        assert_eq!(body["stop"][0], "User:");
        assert_eq!(body["stream"], false);
    }

    #[tokio::test]
    async fn generate_posts_completion() {
        let seen = Arc::new(Mutex::new(Value::Null));
        let recorder = Arc::clone(&seen);
        let app = Router::new().route(
            "/completion",
            post(move |Json(body): Json<Value>| {
                let recorder = Arc::clone(&recorder);
                async move {
                    *recorder.lock().unwrap() = body;
                    Json(serde_json::json!({ "content": " Rest and nitrates.", "stop": true }))
                }
            }),
        );
        let base = serve(app).await;

        let reply = generator(&base)
            .generate("prompt text", 128, &["User:".into(), "AI:".into()])
            .await
            .unwrap();
        assert_eq!(reply, " Rest and nitrates.");
        let body = seen.lock().unwrap().clone();
        assert_eq!(body["prompt"], "prompt text");
        assert_eq!(body["n_predict"], 128);
    }

    #[tokio::test]
    async fn tokenize_and_health() {
        let app = Router::new()
            .route(
                "/tokenize",
                post(|| async { Json(serde_json::json!({ "tokens": [1, 22, 333] })) }),
            )
            .route("/health", get(|| async { Json(serde_json::json!({ "status": "ok" })) }));
        let base = serve(app).await;
        let generator = generator(&base);

        assert_eq!(generator.tokenize("three tokens here").await.unwrap(), vec![1, 22, 333]);
        assert!(generator.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn server_error_becomes_api_error() {
        let app = Router::new().route(
            "/completion",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "Loading model") }),
        );
        let base = serve(app).await;

        let err = generator(&base).generate("p", 8, &[]).await.unwrap_err();
        match err {
            GenerationError::Api { status_code, message } => {
                assert_eq!(status_code, 503);
                assert_eq!(message, "Loading model");
            }
            other => panic!("Expected Api, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let generator = generator(&format!("http://{addr}"));
        let err = generator.generate("p", 8, &[]).await.unwrap_err();
        assert!(matches!(err, GenerationError::Network(_)));
        assert!(generator.health_check().await.is_err());
    }
}
