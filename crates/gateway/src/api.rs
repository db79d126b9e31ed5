//! Request handlers: `POST /chat` and `GET /health`.

use crate::SharedState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use caduceus_core::{GenerationError, HistoryTurn};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Absent or `null` means no history.
    #[serde(default)]
    pub history: Option<Vec<HistoryTurn>>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A generation failure as an HTTP response: 503 when no generator is
/// available, 502 for anything the generator reported.
pub struct ApiError(GenerationError);

impl From<GenerationError> for ApiError {
    fn from(e: GenerationError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            GenerationError::NotAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        };
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let history = request.history.unwrap_or_default();
    info!(
        message_chars = request.message.chars().count(),
        history_turns = history.len(),
        "Chat request"
    );

    match state.pipeline.respond(&request.message, &history).await {
        Ok(reply) => Ok(Json(ChatResponse { reply })),
        Err(e) => {
            warn!(error = %e, "Chat request failed");
            Err(e.into())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` when the generator answers its health check, else `degraded`.
    pub status: &'static str,
    pub version: &'static str,
    pub generator: GeneratorHealth,
    pub cache: CacheHealth,
}

#[derive(Debug, Serialize)]
pub struct GeneratorHealth {
    pub name: String,
    pub available: bool,
    pub healthy: bool,
}

#[derive(Debug, Serialize)]
pub struct CacheHealth {
    pub backend: String,
    pub reachable: bool,
}

pub async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let generator = state.pipeline.generator();
    let healthy = generator.is_available()
        && generator.health_check().await.unwrap_or_else(|e| {
            warn!(error = %e, "Generator health check failed");
            false
        });

    let cache = state.pipeline.cache();
    let reachable = cache.round_trip().await.unwrap_or_else(|e| {
        warn!(error = %e, "Cache health check failed");
        false
    });

    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        generator: GeneratorHealth {
            name: generator.name().to_string(),
            available: generator.is_available(),
            healthy,
        },
        cache: CacheHealth {
            backend: cache.backend_name().to_string(),
            reachable,
        },
    })
}
