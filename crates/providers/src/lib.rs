//! Text-generation backends for Caduceus.
//!
//! All backends implement the `caduceus_core::Generator` trait.
//! The router builds the configured chain.

pub mod fallback;
pub mod llamacpp;
#[cfg(feature = "local")]
pub mod local;
pub mod openai_compat;
pub mod router;

pub use fallback::FallbackGenerator;
pub use llamacpp::LlamaCppGenerator;
#[cfg(feature = "local")]
pub use local::LocalTokenizer;
pub use openai_compat::OpenAiCompatGenerator;
pub use router::{build_counter, build_from_config, endpoint_generator};

use caduceus_core::GenerationError;
use std::time::Duration;
use tracing::warn;

/// A reqwest client with the endpoint's timeout.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, GenerationError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GenerationError::Network(format!("Failed to create HTTP client: {e}")))
}

pub(crate) fn request_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout(e.to_string())
    } else {
        GenerationError::Network(e.to_string())
    }
}

/// Pass 2xx responses through; turn anything else into `Api` with the body.
pub(crate) async fn check_status(
    backend: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(backend, status = status.as_u16(), body = %body, "Generator returned error");
    Err(GenerationError::Api {
        status_code: status.as_u16(),
        message: if body.is_empty() {
            status.to_string()
        } else {
            body
        },
    })
}
