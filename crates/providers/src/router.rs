//! Generator construction from configuration.
//!
//! Zero endpoints give the "not available" sentinel, one endpoint is used
//! directly, and several become a [`FallbackGenerator`] tried in order.

use crate::fallback::FallbackGenerator;
use crate::llamacpp::LlamaCppGenerator;
use crate::openai_compat::OpenAiCompatGenerator;
use caduceus_config::{EndpointConfig, EndpointKind, GeneratorConfig};
use caduceus_core::{GenerationError, Generator, TokenCounter, UnavailableGenerator};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Model name sent to OpenAI-compatible endpoints when none is configured.
const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo-instruct";

/// Build one endpoint's generator.
pub fn endpoint_generator(
    endpoint: &EndpointConfig,
    temperature: f32,
) -> Result<Arc<dyn Generator>, GenerationError> {
    let generator: Arc<dyn Generator> = match endpoint.kind {
        EndpointKind::Llamacpp => Arc::new(LlamaCppGenerator::new(
            &endpoint.base_url,
            temperature,
            endpoint.timeout(),
        )?),
        EndpointKind::Openai => {
            let model = endpoint.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL);
            let mut generator =
                OpenAiCompatGenerator::new("openai", &endpoint.base_url, model, endpoint.timeout())?
                    .with_temperature(temperature);
            if let Some(key) = &endpoint.api_key {
                generator = generator.with_api_key(key);
            }
            Arc::new(generator)
        }
    };
    Ok(generator)
}

/// Build the generator described by `[generator]`.
pub fn build_from_config(config: &GeneratorConfig) -> Result<Arc<dyn Generator>, GenerationError> {
    match config.endpoints.as_slice() {
        [] => {
            info!("No generator endpoint configured, generation unavailable");
            Ok(Arc::new(UnavailableGenerator::default()))
        }
        [endpoint] => {
            info!(kind = ?endpoint.kind, url = %endpoint.base_url, "Generator configured");
            endpoint_generator(endpoint, config.temperature)
        }
        endpoints => {
            let mut fallback = FallbackGenerator::new("fallback");
            for endpoint in endpoints {
                fallback = fallback.add(
                    endpoint_generator(endpoint, config.temperature)?,
                    endpoint.timeout(),
                );
            }
            info!(endpoints = fallback.len(), "Generator fallback chain configured");
            Ok(Arc::new(fallback))
        }
    }
}

/// A local token counter when `tokenizer_file` is set and the `local`
/// feature is built. `None` means "count with the generator".
pub fn build_counter(config: &GeneratorConfig) -> Result<Option<Arc<dyn TokenCounter>>, GenerationError> {
    match &config.tokenizer_file {
        Some(path) => local_counter(path),
        None => Ok(None),
    }
}

#[cfg(feature = "local")]
fn local_counter(path: &Path) -> Result<Option<Arc<dyn TokenCounter>>, GenerationError> {
    Ok(Some(Arc::new(crate::local::LocalTokenizer::from_file(path)?)))
}

#[cfg(not(feature = "local"))]
fn local_counter(path: &Path) -> Result<Option<Arc<dyn TokenCounter>>, GenerationError> {
    tracing::warn!(
        path = %path.display(),
        "tokenizer_file set but built without the `local` feature, ignoring"
    );
    Ok(None)
}
