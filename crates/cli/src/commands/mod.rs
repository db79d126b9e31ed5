pub mod ask;
pub mod doctor;
pub mod prompt;
pub mod serve;

use caduceus_agent::ChatPipeline;
use caduceus_config::AppConfig;
use caduceus_core::HistoryTurn;
use std::path::Path;
use std::sync::Arc;

/// Load config from `path` (or the default location) with env overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

/// Build the chat pipeline the gateway would serve.
pub async fn build_pipeline(
    config: &AppConfig,
) -> Result<ChatPipeline, Box<dyn std::error::Error>> {
    let generator = caduceus_providers::build_from_config(&config.generator)?;
    let counter = caduceus_providers::build_counter(&config.generator)?;
    Ok(ChatPipeline::from_config(config, Arc::clone(&generator), counter).await?)
}

/// Read prior turns from a JSON file. No file means no history.
pub fn load_history(path: Option<&Path>) -> Result<Vec<HistoryTurn>, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read history {}: {e}", path.display()))?;
    let history: Vec<HistoryTurn> = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid history {}: {e}", path.display()))?;
    Ok(history)
}
