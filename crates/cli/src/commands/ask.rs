//! `caduceus ask`: Answer a single question.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    message: &str,
    history_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let history = super::load_history(history_path)?;
    let pipeline = super::build_pipeline(&config).await?;

    let reply = pipeline.respond(message, &history).await?;
    println!("{reply}");

    Ok(())
}
