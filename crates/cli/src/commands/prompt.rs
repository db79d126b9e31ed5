//! `caduceus prompt`: Show the grounded prompt without generating.

use caduceus_agent::{PreparedPrompt, TrimStep};
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    message: &str,
    history_path: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let history = super::load_history(history_path)?;
    let pipeline = super::build_pipeline(&config).await?;

    let prepared = pipeline.prepare(message, &history).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&prepared)?);
    } else {
        print_report(&prepared);
    }

    Ok(())
}

fn print_report(prepared: &PreparedPrompt) {
    let fitted = &prepared.fitted;

    println!("📚 Evidence ({} found, {} kept)", prepared.evidence.len(), fitted.parts.evidence.len());
    for item in &prepared.evidence {
        let url = item.url().map(|u| format!(" <{u}>")).unwrap_or_default();
        println!("   [{:?}] {}{url}", item.priority(), item.description());
    }

    println!();
    if fitted.steps.is_empty() {
        println!("✂️  No trimming needed");
    } else {
        println!("✂️  Trim steps ({})", fitted.steps.len());
        for step in &fitted.steps {
            println!("   - {}", describe(step));
        }
    }

    println!();
    let marker = if fitted.within_budget { "✅" } else { "⚠️ " };
    println!("{marker} {} / {} tokens", fitted.tokens, fitted.budget);
    println!("========================================");
    println!("{}", fitted.prompt);
}

fn describe(step: &TrimStep) -> String {
    match step {
        TrimStep::DroppedHistoryTurn => "dropped oldest history turn".into(),
        TrimStep::DroppedEvidence { description, priority } => {
            format!("dropped evidence '{description}' ({priority:?})")
        }
        TrimStep::TruncatedUserText { from_chars, to_chars } => {
            format!("shortened user text {from_chars} → {to_chars} chars")
        }
        TrimStep::RawTruncation { from_chars, to_chars } => {
            format!("truncated prompt {from_chars} → {to_chars} chars")
        }
        TrimStep::HardTruncation { from_chars, to_chars } => {
            format!("hard-truncated prompt {from_chars} → {to_chars} chars")
        }
    }
}
