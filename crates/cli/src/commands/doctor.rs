//! `caduceus doctor`: Diagnose system health.

use caduceus_config::{AppConfig, CacheBackend};
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Caduceus Doctor: System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    // Check config
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    if path.exists() {
        println!("  ✅ Config file found at {}", path.display());
    } else {
        println!("  ⚠️  No config file at {}, using defaults", path.display());
    }

    let config = match super::load_config(Some(&path)) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ {e}");
            println!("\n  ⚠️  Fix the config before running other checks.");
            return Ok(());
        }
    };

    let budget = config.budget.prompt_budget();
    println!(
        "     Budget:  {} context, {} for generation, {} for the prompt",
        budget.context_window,
        budget.reserved_for_generation,
        budget.max_prompt_tokens()
    );
    println!(
        "     Sources: {} ({:?})",
        config.grounding.chain.join(", "),
        config.grounding.chain_mode
    );

    // Check generator
    match caduceus_providers::build_from_config(&config.generator) {
        Ok(generator) if !generator.is_available() => {
            println!("  ⚠️  No generator endpoint configured");
            issues += 1;
        }
        Ok(generator) => match generator.health_check().await {
            Ok(true) => println!("  ✅ Generator '{}' healthy", generator.name()),
            Ok(false) => {
                println!("  ❌ Generator '{}' is not healthy", generator.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Generator '{}' unreachable: {e}", generator.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Generator could not be built: {e}");
            issues += 1;
        }
    }

    // Check cache
    let cache = caduceus_cache::build_from_config(&config.cache).await;
    match cache.round_trip().await {
        Ok(true) => println!("  ✅ Cache '{}' round-trip ok", cache.backend_name()),
        Ok(false) if cache.backend_name() == "none" => {
            if let CacheBackend::Redis { url } = &config.cache.backend {
                println!("  ❌ Redis at {url} unreachable, caching disabled");
                issues += 1;
            } else {
                println!("  ⚠️  Caching disabled");
            }
        }
        Ok(false) => {
            println!("  ❌ Cache '{}' did not return the sentinel value", cache.backend_name());
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Cache '{}' failed: {e}", cache.backend_name());
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
