//! `polyglot languages`

use anyhow::Result;
use colored::Colorize;
use polyglot_core::Config;
use polyglot_models::ModelRegistry;
use serde_json::json;

/// Execute the languages command.
pub fn execute(config: &Config, json_output: bool) -> Result<()> {
    let registry = ModelRegistry::from_config(&config.registry)?;
    let languages = registry.languages();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&json!({ "languages": languages }))?);
        return Ok(());
    }

    println!();
    println!("{}", format!("🌐 Supported Languages ({})", languages.len()).bold().green());
    println!();
    println!("{:<6} {:<12} {:<6} {:<10}", "Code", "Name", "Flag", "FLORES");
    println!("{}", "─".repeat(38));
    for info in &languages {
        println!(
            "{:<6} {:<12} {:<6} {}",
            info.code.code().cyan(),
            info.name,
            info.flag,
            info.code.flores_code().dimmed()
        );
    }
    println!();
    Ok(())
}
