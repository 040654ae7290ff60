//! `polyglot translate <text> --from <code> --to <code>`

use anyhow::Result;
use colored::Colorize;
use polyglot_core::{Config, TranslationRequest, TranslationService};

/// Execute the translate command.
pub async fn execute(config: &Config, text: String, from: String, to: String, json_output: bool) -> Result<()> {
    let service = TranslationService::from_config(config)?;
    let result = service.translate(&TranslationRequest { text, source_lang: from, target_lang: to }).await;
    service.shutdown();
    let result = result?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.translated_text);
        eprintln!(
            "{} {} → {} via {}",
            "✓".green(),
            result.source_lang,
            result.target_lang,
            result.model_used.cyan()
        );
    }
    Ok(())
}
