//! `polyglot route <source> <target>`

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use polyglot_core::{Config, Route, TranslationService};
use polyglot_models::MockLoader;

/// Execute the route command.
///
/// Routing never loads a model, so the mock loader stands in for the
/// configured backend.
pub fn execute(config: &Config, source: &str, target: &str) -> Result<()> {
    let service = TranslationService::with_loader(config, Arc::new(MockLoader::new()))?;

    match service.route(source, target)? {
        Route::PassThrough => {
            println!("{} {} → {}: {}", "•".dimmed(), source, target, "pass-through".yellow());
        }
        Route::Model(descriptor) => {
            println!(
                "{} {} → {}: {} ({})",
                "•".dimmed(),
                source,
                target,
                descriptor.id().cyan(),
                descriptor.kind()
            );
        }
    }
    Ok(())
}
