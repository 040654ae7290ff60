//! Polyglot CLI - command-line interface for the Polyglot translation engine
//!
//! This CLI provides a `polyglot` command that drives the routing and caching
//! engine in-process: inspect the routing table, translate text, or start the
//! HTTP server.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use polyglot_core::{Config, telemetry};

/// Filter used when neither `--log-level` nor the configuration sets one.
const DEFAULT_LOG_FILTER: &str = "warn";

/// Polyglot CLI - multi-language translation engine
#[derive(Parser, Debug)]
#[command(
    name = "polyglot",
    author,
    version,
    about = "Polyglot - translation model routing and caching engine",
    long_about = "Polyglot routes each translation request to a specialized bilingual model when one exists\nand to a multilingual fallback model otherwise, loading each model once and keeping it cached."
)]
struct Args {
    /// Log filter (trace, debug, info, warn, error, or a RUST_LOG directive).
    /// Defaults to `[logging] filter`, then `warn`.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Configuration file (overrides POLYGLOT_CONFIG and ./polyglot.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List supported languages
    Languages {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which model serves a language pair, without loading it
    Route {
        /// Source language code
        source: String,
        /// Target language code
        target: String,
    },

    /// Translate text through the full engine
    Translate {
        /// Text to translate
        text: String,

        /// Source language code
        #[arg(long = "from")]
        from: String,

        /// Target language code
        #[arg(long = "to")]
        to: String,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let filter = args
        .log_level
        .as_deref()
        .or(config.logging.filter.as_deref())
        .unwrap_or(DEFAULT_LOG_FILTER);
    telemetry::init(&config.logging, Some(filter));

    match args.command {
        Command::Languages { json } => commands::languages::execute(&config, json),
        Command::Route { source, target } => commands::route::execute(&config, &source, &target),
        Command::Translate { text, from, to, json } => {
            commands::translate::execute(&config, text, from, to, json).await
        }
        Command::Serve => commands::serve::execute(&config).await,
    }
}
