//! Polyglot Server - Entry Point
//!
//! This binary starts the Polyglot HTTP server.

use tracing::error;

use polyglot_core::{config::Config, server, telemetry};

#[tokio::main]
async fn main() {
    let config = match Config::load(None) {
        Ok(config) => config,
        Err(e) => {
            telemetry::init(&polyglot_core::config::LoggingConfig::default(), None);
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    telemetry::init(&config.logging, None);

    if let Err(e) = server::run(&config).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
