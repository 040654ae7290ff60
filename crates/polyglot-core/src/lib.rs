//! Polyglot Core - translation request dispatcher and HTTP server.
//!
//! This crate provides:
//! - the `TranslationService` dispatcher (validation, routing, pass-through)
//! - the HTTP surface (`/`, `/health`, `/languages`, `/translate`)
//! - configuration loading and error handling
//!
//! # Example
//!
//! ```rust,no_run
//! use polyglot_core::{config::Config, server};
//!
//! #[tokio::main]
//! async fn main() -> polyglot_core::error::Result<()> {
//!     let config = Config::load(None)?;
//!     server::run(&config).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod server;
pub mod service;
pub mod telemetry;

pub use config::Config;
pub use error::{ConfigError, LanguageRole, PolyglotError, Result, TimeoutStage, TranslateError};
pub use service::{
    HealthReport, PASS_THROUGH, Route, TranslationRequest, TranslationResult, TranslationService,
};
