//! Tracing subscriber setup for the Polyglot binaries.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

/// Filter used when neither `RUST_LOG` nor the configuration sets one.
pub const DEFAULT_FILTER: &str = "polyglot_core=debug,polyglot_models=debug,info";

/// Install the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `override_filter`, which wins over the configured
/// filter. Calling this twice is harmless; the first subscriber stays.
pub fn init(logging: &LoggingConfig, override_filter: Option<&str>) {
    let fallback = override_filter
        .or(logging.filter.as_deref())
        .unwrap_or(DEFAULT_FILTER)
        .to_string();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = match logging.format {
        LogFormat::Pretty => {
            registry.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).try_init()
        }
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
