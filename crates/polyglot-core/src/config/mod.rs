//! Configuration module for Polyglot Core.
//!
//! Configuration is layered, later sources winning:
//! 1. built-in defaults
//! 2. a TOML file (`polyglot.toml`, or the path in `POLYGLOT_CONFIG`)
//! 3. `POLYGLOT__<SECTION>__<KEY>` environment variables
//! 4. `HOST`, `PORT` and `CORS_ORIGINS`

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use polyglot_abstraction::LanguagePair;
use polyglot_models::{
    BackendConfig, CacheConfig, ExecutorConfig, ModelRegistry, RegistryConfig,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "polyglot.toml";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "POLYGLOT_CONFIG";

const ENV_PREFIX: &str = "POLYGLOT";

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by CORS. `*` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), cors_origins: default_cors_origins() }
    }
}

impl ServerConfig {
    /// `host:port`, as shown in logs.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check the listen settings. Hostnames are resolved when binding.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for an empty or malformed host or an
    /// empty CORS list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() || self.host.chars().any(char::is_whitespace) {
            return Err(ConfigError::invalid("server", format!("bad host {:?}", self.host)));
        }
        if self.cors_origins.is_empty() {
            return Err(ConfigError::invalid("server", "cors_origins must not be empty"));
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Filter directives used when `RUST_LOG` is unset.
    #[serde(default)]
    pub filter: Option<String>,
}

/// Request limits enforced by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum request text length in characters.
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
}

fn default_max_text_length() -> usize {
    5000
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_text_length: default_max_text_length() }
    }
}

/// Root configuration for Polyglot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Pairs (`"en-ja"`) to load in the background at server start.
    #[serde(default)]
    pub preload: Vec<String>,
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the process environment.
    ///
    /// `path` overrides the file lookup; an explicit file must exist.
    ///
    /// # Errors
    /// Returns `ConfigError` if a source is unreadable or a value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env(path, &env)
    }

    /// Load configuration using `env` in place of the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError` if a source is unreadable or a value is invalid.
    pub fn load_with_env(
        path: Option<&Path>,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let (file, required) = match (path, env.get(CONFIG_PATH_ENV)) {
            (Some(path), _) => (path.to_path_buf(), true),
            (None, Some(path)) => (PathBuf::from(path), true),
            (None, None) => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        debug!(file = %file.display(), required, "Loading configuration");

        let prefixed: config::Map<String, String> = env
            .iter()
            .filter(|(key, _)| key.starts_with(&format!("{ENV_PREFIX}__")))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let cors_origins = env.get("CORS_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        });

        let builder = config::Config::builder()
            .add_source(
                config::File::from(file.as_path())
                    .format(config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(prefixed)),
            )
            .set_override_option("server.host", env.get("HOST").cloned())?
            .set_override_option("server.port", env.get("PORT").cloned())?
            .set_override_option("server.cors_origins", cors_origins)?;

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text, without environment overrides.
    ///
    /// # Errors
    /// Returns `ConfigError` if the text does not parse or a value is invalid.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns the first invalid section found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if self.limits.max_text_length == 0 {
            return Err(ConfigError::invalid("limits", "max_text_length must be greater than 0"));
        }
        self.cache.validate()?;
        self.executor.validate()?;
        ModelRegistry::from_config(&self.registry)?;
        self.preload_pairs()?;
        Ok(())
    }

    /// The preload list, parsed.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for malformed or identity pairs.
    pub fn preload_pairs(&self) -> Result<Vec<LanguagePair>, ConfigError> {
        self.preload
            .iter()
            .map(|entry| {
                let pair: LanguagePair =
                    entry.parse().map_err(|e| ConfigError::invalid("preload", e))?;
                if pair.is_identity() {
                    return Err(ConfigError::invalid(
                        "preload",
                        format!("{pair} needs no model"),
                    ));
                }
                Ok(pair)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyglot_abstraction::LanguageCode;
    use polyglot_models::{BackendKind, OverflowPolicy};
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.address(), "0.0.0.0:8000");
        assert_eq!(config.server.cors_origins, vec!["http://localhost:3000".to_string()]);
        assert_eq!(config.limits.max_text_length, 5000);
        assert_eq!(config.backend.kind, BackendKind::Mock);
        assert!(config.preload.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_sources_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = Config::load_with_env(Some(&missing), &HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));

        let config =
            Config::load_with_env(None, &env(&[("POLYGLOT_CONFIG_UNUSED", "x")])).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
preload = ["en-ja", "en-si"]

[server]
port = 9000

[cache]
max_models = 3
idle_timeout_secs = 600

[executor]
overflow = "truncate"

[backend]
kind = "remote"
base_url = "http://localhost:8080"
"#
        )
        .unwrap();

        let config = Config::load_with_env(Some(file.path()), &HashMap::new()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.cache.max_models, Some(3));
        assert_eq!(config.cache.idle_timeout_secs, Some(600));
        assert_eq!(config.executor.overflow, OverflowPolicy::Truncate);
        assert_eq!(config.backend.kind, BackendKind::Remote);
        assert_eq!(
            config.preload_pairs().unwrap(),
            vec![
                LanguagePair::new(LanguageCode::En, LanguageCode::Ja),
                LanguagePair::new(LanguageCode::En, LanguageCode::Si),
            ]
        );
    }

    #[test]
    fn test_config_path_from_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nmax_text_length = 100").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let config = Config::load_with_env(None, &env(&[(CONFIG_PATH_ENV, &path)])).unwrap();
        assert_eq!(config.limits.max_text_length, 100);
    }

    #[test]
    fn test_env_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9000").unwrap();

        let config = Config::load_with_env(
            Some(file.path()),
            &env(&[
                ("POLYGLOT__CACHE__MAX_MODELS", "4"),
                ("POLYGLOT__LOGGING__FORMAT", "json"),
                ("PORT", "8123"),
                ("HOST", "127.0.0.1"),
                ("CORS_ORIGINS", "http://a.example, http://b.example"),
            ]),
        )
        .unwrap();

        assert_eq!(config.cache.max_models, Some(4));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.server.address(), "127.0.0.1:8123");
        assert_eq!(
            config.server.cors_origins,
            vec!["http://a.example".to_string(), "http://b.example".to_string()]
        );
    }

    #[test]
    fn test_hostname_is_accepted() {
        let config = Config::load_with_env(None, &env(&[("HOST", "localhost")])).unwrap();
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.address(), "localhost:8000");

        assert!(matches!(
            Config::load_with_env(None, &env(&[("HOST", "")])),
            Err(ConfigError::Invalid { section: "server", .. })
        ));
    }

    #[test]
    fn test_from_toml_str_custom_registry() {
        let config = Config::from_toml_str(
            r#"
[registry]
fallback_model = "facebook/nllb-200-distilled-600M"
specialized = [{ source = "en", target = "ja", model = "custom/en-ja" }]
"#,
        )
        .unwrap();
        assert_eq!(config.registry.fallback_model, "facebook/nllb-200-distilled-600M");
        assert_eq!(config.registry.specialized.len(), 1);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(matches!(
            Config::from_toml_str("[limits]\nmax_text_length = 0"),
            Err(ConfigError::Invalid { section: "limits", .. })
        ));
        assert!(matches!(
            Config::from_toml_str("[cache]\nmax_models = 0"),
            Err(ConfigError::Invalid { section: "cache", .. })
        ));
        assert!(matches!(
            Config::from_toml_str("[executor]\nmax_concurrent = 0"),
            Err(ConfigError::Invalid { section: "executor", .. })
        ));
        assert!(matches!(
            Config::from_toml_str(
                "[registry]\nspecialized = [{ source = \"en\", target = \"en\", model = \"x\" }]"
            ),
            Err(ConfigError::Invalid { section: "registry", .. })
        ));
        assert!(matches!(
            Config::from_toml_str("preload = [\"en-fr\"]"),
            Err(ConfigError::Invalid { section: "preload", .. })
        ));
        assert!(matches!(
            Config::from_toml_str("preload = [\"ja-ja\"]"),
            Err(ConfigError::Invalid { section: "preload", .. })
        ));
        assert!(matches!(
            Config::from_toml_str("[server]\nhost = \"not a host\""),
            Err(ConfigError::Invalid { section: "server", .. })
        ));
    }
}
