//! Static routing table from language pairs to model descriptors.
//!
//! Resolution is a pure lookup with a fixed priority: a specialized
//! (bilingual) model for the exact pair wins over the multilingual fallback.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use polyglot_abstraction::{LanguageCode, LanguagePair};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Identifier of the default multilingual fallback model.
pub const DEFAULT_FALLBACK_MODEL: &str = "facebook/nllb-200-1.3B";

/// The bilingual models shipped in the default table.
const STANDARD_SPECIALIZED: [(LanguageCode, LanguageCode, &str); 6] = [
    (LanguageCode::En, LanguageCode::Ja, "Helsinki-NLP/opus-mt-en-jap"),
    (LanguageCode::Ja, LanguageCode::En, "Helsinki-NLP/opus-mt-ja-en"),
    (LanguageCode::En, LanguageCode::Zh, "Helsinki-NLP/opus-mt-en-zh"),
    (LanguageCode::Zh, LanguageCode::En, "Helsinki-NLP/opus-mt-zh-en"),
    (LanguageCode::En, LanguageCode::Hi, "Helsinki-NLP/opus-mt-en-hi"),
    (LanguageCode::Hi, LanguageCode::En, "Helsinki-NLP/opus-mt-hi-en"),
];

/// Errors returned when resolving a pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No descriptor covers the pair.
    #[error("no model covers language pair {0}")]
    Unsupported(LanguagePair),

    /// Identity pairs are answered by pass-through and never resolved.
    #[error("language pair {0} is an identity pair and needs no model")]
    IdentityPair(LanguagePair),
}

/// The configured routing table is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid registry table: {0}")]
pub struct RegistryTableError(pub String);

/// The coarse category of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Serves exactly one ordered pair.
    Specialized,
    /// Serves many pairs at broadly adequate quality.
    Fallback,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Specialized => f.write_str("specialized"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// Immutable description of a model and the pairs it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelDescriptor {
    /// A bilingual model trained for a single ordered pair.
    Specialized {
        /// Model identifier.
        id: String,
        /// The only pair this model serves.
        pair: LanguagePair,
    },
    /// A multilingual model.
    Fallback {
        /// Model identifier.
        id: String,
        /// Every pair the model serves.
        pairs: BTreeSet<LanguagePair>,
    },
}

impl ModelDescriptor {
    /// Model identifier, unique within a registry.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Specialized { id, .. } | Self::Fallback { id, .. } => id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        match self {
            Self::Specialized { .. } => ModelKind::Specialized,
            Self::Fallback { .. } => ModelKind::Fallback,
        }
    }

    /// Whether this model can translate along `pair`.
    #[must_use]
    pub fn covers(&self, pair: LanguagePair) -> bool {
        match self {
            Self::Specialized { pair: own, .. } => *own == pair,
            Self::Fallback { pairs, .. } => pairs.contains(&pair),
        }
    }

    /// The pairs served by this model, in sorted order.
    #[must_use]
    pub fn pairs(&self) -> Vec<LanguagePair> {
        match self {
            Self::Specialized { pair, .. } => vec![*pair],
            Self::Fallback { pairs, .. } => pairs.iter().copied().collect(),
        }
    }
}

impl fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id(), self.kind())
    }
}

/// One specialized entry of the routing table, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecializedModel {
    /// Source language.
    pub source: LanguageCode,
    /// Target language.
    pub target: LanguageCode,
    /// Model identifier.
    pub model: String,
}

/// Routing table configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Multilingual model used when no specialized model exists.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    /// Bilingual models, one per ordered pair.
    #[serde(default = "default_specialized")]
    pub specialized: Vec<SpecializedModel>,
}

fn default_fallback_model() -> String {
    DEFAULT_FALLBACK_MODEL.to_string()
}

fn default_specialized() -> Vec<SpecializedModel> {
    STANDARD_SPECIALIZED
        .iter()
        .map(|(source, target, model)| SpecializedModel {
            source: *source,
            target: *target,
            model: (*model).to_string(),
        })
        .collect()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { fallback_model: default_fallback_model(), specialized: default_specialized() }
    }
}

/// Display metadata for one supported language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageInfo {
    pub code: LanguageCode,
    pub name: &'static str,
    pub flag: &'static str,
}

impl From<LanguageCode> for LanguageInfo {
    fn from(code: LanguageCode) -> Self {
        Self { code, name: code.display_name(), flag: code.flag() }
    }
}

/// Lookup table from language pairs to model descriptors.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    specialized: BTreeMap<LanguagePair, Arc<ModelDescriptor>>,
    fallback: Arc<ModelDescriptor>,
}

impl ModelRegistry {
    /// The default table: six MarianMT pairs plus NLLB for everything else.
    #[must_use]
    pub fn standard() -> Self {
        let specialized = STANDARD_SPECIALIZED
            .iter()
            .map(|(source, target, id)| {
                let pair = LanguagePair::new(*source, *target);
                (pair, Arc::new(ModelDescriptor::Specialized { id: (*id).to_string(), pair }))
            })
            .collect();

        Self { specialized, fallback: Arc::new(Self::fallback_descriptor(DEFAULT_FALLBACK_MODEL)) }
    }

    /// Builds and validates a registry from configuration.
    ///
    /// # Errors
    /// Returns `RegistryTableError` for identity or duplicate pairs,
    /// empty identifiers, or identifiers used by more than one descriptor.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, RegistryTableError> {
        let fallback_id = config.fallback_model.trim();
        if fallback_id.is_empty() {
            return Err(RegistryTableError("fallback model id is empty".to_string()));
        }

        let mut ids = HashSet::from([fallback_id.to_string()]);
        let mut specialized = BTreeMap::new();

        for entry in &config.specialized {
            let pair = LanguagePair::new(entry.source, entry.target);
            let id = entry.model.trim();

            if pair.is_identity() {
                return Err(RegistryTableError(format!(
                    "specialized model '{id}' maps {} onto itself",
                    entry.source
                )));
            }
            if id.is_empty() {
                return Err(RegistryTableError(format!(
                    "specialized model for {pair} has an empty id"
                )));
            }
            if !ids.insert(id.to_string()) {
                return Err(RegistryTableError(format!(
                    "model id '{id}' is used by more than one descriptor"
                )));
            }

            let descriptor = Arc::new(ModelDescriptor::Specialized { id: id.to_string(), pair });
            if specialized.insert(pair, descriptor).is_some() {
                return Err(RegistryTableError(format!(
                    "more than one specialized model for {pair}"
                )));
            }
        }

        Ok(Self { specialized, fallback: Arc::new(Self::fallback_descriptor(fallback_id)) })
    }

    fn fallback_descriptor(id: &str) -> ModelDescriptor {
        ModelDescriptor::Fallback { id: id.to_string(), pairs: LanguagePair::all_distinct().collect() }
    }

    /// Resolves the descriptor serving `pair`.
    ///
    /// Specialized descriptors are consulted first, the fallback second.
    /// Repeated calls return the same `Arc`.
    ///
    /// # Errors
    /// `IdentityPair` when source equals target, `Unsupported` when nothing
    /// covers the pair.
    pub fn resolve(&self, pair: LanguagePair) -> Result<Arc<ModelDescriptor>, RegistryError> {
        if pair.is_identity() {
            return Err(RegistryError::IdentityPair(pair));
        }

        if let Some(descriptor) = self.specialized.get(&pair) {
            debug!(%pair, model = %descriptor.id(), "Resolved specialized model");
            return Ok(Arc::clone(descriptor));
        }

        if self.fallback.covers(pair) {
            debug!(%pair, model = %self.fallback.id(), "Resolved fallback model");
            return Ok(Arc::clone(&self.fallback));
        }

        Err(RegistryError::Unsupported(pair))
    }

    /// Every descriptor: specialized ones in pair order, then the fallback.
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<ModelDescriptor>> {
        self.specialized.values().chain(std::iter::once(&self.fallback))
    }

    /// Looks a descriptor up by identifier.
    #[must_use]
    pub fn descriptor(&self, id: &str) -> Option<&Arc<ModelDescriptor>> {
        self.descriptors().find(|d| d.id() == id)
    }

    /// Supported languages with display metadata, in display order.
    #[must_use]
    pub fn languages(&self) -> Vec<LanguageInfo> {
        LanguageCode::ALL.into_iter().map(LanguageInfo::from).collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(source: LanguageCode, target: LanguageCode) -> LanguagePair {
        LanguagePair::new(source, target)
    }

    #[test]
    fn test_resolve_prefers_specialized() {
        let registry = ModelRegistry::standard();
        let descriptor = registry.resolve(pair(LanguageCode::En, LanguageCode::Ja)).unwrap();
        assert_eq!(descriptor.kind(), ModelKind::Specialized);
        assert_eq!(descriptor.id(), "Helsinki-NLP/opus-mt-en-jap");
        // The fallback covers en-ja too, but must lose.
        assert!(registry.fallback.covers(pair(LanguageCode::En, LanguageCode::Ja)));
    }

    #[test]
    fn test_resolve_sinhala_uses_fallback() {
        let registry = ModelRegistry::standard();
        for other in [LanguageCode::En, LanguageCode::Ja, LanguageCode::Zh, LanguageCode::Hi] {
            let to_si = registry.resolve(pair(other, LanguageCode::Si)).unwrap();
            let from_si = registry.resolve(pair(LanguageCode::Si, other)).unwrap();
            assert_eq!(to_si.id(), DEFAULT_FALLBACK_MODEL);
            assert_eq!(from_si.kind(), ModelKind::Fallback);
        }
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let registry = ModelRegistry::standard();
        let first = registry.resolve(pair(LanguageCode::En, LanguageCode::Ja)).unwrap();
        for _ in 0..10 {
            let again = registry.resolve(pair(LanguageCode::En, LanguageCode::Ja)).unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }
    }

    #[test]
    fn test_resolve_identity_pair_is_rejected() {
        let registry = ModelRegistry::standard();
        let identity = pair(LanguageCode::Hi, LanguageCode::Hi);
        assert_eq!(registry.resolve(identity), Err(RegistryError::IdentityPair(identity)));
    }

    #[test]
    fn test_every_distinct_pair_resolves() {
        let registry = ModelRegistry::standard();
        for p in LanguagePair::all_distinct() {
            let descriptor = registry.resolve(p).unwrap();
            assert!(descriptor.covers(p));
        }
    }

    #[test]
    fn test_from_default_config_matches_standard() {
        let from_config = ModelRegistry::from_config(&RegistryConfig::default()).unwrap();
        let standard = ModelRegistry::standard();
        let a: Vec<_> = from_config.descriptors().map(|d| d.id().to_string()).collect();
        let b: Vec<_> = standard.descriptors().map(|d| d.id().to_string()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_config_rejects_identity_entry() {
        let config = RegistryConfig {
            fallback_model: "nllb".to_string(),
            specialized: vec![SpecializedModel {
                source: LanguageCode::Ja,
                target: LanguageCode::Ja,
                model: "ja-ja".to_string(),
            }],
        };
        assert!(matches!(ModelRegistry::from_config(&config), Err(RegistryTableError(_))));
    }

    #[test]
    fn test_from_config_rejects_duplicate_pair() {
        let entry = |model: &str| SpecializedModel {
            source: LanguageCode::En,
            target: LanguageCode::Zh,
            model: model.to_string(),
        };
        let config = RegistryConfig {
            fallback_model: "nllb".to_string(),
            specialized: vec![entry("a"), entry("b")],
        };
        assert!(matches!(ModelRegistry::from_config(&config), Err(RegistryTableError(_))));
    }

    #[test]
    fn test_from_config_rejects_shared_ids_and_empty_fallback() {
        let config = RegistryConfig {
            fallback_model: "shared".to_string(),
            specialized: vec![SpecializedModel {
                source: LanguageCode::En,
                target: LanguageCode::Zh,
                model: "shared".to_string(),
            }],
        };
        assert!(ModelRegistry::from_config(&config).is_err());

        let config = RegistryConfig { fallback_model: "  ".to_string(), specialized: vec![] };
        assert!(ModelRegistry::from_config(&config).is_err());
    }

    #[test]
    fn test_fallback_only_registry() {
        let config = RegistryConfig { fallback_model: "nllb".to_string(), specialized: vec![] };
        let registry = ModelRegistry::from_config(&config).unwrap();
        let descriptor = registry.resolve(pair(LanguageCode::En, LanguageCode::Ja)).unwrap();
        assert_eq!(descriptor.id(), "nllb");
    }

    #[test]
    fn test_languages_in_display_order() {
        let languages = ModelRegistry::standard().languages();
        let codes: Vec<_> = languages.iter().map(|l| l.code.code()).collect();
        assert_eq!(codes, ["en", "ja", "zh", "hi", "si"]);
        assert_eq!(languages[4].name, "Sinhala");
    }

    #[test]
    fn test_descriptor_lookup() {
        let registry = ModelRegistry::standard();
        assert!(registry.descriptor(DEFAULT_FALLBACK_MODEL).is_some());
        assert!(registry.descriptor("nope").is_none());
        assert_eq!(registry.descriptors().count(), 7);
    }
}
