use crate::flags::EmbedMode;
use anyhow::{Context, Result};
use faq_lexical::VectorizerConfig;
use faq_search::{
    RetrievalConfig, DEFAULT_GENERATION_MODEL, DEFAULT_GENERATION_TIMEOUT, DEFAULT_GENERATION_URL,
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};
use faq_vector_store::{DEFAULT_OLLAMA_EMBED_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_STUB_DIMENSION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub(crate) const DEFAULT_CONFIG_FILE: &str = "faq.toml";
pub(crate) const DEFAULT_KNOWLEDGE_FILE: &str = "knowledge_base.txt";
pub(crate) const DEFAULT_CACHE_DIR: &str = ".faq/cache";
const VECTOR_CACHE_FILE: &str = "vectors.json";

/// Contents of `faq.toml`. Every table is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FaqConfig {
    pub knowledge: KnowledgeSection,
    pub retrieval: RetrievalConfig,
    pub lexical: VectorizerConfig,
    pub embedding: EmbeddingSection,
    pub generation: GenerationSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct KnowledgeSection {
    pub path: PathBuf,
    pub cache_dir: PathBuf,
}

impl Default for KnowledgeSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_KNOWLEDGE_FILE),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct EmbeddingSection {
    pub mode: EmbedMode,
    pub url: String,
    pub model: String,
    /// Vector width for the `stub` provider
    pub dimension: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            mode: EmbedMode::default(),
            url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_EMBED_MODEL.to_string(),
            dimension: DEFAULT_STUB_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct GenerationSection {
    pub url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_GENERATION_URL.to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_ms: DEFAULT_GENERATION_TIMEOUT.as_millis() as u64,
        }
    }
}

impl GenerationSection {
    pub(crate) const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl FaqConfig {
    /// Read the config file.
    ///
    /// An explicitly requested file must exist; the default `faq.toml` is
    /// optional.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !required && !path.exists() {
            log::debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub(crate) fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `FAQ_*` overrides for settings that have no global flag.
    pub(crate) fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FAQ_OLLAMA_URL") {
            self.embedding.url = url.clone();
            self.generation.url = url;
        }
        if let Some(model) = lookup("FAQ_EMBED_MODEL") {
            self.embedding.model = model;
        }
        if let Some(model) = lookup("FAQ_GENERATION_MODEL") {
            self.generation.model = model;
        }
        if let Some(raw) = lookup("FAQ_SEMANTIC_WEIGHT") {
            self.retrieval.semantic_weight = parse_env("FAQ_SEMANTIC_WEIGHT", &raw)?;
        }
        if let Some(raw) = lookup("FAQ_LEXICAL_WEIGHT") {
            self.retrieval.lexical_weight = parse_env("FAQ_LEXICAL_WEIGHT", &raw)?;
        }
        if let Some(raw) = lookup("FAQ_EMBED_TIMEOUT_MS") {
            self.retrieval.embed_timeout_ms = parse_env("FAQ_EMBED_TIMEOUT_MS", &raw)?;
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.retrieval
            .validate()
            .context("Invalid [retrieval] settings")?;
        self.lexical.validate().context("Invalid [lexical] settings")?;
        if self.embedding.mode == EmbedMode::Stub && self.embedding.dimension == 0 {
            anyhow::bail!("Invalid [embedding] settings: dimension must be > 0");
        }
        Ok(())
    }

    pub(crate) fn vector_cache_path(&self) -> PathBuf {
        self.knowledge.cache_dir.join(VECTOR_CACHE_FILE)
    }
}

fn parse_env<T>(var: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{var} has an invalid value: {raw:?}"))
}
