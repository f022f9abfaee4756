//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_RETRIEVAL__DEFAULT_TOP_K=5`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{DistanceMetric, DuplicatePolicy};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let profile = match env_name.as_str() {
            "dev" | "development" => Some("dev"),
            "prod" | "production" => Some("prod"),
            "test" | "testing" => Some("test"),
            other => {
                tracing::warn!(env = other, "unknown RUST_ENV, using config.toml only");
                None
            }
        };
        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        if let Some(profile) = profile {
            figment = figment.merge(Toml::file(format!("config.{profile}.toml")));
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Build a configuration from an inline TOML document; no files or env vars are read.
    pub fn from_toml_str(toml: &str) -> Self {
        Self { figment: Figment::new().merge(Toml::string(toml)) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the typed settings. Missing keys take their defaults.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
}

impl Settings {
    fn validate(&self) -> Result<()> {
        if self.data.extensions.is_empty() {
            return Err(Error::InvalidConfig("data.extensions must not be empty".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be at least 1".into()));
        }
        if self.embedding.max_len == 0 {
            return Err(Error::InvalidConfig("embedding.max_len must be at least 1".into()));
        }
        if self.embedding.fake_dim == 0 {
            return Err(Error::InvalidConfig("embedding.fake_dim must be at least 1".into()));
        }
        if self.retrieval.default_top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.default_top_k must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub corpus_dir: String,
    pub extensions: Vec<String>,
    pub duplicate_policy: DuplicatePolicy,
}

impl DataSettings {
    pub fn corpus_path(&self) -> PathBuf { expand_path(&self.corpus_dir) }
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            corpus_dir: "data/products".to_string(),
            extensions: vec!["txt".to_string()],
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    Bert,
    Fake,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    /// Model identity, e.g. a Hugging Face repo name.
    pub model: String,
    /// Explicit model directory; empty means "resolve from env / models/".
    pub model_dir: String,
    pub max_len: usize,
    pub batch_size: usize,
    pub fake_dim: usize,
    pub show_progress: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: String::new(),
            max_len: 256,
            batch_size: 32,
            fake_dim: 384,
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub default_top_k: usize,
    pub metric: DistanceMetric,
    pub cache_embeddings: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { default_top_k: 3, metric: DistanceMetric::default(), cache_embeddings: true }
    }
}

/// `~`, `$VAR` and `${VAR}` expansion for paths taken from config or the
/// environment. Unknown variables leave the input untouched apart from `~`.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let raw = input.as_ref();
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
    }
}

/// [`expand_path`], then join onto `base` unless the result is absolute.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let expanded = expand_path(p);
    if expanded.is_absolute() { expanded } else { base.join(expanded) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = Config::from_toml_str("").settings().expect("settings");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.retrieval.default_top_k, 3);
        assert_eq!(settings.retrieval.metric, DistanceMetric::L2);
        assert_eq!(settings.data.duplicate_policy, DuplicatePolicy::LastWins);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [data]
            corpus_dir = "/srv/catalog"
            duplicate_policy = "reject"

            [retrieval]
            metric = "cosine"
            "#,
        );
        let settings = cfg.settings().expect("settings");
        assert_eq!(settings.data.corpus_path(), PathBuf::from("/srv/catalog"));
        assert_eq!(settings.data.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(settings.data.extensions, vec!["txt".to_string()]);
        assert_eq!(settings.retrieval.metric, DistanceMetric::Cosine);
        assert_eq!(settings.embedding.batch_size, 32);
        let dir: String = cfg.get("data.corpus_dir").expect("get");
        assert_eq!(dir, "/srv/catalog");
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let cfg = Config::from_toml_str("[retrieval]\ndefault_top_k = 0\n");
        assert!(matches!(cfg.settings(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn unknown_metric_is_rejected() {
        let cfg = Config::from_toml_str("[retrieval]\nmetric = \"manhattan\"\n");
        assert!(matches!(cfg.settings(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn resolve_with_base_keeps_absolute_paths() {
        let base = Path::new("/base");
        assert_eq!(resolve_with_base(base, "/abs/dir"), PathBuf::from("/abs/dir"));
        assert_eq!(resolve_with_base(base, "rel/dir"), PathBuf::from("/base/rel/dir"));
    }
}
