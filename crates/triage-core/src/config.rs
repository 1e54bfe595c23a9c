//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Typed sections (`chunking`, `retrieval`, `router`) are extracted with
//! `get_or_default` and handed to components at construction.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    /// Build from an inline TOML document, without touching files or env.
    pub fn from_toml_str(doc: &str) -> anyhow::Result<Self> {
        let config = Self { figment: Figment::new().merge(Toml::string(doc)) };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Like `get`, but an absent key yields `T::default()`.
    pub fn get_or_default<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.find_value(key).is_err() {
            return Ok(T::default());
        }
        self.get(key)
    }

    pub fn chunking(&self) -> anyhow::Result<ChunkingConfig> {
        self.get_or_default("chunking")
    }

    pub fn retrieval(&self) -> anyhow::Result<RetrievalConfig> {
        self.get_or_default("retrieval")
    }

    fn validate(&self) -> anyhow::Result<()> {
        let retrieval = self.retrieval()?;
        if !(0.0..=1.0).contains(&retrieval.graph_boost) {
            anyhow::bail!("retrieval.graph_boost must be within [0, 1], got {}", retrieval.graph_boost);
        }
        if retrieval.max_k == 0 {
            anyhow::bail!("retrieval.max_k must be at least 1");
        }
        Ok(())
    }
}

/// Retrieval breadth and graph-expansion defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Hard ceiling on similarity-search breadth.
    pub max_k: usize,
    pub graph_boost: f64,
    pub expand_neighbors: usize,
    /// Leading segment of every provenance string.
    pub source_root: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { max_k: 8, graph_boost: 0.0, expand_neighbors: 3, source_root: "store".to_string() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
