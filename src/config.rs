//! Engine configuration
//!
//! Pool sizes, images and time budgets are loaded once at startup from a TOML
//! file and passed by reference to every consumer. Unlike earlier revisions of
//! this worker there is no process-wide `OnceLock`; the config is an explicit
//! value.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::languages::Language;

const DEFAULT_POOL_SIZE: usize = 2;

/// Per-language pool settings.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Number of sandboxes provisioned at warm-up
    pub pool_size: usize,
    /// Container image backing this language's sandboxes
    pub image: String,
    /// End-to-end deadline for one execution (write + compile + run)
    pub time_budget: Duration,
    /// Ceiling on free + leased sandboxes; None means overflow is unbounded
    pub max_total: Option<usize>,
}

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Container runtime binary (e.g., "docker" or "podman")
    pub container_bin: String,
    /// Memory ceiling per sandbox in MB
    pub memory_limit_mb: u32,
    /// CPU share per sandbox
    pub cpus: f64,
    /// TTL for the interpreted-result cache; None disables caching
    pub cache_ttl: Option<Duration>,
    pools: HashMap<Language, PoolSettings>,
}

/// Raw TOML shape
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_container_bin")]
    container_bin: String,
    #[serde(default = "default_memory_limit_mb")]
    memory_limit_mb: u32,
    #[serde(default = "default_cpus")]
    cpus: f64,
    cache_ttl_ms: Option<u64>,
    #[serde(default)]
    languages: HashMap<String, RawPoolSettings>,
}

#[derive(Debug, Deserialize)]
struct RawPoolSettings {
    #[serde(default = "default_pool_size")]
    pool_size: usize,
    image: Option<String>,
    time_budget_ms: Option<u64>,
    max_total: Option<usize>,
}

fn default_container_bin() -> String {
    "docker".to_string()
}

fn default_memory_limit_mb() -> u32 {
    256
}

fn default_cpus() -> f64 {
    1.0
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML content.
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content).context("invalid config file")?;

        let mut pools = HashMap::new();
        for (name, raw_pool) in raw.languages {
            let language: Language = name
                .parse()
                .with_context(|| format!("unknown language in config: {}", name))?;
            let spec = language.spec();
            let settings = PoolSettings {
                pool_size: raw_pool.pool_size,
                image: raw_pool
                    .image
                    .unwrap_or_else(|| spec.default_image.to_string()),
                time_budget: raw_pool
                    .time_budget_ms
                    .map(Duration::from_millis)
                    .unwrap_or(spec.time_budget),
                max_total: raw_pool.max_total,
            };
            pools.insert(language, settings);
        }

        Ok(Self {
            container_bin: raw.container_bin,
            memory_limit_mb: raw.memory_limit_mb,
            cpus: raw.cpus,
            cache_ttl: raw.cache_ttl_ms.map(Duration::from_millis),
            pools,
        })
    }

    /// Default configuration enabling every supported language.
    pub fn with_defaults() -> Self {
        let pools = Language::ALL
            .into_iter()
            .map(|language| {
                let spec = language.spec();
                let settings = PoolSettings {
                    pool_size: DEFAULT_POOL_SIZE,
                    image: spec.default_image.to_string(),
                    time_budget: spec.time_budget,
                    max_total: None,
                };
                (language, settings)
            })
            .collect();

        Self {
            container_bin: default_container_bin(),
            memory_limit_mb: default_memory_limit_mb(),
            cpus: default_cpus(),
            cache_ttl: None,
            pools,
        }
    }

    /// Settings for one language, if configured.
    pub fn pool_settings(&self, language: Language) -> Option<&PoolSettings> {
        self.pools.get(&language)
    }

    /// Languages with a configured pool.
    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.pools.keys().copied()
    }

    /// Iterate over configured (language, settings) pairs.
    pub fn pools(&self) -> impl Iterator<Item = (Language, &PoolSettings)> {
        self.pools.iter().map(|(lang, settings)| (*lang, settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_overrides_and_defaults() {
        let config = EngineConfig::from_toml(
            r#"
container_bin = "podman"
cache_ttl_ms = 2000

[languages.python]
pool_size = 4
time_budget_ms = 5000

[languages.cpp]
image = "registry.local/gcc:13"
max_total = 8
"#,
        )
        .unwrap();

        assert_eq!(config.container_bin, "podman");
        assert_eq!(config.memory_limit_mb, 256);
        assert_eq!(config.cache_ttl, Some(Duration::from_millis(2000)));

        let python = config.pool_settings(Language::Python).unwrap();
        assert_eq!(python.pool_size, 4);
        assert_eq!(python.time_budget, Duration::from_secs(5));
        assert_eq!(python.image, "judgelet/python:latest");
        assert_eq!(python.max_total, None);

        let cpp = config.pool_settings(Language::Cpp).unwrap();
        assert_eq!(cpp.pool_size, 2);
        assert_eq!(cpp.image, "registry.local/gcc:13");
        assert_eq!(cpp.max_total, Some(8));

        assert!(config.pool_settings(Language::Java).is_none());
    }

    #[test]
    fn test_unknown_language_is_an_error() {
        let result = EngineConfig::from_toml("[languages.cobol]\npool_size = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[languages.java]\npool_size = 1").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(
            config.pool_settings(Language::Java).unwrap().time_budget,
            Duration::from_secs(15)
        );
    }

    #[test]
    fn test_defaults_cover_all_languages() {
        let config = EngineConfig::with_defaults();
        for lang in Language::ALL {
            assert!(config.pool_settings(lang).is_some());
        }
        assert!(config.cache_ttl.is_none());
    }
}
