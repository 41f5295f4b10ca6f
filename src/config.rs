use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use crate::error::{Result, SyncError};

fn default_timeout_secs() -> u64 {
    60
}

fn default_model() -> String {
    "llama3.2:3b".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub translate: TranslateConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the catalog API, including the trailing slash
    pub base_url: String,
    /// Node identifier sent in the `nodeId` header
    pub node_id: String,
    /// Pre-issued bearer token (session bootstrap happens elsewhere)
    #[serde(default)]
    pub token: Option<String>,
    /// Configured languages; the first one is the session language
    pub languages: Vec<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Fill missing languages after uploads
    pub enabled: bool,
    /// Which translation service to call
    pub provider: ProviderKind,
    /// Provider endpoint URL
    pub endpoint: String,
    /// API key (DeepL)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name (Ollama)
    #[serde(default = "default_model")]
    pub model: String,
    /// Literal overrides: source text -> language -> fixed translation
    #[serde(default)]
    pub glossary: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    /// DeepL REST API
    DeepL,
    /// Local Ollama model
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// YAML file holding the translation cache
    pub path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig {
                base_url: "http://localhost:5000/api/".to_string(),
                node_id: "DEFAULT".to_string(),
                token: None,
                languages: vec!["es".to_string(), "en".to_string()],
                timeout_secs: default_timeout_secs(),
            },
            translate: TranslateConfig {
                enabled: true,
                provider: ProviderKind::DeepL,
                endpoint: "https://api-free.deepl.com".to_string(),
                api_key: None,
                model: default_model(),
                glossary: BTreeMap::new(),
            },
            cache: CacheConfig {
                path: PathBuf::from(".catalog-sync/translations.yaml"),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| SyncError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SyncError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SyncError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let languages = &self.catalog.languages;
        if languages.is_empty() {
            return Err(SyncError::Config("At least one language must be configured".to_string()));
        }

        let mut seen = HashSet::new();
        for language in languages {
            if !seen.insert(language.as_str()) {
                return Err(SyncError::Config(format!("Language '{}' is configured twice", language)));
            }
        }

        if self.translate.enabled && self.translate.endpoint.trim().is_empty() {
            return Err(SyncError::Config("Translation is enabled but no provider endpoint is set".to_string()));
        }

        Ok(())
    }

    /// Language used for session headers and first uploads.
    pub fn primary_language(&self) -> &str {
        self.catalog.languages.first().map(String::as_str).unwrap_or("es")
    }
}
