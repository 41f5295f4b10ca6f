// Translation fill architecture
//
// - cache: persistent text -> language -> translation store behind a storage port
// - glossary: literal overrides that never reach a provider
// - fill: finds missing language cells in a table and resolves them
// - deepl / ollama: provider implementations selected by the factory

pub mod cache;
pub mod deepl;
pub mod fill;
pub mod glossary;
pub mod ollama;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub use cache::{CacheEntries, CacheStats, CacheStore, MemoryStore, TranslationCache, YamlFileStore};
pub use fill::{source_language_for, TranslationFillEngine};
pub use glossary::Glossary;

use crate::config::{ProviderKind, TranslateConfig};
use crate::error::{Result, SyncError};

/// A service that turns text into another language.
///
/// `target_language` is always the catalog's language code (`en`, `es`...);
/// implementations map it to whatever their API expects.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

/// Factory for creating provider instances
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_provider(config: &TranslateConfig, timeout: Duration) -> Result<Box<dyn TranslationProvider>> {
        let client = Client::builder().timeout(timeout).build()?;

        match config.provider {
            ProviderKind::DeepL => {
                let api_key = config.api_key.clone().ok_or_else(|| {
                    SyncError::Config("DeepL provider requires translate.api_key".to_string())
                })?;
                Ok(Box::new(deepl::DeepLProvider::new(client, &config.endpoint, api_key)))
            }
            ProviderKind::Ollama => Ok(Box::new(ollama::OllamaProvider::new(
                client,
                &config.endpoint,
                &config.model,
            ))),
        }
    }
}
