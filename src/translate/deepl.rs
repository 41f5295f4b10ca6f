use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::TranslationProvider;
use crate::error::{Result, SyncError};

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
}

/// DeepL REST client.
pub struct DeepLProvider {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl DeepLProvider {
    pub fn new(client: Client, endpoint: &str, api_key: String) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

/// DeepL rejects bare `EN`/`PT` as targets and wants the regional variant.
pub fn provider_language_code(language: &str) -> String {
    match language.to_lowercase().as_str() {
        "en" => "EN-GB".to_string(),
        "pt" => "PT-PT".to_string(),
        other => other.to_uppercase(),
    }
}

#[async_trait]
impl TranslationProvider for DeepLProvider {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let target = provider_language_code(target_language);
        let url = format!("{}/v2/translate", self.endpoint);

        debug!("Requesting DeepL translation to {}", target);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .form(&[("text", text), ("target_lang", target.as_str())])
            .send()
            .await
            .map_err(|e| SyncError::Translation(format!("DeepL request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SyncError::Translation(format!(
                "DeepL API error {}: {}",
                status, error_text
            )));
        }

        let body: DeepLResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Translation(format!("Failed to parse DeepL response: {}", e)))?;

        body.translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| SyncError::Translation("DeepL returned no translations".to_string()))
    }
}
