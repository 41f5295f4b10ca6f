use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TranslationProvider;
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub text: String,
}

/// Translation through a local Ollama model, asking for JSON output.
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(client: Client, endpoint: &str, model: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Taxonomy labels are short; the prompt keeps the model from adding notes.
    fn build_prompt(&self, text: &str, target_language: &str) -> String {
        let language_name = language_code_to_name(target_language);
        format!(
            "You are a professional translator of statistical classifications.\n\
             \n\
             CRITICAL: Translate the label to {} ONLY (language code: {}).\n\
             Keep acronyms, codes and numbers unchanged.\n\
             \n\
             Return ONLY the translation in JSON format as {{\"text\":\"your {} translation here\"}}.\n\
             \n\
             Label to translate: \"{}\"\n",
            language_name, target_language, language_name, text
        )
    }
}

#[async_trait]
impl TranslationProvider for OllamaProvider {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: self.build_prompt(text, target_language),
            stream: false,
            format: "json".to_string(),
        };

        let url = format!("{}/api/generate", self.endpoint);

        debug!("Sending translation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SyncError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SyncError::Translation(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Translation(format!("Failed to parse response: {}", e)))?;

        let raw_response = generated.response.trim();

        debug!("Raw Ollama response: {}", raw_response);

        if raw_response.is_empty() {
            return Err(SyncError::Translation("Empty translation received".to_string()));
        }

        Ok(extract_translation(raw_response))
    }
}

/// Pull the translated label out of a model reply, JSON first, then the
/// first line that is not commentary.
fn extract_translation(raw_response: &str) -> String {
    if let Ok(result) = serde_json::from_str::<TranslationResult>(raw_response) {
        return result.text.trim().to_string();
    }

    raw_response
        .lines()
        .map(str::trim)
        .find(|line| {
            !line.is_empty()
                && !line.starts_with("Here is")
                && !line.starts_with("Translation:")
                && !(line.starts_with("**") && line.ends_with("**"))
        })
        .unwrap_or(raw_response)
        .to_string()
}

fn language_code_to_name(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "es" => "Spanish".to_string(),
        "en" => "English".to_string(),
        "fr" => "French".to_string(),
        "de" => "German".to_string(),
        "it" => "Italian".to_string(),
        "pt" => "Portuguese".to_string(),
        "ca" => "Catalan".to_string(),
        "eu" => "Basque".to_string(),
        "gl" => "Galician".to_string(),
        "nl" => "Dutch".to_string(),
        _ => code.to_string(),
    }
}
