use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{CatalogTransport, CsvUpload};
use crate::config::CatalogConfig;
use crate::error::{Result, SyncError};

const CSV_MIME: &str = "application/vnd.ms-excel";

/// reqwest-backed catalog session.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("nodeid"), header_value(&config.node_id)?);
        let language = config.languages.first().map(String::as_str).unwrap_or("es");
        headers.insert(HeaderName::from_static("language"), header_value(language)?);
        if let Some(token) = &config.token {
            headers.insert(AUTHORIZATION, header_value(&format!("bearer {}", token))?);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SyncError::Catalog {
                endpoint: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        debug!("{} answered {} ({} bytes)", path, status, body.len());

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| SyncError::Config(format!("Invalid header value '{}': {}", value, e)))
}

#[async_trait]
impl CatalogTransport for HttpCatalog {
    async fn get_json(&self, path: &str) -> Result<Value> {
        self.send(path, self.client.get(self.url(path))).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(path, self.client.post(self.url(path)).json(body)).await
    }

    async fn put_json(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(path, self.client.put(self.url(path)).json(body)).await
    }

    async fn post_upload(&self, path: &str, upload: CsvUpload) -> Result<Value> {
        let file = Part::bytes(upload.csv)
            .file_name(upload.file_name)
            .mime_str(CSV_MIME)?;
        let form = Form::new()
            .part("file", file)
            .text("CustomData", upload.custom_data);

        let request = self
            .client
            .post(self.url(path))
            .header("language", upload.language)
            .multipart(form);
        self.send(path, request).await
    }
}
