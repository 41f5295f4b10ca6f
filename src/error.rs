use thiserror::Error;

use crate::model::ArtifactIdentity;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Catalog error {status} on {endpoint}: {body}")]
    Catalog {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Staging upload for {identity} ({language}) failed: {reason}")]
    Stage {
        identity: ArtifactIdentity,
        language: String,
        reason: String,
    },

    #[error("Committing upload for {identity} ({language}) failed: {reason}")]
    Commit {
        identity: ArtifactIdentity,
        language: String,
        reason: String,
    },

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
