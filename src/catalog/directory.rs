use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use super::{list_path, CatalogTransport, UPDATE_ARTIFACTS_ENDPOINT};
use crate::error::Result;
use crate::model::{ArtifactIdentity, ArtifactKind};
use crate::translate::TranslationFillEngine;

/// Artifact-level metadata as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHeader {
    pub identity: ArtifactIdentity,
    pub names: BTreeMap<String, String>,
    pub descriptions: Option<BTreeMap<String, String>>,
}

impl ArtifactHeader {
    fn from_value(value: &Value) -> Option<Self> {
        let identity = ArtifactIdentity::new(
            value.get("id")?.as_str()?,
            value.get("agencyID")?.as_str()?,
            value.get("version")?.as_str()?,
        );
        let labels = |key: &str| -> Option<BTreeMap<String, String>> {
            let object = value.get(key)?.as_object()?;
            Some(
                object
                    .iter()
                    .filter_map(|(l, t)| t.as_str().map(|t| (l.clone(), t.to_string())))
                    .collect(),
            )
        };
        Some(Self {
            identity,
            names: labels("names").unwrap_or_default(),
            descriptions: labels("descriptions"),
        })
    }
}

/// Listing and header maintenance for one catalog.
pub struct ArtifactDirectory {
    transport: Arc<dyn CatalogTransport>,
}

impl ArtifactDirectory {
    pub fn new(transport: Arc<dyn CatalogTransport>) -> Self {
        Self { transport }
    }

    /// All artifacts of `kind`. A response without the expected list is
    /// logged and read as no artifacts.
    pub async fn list(&self, kind: ArtifactKind) -> Result<Vec<ArtifactHeader>> {
        info!("Requesting {} listing", kind);
        let response = self.transport.get_json(list_path(kind)).await?;

        let Some(items) = response
            .get("data")
            .and_then(|d| d.get(kind.collection_key()))
            .and_then(Value::as_array)
        else {
            error!("Could not read the {} listing: {}", kind, response);
            return Ok(Vec::new());
        };

        let headers: Vec<ArtifactHeader> = items.iter().filter_map(ArtifactHeader::from_value).collect();
        info!("Found {} {} artifacts", headers.len(), kind);
        Ok(headers)
    }

    pub async fn exists(&self, kind: ArtifactKind, identity: &ArtifactIdentity) -> Result<bool> {
        Ok(self.list(kind).await?.iter().any(|h| &h.identity == identity))
    }

    /// Create the artifact header when the catalog does not list it yet.
    /// Missing name/description languages are filled first when an engine is
    /// given. Returns whether a header was written.
    pub async fn ensure(
        &self,
        kind: ArtifactKind,
        header: ArtifactHeader,
        languages: &[String],
        engine: Option<&mut TranslationFillEngine>,
    ) -> Result<bool> {
        if self.exists(kind, &header.identity).await? {
            info!("{} {} is already in the catalog", kind, header.identity);
            return Ok(false);
        }
        self.put(kind, header, languages, engine).await?;
        Ok(true)
    }

    /// Create or update an artifact header through `updateArtefacts`.
    pub async fn put(
        &self,
        kind: ArtifactKind,
        mut header: ArtifactHeader,
        languages: &[String],
        engine: Option<&mut TranslationFillEngine>,
    ) -> Result<()> {
        if let Some(engine) = engine {
            info!("Translating header labels of {} {}", kind, header.identity);
            header.names = engine.translate_labels(&header.names, languages).await?;
            if let Some(descriptions) = &header.descriptions {
                header.descriptions = Some(engine.translate_labels(descriptions, languages).await?);
            }
        }

        let item = json!({
            "agencyID": header.identity.agency,
            "id": header.identity.id,
            "isFinal": "true",
            "names": header.names,
            "descriptions": header.descriptions,
            "version": header.identity.version,
        });
        let mut data = Map::new();
        data.insert(kind.collection_key().to_string(), Value::Array(vec![item]));
        let body = json!({"data": data, "meta": {}});

        info!("Creating or updating {} {}", kind, header.identity);
        self.transport.put_json(UPDATE_ARTIFACTS_ENDPOINT, &body).await?;
        info!("{} {} written", kind, header.identity);
        Ok(())
    }
}
