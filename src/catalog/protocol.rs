//! Two-phase bulk upload: stage a CSV against the catalog's column checker,
//! then commit the checked document through the import endpoint.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};

use super::{CatalogTransport, CsvUpload, COMMIT_ENDPOINT, STAGE_ENDPOINT};
use crate::error::{Result, SyncError};
use crate::model::{ArtifactIdentity, ArtifactKind, FlatRecord, TextField};

pub const FIELD_SEPARATOR: char = ';';
const UPLOAD_FILE_NAME: &str = "items.csv";
const CSV_HEADER: [&str; 4] = ["Id", "Parent", "Name", "Description"];

fn position<S: Serializer>(value: &Option<usize>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(index) => serializer.serialize_i64(*index as i64),
        None => serializer.serialize_i64(-1),
    }
}

/// Column positions the catalog reads from the staged CSV; `None` goes on
/// the wire as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    #[serde(serialize_with = "position")]
    pub id: Option<usize>,
    #[serde(serialize_with = "position")]
    pub name: Option<usize>,
    #[serde(serialize_with = "position")]
    pub description: Option<usize>,
    #[serde(serialize_with = "position")]
    pub parent: Option<usize>,
    #[serde(serialize_with = "position")]
    pub order: Option<usize>,
    #[serde(serialize_with = "position")]
    pub full_name: Option<usize>,
    #[serde(serialize_with = "position")]
    pub is_default: Option<usize>,
}

impl ColumnMapping {
    /// Layout produced by [`encode_csv`]: `Id;Parent;Name;Description`.
    pub fn standard() -> Self {
        Self {
            id: Some(0),
            parent: Some(1),
            name: Some(2),
            description: Some(3),
            order: None,
            full_name: None,
            is_default: None,
        }
    }
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Serialize)]
struct IdentityStamp<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    #[serde(rename = "Agency")]
    agency: &'a str,
    #[serde(rename = "Version")]
    version: &'a str,
}

impl<'a> From<&'a ArtifactIdentity> for IdentityStamp<'a> {
    fn from(identity: &'a ArtifactIdentity) -> Self {
        Self {
            id: &identity.id,
            agency: &identity.agency,
            version: &identity.version,
        }
    }
}

/// The `CustomData` part of a stage request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadDescriptor<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    identity: IdentityStamp<'a>,
    lang: &'a str,
    first_row_header: &'static str,
    columns: &'a ColumnMapping,
    text_separator: String,
    text_delimiter: Option<char>,
}

pub fn custom_data(
    kind: ArtifactKind,
    identity: &ArtifactIdentity,
    language: &str,
    mapping: &ColumnMapping,
) -> Result<String> {
    let descriptor = UploadDescriptor {
        kind: kind.wire_type(),
        identity: identity.into(),
        lang: language,
        first_row_header: "true",
        columns: mapping,
        text_separator: FIELD_SEPARATOR.to_string(),
        text_delimiter: None,
    };
    Ok(serde_json::to_string(&descriptor)?)
}

fn escape_field(value: &str) -> String {
    if value.contains(FIELD_SEPARATOR) || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Serialize records for one language as `Id;Parent;Name;Description` with a
/// header row. Null cells become empty fields.
pub fn encode_csv(records: &[FlatRecord], language: &str) -> String {
    let mut out = CSV_HEADER.join(&FIELD_SEPARATOR.to_string());
    out.push('\n');

    for record in records {
        let fields = [
            Some(record.id.as_str()),
            record.parent.as_deref(),
            record.text(TextField::Name, language),
            record.text(TextField::Description, language),
        ];
        let line: Vec<String> = fields
            .iter()
            .map(|f| f.map(escape_field).unwrap_or_default())
            .collect();
        out.push_str(&line.join(&FIELD_SEPARATOR.to_string()));
        out.push('\n');
    }
    out
}

/// Overwrite `identity.ID/Agency/Version` in a stage response.
pub fn stamp_identity(response: &mut Value, identity: &ArtifactIdentity) -> Result<()> {
    let document = match response {
        Value::Object(document) => document,
        other => {
            return Err(SyncError::Catalog {
                endpoint: STAGE_ENDPOINT.to_string(),
                status: 200,
                body: format!("expected a JSON object, got {}", other),
            });
        }
    };

    let stamp = document
        .entry("identity")
        .or_insert_with(|| Value::Object(Map::new()));
    if !stamp.is_object() {
        *stamp = Value::Object(Map::new());
    }
    if let Some(fields) = stamp.as_object_mut() {
        fields.insert("ID".to_string(), Value::String(identity.id.clone()));
        fields.insert("Agency".to_string(), Value::String(identity.agency.clone()));
        fields.insert("Version".to_string(), Value::String(identity.version.clone()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub rows: usize,
    pub language: String,
}

pub struct BulkSyncProtocol {
    transport: Arc<dyn CatalogTransport>,
}

impl BulkSyncProtocol {
    pub fn new(transport: Arc<dyn CatalogTransport>) -> Self {
        Self { transport }
    }

    /// Stage `records` for `language`, then commit. Nothing is committed when
    /// staging fails. A failed commit is reported as is; the staged data is
    /// left for manual reconciliation.
    pub async fn stage_and_commit(
        &self,
        kind: ArtifactKind,
        records: &[FlatRecord],
        mapping: &ColumnMapping,
        identity: &ArtifactIdentity,
        language: &str,
    ) -> Result<UploadReport> {
        let staged = self
            .stage(kind, records, mapping, identity, language)
            .await
            .map_err(|e| {
                error!("Staging {} {} for {} failed: {}", records.len(), kind.item_key(), identity, e);
                SyncError::Stage {
                    identity: identity.clone(),
                    language: language.to_string(),
                    reason: e.to_string(),
                }
            })?;

        self.commit(&staged).await.map_err(|e| {
            error!("Commit for {} ({}) failed after staging: {}", identity, language, e);
            SyncError::Commit {
                identity: identity.clone(),
                language: language.to_string(),
                reason: e.to_string(),
            }
        })?;

        info!(
            "Imported {} {} into {} ({})",
            records.len(),
            kind.item_key(),
            identity,
            language
        );
        Ok(UploadReport {
            rows: records.len(),
            language: language.to_string(),
        })
    }

    async fn stage(
        &self,
        kind: ArtifactKind,
        records: &[FlatRecord],
        mapping: &ColumnMapping,
        identity: &ArtifactIdentity,
        language: &str,
    ) -> Result<Value> {
        let upload = CsvUpload {
            file_name: UPLOAD_FILE_NAME.to_string(),
            csv: encode_csv(records, language).into_bytes(),
            custom_data: custom_data(kind, identity, language, mapping)?,
            language: language.to_string(),
        };

        info!(
            "Staging {} {} for {} ({})",
            records.len(),
            kind.item_key(),
            identity,
            language
        );
        let mut response = self.transport.post_upload(STAGE_ENDPOINT, upload).await?;
        stamp_identity(&mut response, identity)?;
        Ok(response)
    }

    async fn commit(&self, staged: &Value) -> Result<Value> {
        self.transport.post_json(COMMIT_ENDPOINT, staged).await
    }
}
