// Catalog access
//
// - http: reqwest transport carrying the session headers
// - protocol: CSV encoding and the stage/commit bulk upload
// - directory: artifact listings and header create/update

pub mod directory;
pub mod http;
pub mod protocol;

use async_trait::async_trait;
use serde_json::{json, Value};

pub use directory::{ArtifactDirectory, ArtifactHeader};
pub use http::HttpCatalog;
pub use protocol::{BulkSyncProtocol, ColumnMapping, UploadReport};

use crate::error::Result;
use crate::model::{ArtifactIdentity, ArtifactKind};

pub const STAGE_ENDPOINT: &str = "CheckImportedFileCsvItem";
pub const COMMIT_ENDPOINT: &str = "importFileCsvItem";
pub const UPDATE_ARTIFACTS_ENDPOINT: &str = "updateArtefacts";

/// A CSV file plus its `CustomData` descriptor, sent as one multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvUpload {
    pub file_name: String,
    pub csv: Vec<u8>,
    pub custom_data: String,
    pub language: String,
}

/// Request/response access to the catalog. Every method either returns the
/// decoded JSON body (`Null` for an empty body) or fails on connectivity or a
/// non-success status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    async fn get_json(&self, path: &str) -> Result<Value>;

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value>;

    async fn put_json(&self, path: &str, body: &Value) -> Result<Value>;

    async fn post_upload(&self, path: &str, upload: CsvUpload) -> Result<Value>;
}

/// Codelists are read through the paged NoSQL endpoint; schemes through
/// their REST path.
pub async fn fetch_artifact(
    transport: &dyn CatalogTransport,
    kind: ArtifactKind,
    identity: &ArtifactIdentity,
    language: &str,
) -> Result<Value> {
    match kind {
        ArtifactKind::Codelist => {
            let body = json!({
                "id": identity.id,
                "agencyId": identity.agency,
                "version": identity.version,
                "lang": language,
                "pageNum": 1,
                "pageSize": i32::MAX,
                "rebuildDb": false,
            });
            transport.post_json("NOSQL/codelist/", &body).await
        }
        ArtifactKind::ConceptScheme | ArtifactKind::CategoryScheme => {
            let path = format!(
                "{}/{}/{}/{}",
                list_path(kind),
                identity.id,
                identity.agency,
                identity.version
            );
            transport.get_json(&path).await
        }
    }
}

/// Path listing every artifact of `kind`.
pub fn list_path(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Codelist => "codelist",
        ArtifactKind::ConceptScheme => "conceptScheme",
        ArtifactKind::CategoryScheme => "categoryScheme",
    }
}
