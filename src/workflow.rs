use std::sync::Arc;
use tracing::{error, info, warn};

use crate::catalog::{fetch_artifact, BulkSyncProtocol, CatalogTransport, ColumnMapping, UploadReport};
use crate::error::Result;
use crate::flatten::{flatten, read_artifact_response, FetchOutcome};
use crate::model::{ArtifactIdentity, ArtifactKind, ArtifactTable, FlatRecord, PendingUploadBatch, TextField};
use crate::translate::TranslationFillEngine;

/// How the last fetch went, kept so callers can tell an empty artifact from
/// an unreadable one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    NotFetched,
    Loaded,
    EmptyArtifact,
    MalformedResponse,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Rows imported from the pending batch
    pub added: usize,
    /// One entry per language that received translated rows
    pub translations: Vec<UploadReport>,
}

/// Local view of one taxonomy artifact: the fetched table plus records
/// waiting to be uploaded.
pub struct TaxonomySync {
    kind: ArtifactKind,
    identity: ArtifactIdentity,
    languages: Vec<String>,
    transport: Arc<dyn CatalogTransport>,
    protocol: BulkSyncProtocol,
    mapping: ColumnMapping,
    table: ArtifactTable,
    pending: PendingUploadBatch,
    status: FetchStatus,
}

impl TaxonomySync {
    pub fn new(
        kind: ArtifactKind,
        identity: ArtifactIdentity,
        languages: Vec<String>,
        transport: Arc<dyn CatalogTransport>,
    ) -> Self {
        Self {
            kind,
            identity,
            table: ArtifactTable::empty(languages.clone()),
            languages,
            protocol: BulkSyncProtocol::new(transport.clone()),
            transport,
            mapping: ColumnMapping::standard(),
            pending: PendingUploadBatch::new(),
            status: FetchStatus::NotFetched,
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn identity(&self) -> &ArtifactIdentity {
        &self.identity
    }

    pub fn table(&self) -> &ArtifactTable {
        &self.table
    }

    pub fn pending(&self) -> &PendingUploadBatch {
        &self.pending
    }

    pub fn status(&self) -> FetchStatus {
        self.status
    }

    fn primary_language(&self) -> &str {
        self.languages.first().map(String::as_str).unwrap_or("es")
    }

    /// Replace the table with the catalog's current state. Connectivity and
    /// HTTP errors propagate; an empty or unreadable artifact is logged and
    /// leaves an empty table.
    pub async fn refresh(&mut self) -> Result<&ArtifactTable> {
        info!("Fetching {} {}", self.kind, self.identity);
        let response = fetch_artifact(
            self.transport.as_ref(),
            self.kind,
            &self.identity,
            self.primary_language(),
        )
        .await?;

        let outcome = read_artifact_response(self.kind, &response);
        self.status = match &outcome {
            FetchOutcome::Loaded(_) => FetchStatus::Loaded,
            FetchOutcome::EmptyArtifact => {
                warn!("{} {} has no {}", self.kind, self.identity, self.kind.item_key());
                FetchStatus::EmptyArtifact
            }
            FetchOutcome::MalformedResponse(body) => {
                error!("Unexpected response while loading {} {}: {}", self.kind, self.identity, body);
                FetchStatus::MalformedResponse
            }
        };

        self.table = ArtifactTable::new(self.languages.clone(), flatten(outcome.nodes(), &self.languages));
        info!(
            "{} {} holds {} {}",
            self.kind,
            self.identity,
            self.table.len(),
            self.kind.item_key()
        );
        Ok(&self.table)
    }

    /// Queue a new item. Returns false when the id is already in the catalog
    /// or in the batch.
    pub fn add_record(&mut self, record: FlatRecord) -> bool {
        let id = record.id.clone();
        let added = self.pending.add(record, &self.table);
        if !added {
            info!("{} already present in {}, not queued", id, self.identity);
        }
        added
    }

    /// Convenience for [`add_record`](Self::add_record) with one language.
    pub fn add_item(
        &mut self,
        id: &str,
        parent: Option<&str>,
        language: &str,
        name: &str,
        description: Option<&str>,
    ) -> bool {
        let mut record = FlatRecord::new(id, parent.map(str::to_string), &self.languages)
            .with_text(TextField::Name, language, name);
        if let Some(description) = description {
            record = record.with_text(TextField::Description, language, description);
        }
        self.add_record(record)
    }

    /// Upload the pending batch in `language`, then once more for every
    /// other configured language some pending record carries text in. The
    /// batch is cleared and the table re-fetched only after every upload
    /// succeeds.
    pub async fn push_pending(&mut self, language: &str) -> Result<usize> {
        if self.pending.is_empty() {
            info!("{} {} is up to date", self.kind, self.identity);
            return Ok(0);
        }

        info!(
            "Uploading {} new {} to {}",
            self.pending.len(),
            self.kind.item_key(),
            self.identity
        );
        let report = self
            .protocol
            .stage_and_commit(self.kind, self.pending.records(), &self.mapping, &self.identity, language)
            .await?;

        for extra in self.languages.iter().filter(|l| l.as_str() != language) {
            let rows: Vec<FlatRecord> = self
                .pending
                .records()
                .iter()
                .filter(|r| TextField::ALL.iter().any(|&f| r.text(f, extra).is_some()))
                .cloned()
                .collect();
            if rows.is_empty() {
                continue;
            }
            info!("Uploading {} text of {} new {}", extra, rows.len(), self.kind.item_key());
            self.protocol
                .stage_and_commit(self.kind, &rows, &self.mapping, &self.identity, extra)
                .await?;
        }

        self.pending.clear();
        self.refresh().await?;
        Ok(report.rows)
    }

    /// Fill missing languages and upload, per language, the rows whose cells
    /// in that language were filled. Re-fetches when anything was uploaded.
    pub async fn push_translations(&mut self, engine: &mut TranslationFillEngine) -> Result<Vec<UploadReport>> {
        info!("Starting translation of {} {}", self.kind, self.identity);
        let before = self.table.clone();
        let translated = match engine.fill(&mut self.table).await {
            Ok(translated) => translated,
            Err(e) => {
                error!("Translation of {} {} failed: {}", self.kind, self.identity, e);
                return Err(e);
            }
        };

        let mut reports = Vec::new();
        for language in &self.languages {
            let rows = rows_filled_in(&before, &translated, language);
            if rows.is_empty() {
                continue;
            }
            info!(
                "Uploading {} translated {} of {} ({})",
                rows.len(),
                self.kind.item_key(),
                self.identity,
                language
            );
            let report = self
                .protocol
                .stage_and_commit(self.kind, &rows, &self.mapping, &self.identity, language)
                .await?;
            reports.push(report);
        }

        if !reports.is_empty() {
            self.refresh().await?;
        }
        info!("Translation of {} {} finished", self.kind, self.identity);
        Ok(reports)
    }

    /// Full cycle: fetch, upload queued items, then translations when an
    /// engine is supplied.
    pub async fn synchronize(
        &mut self,
        language: &str,
        engine: Option<&mut TranslationFillEngine>,
    ) -> Result<SyncReport> {
        if self.status == FetchStatus::NotFetched {
            self.refresh().await?;
        }

        let added = self.push_pending(language).await?;
        let translations = match engine {
            Some(engine) => self.push_translations(engine).await?,
            None => Vec::new(),
        };
        Ok(SyncReport { added, translations })
    }
}

/// Translated rows that gained text in `language` compared to `before`.
fn rows_filled_in(before: &ArtifactTable, translated: &[FlatRecord], language: &str) -> Vec<FlatRecord> {
    translated
        .iter()
        .filter(|row| {
            let Some(old) = before.get(&row.id) else {
                return true;
            };
            TextField::ALL
                .iter()
                .any(|&field| old.text(field, language).is_none() && row.text(field, language).is_some())
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MockCatalogTransport, COMMIT_ENDPOINT};
    use crate::error::SyncError;
    use crate::translate::{Glossary, MemoryStore, MockTranslationProvider, TranslationCache};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    fn langs() -> Vec<String> {
        vec!["es".to_string(), "en".to_string()]
    }

    fn identity() -> ArtifactIdentity {
        ArtifactIdentity::new("CAT_TOPICS", "ESC01", "1.0")
    }

    fn categories() -> Value {
        json!({"data": {"categorySchemes": [{"categories": [
            {"id": "SOC", "names": {"es": "Sociedad", "en": "Society"}, "categories": [
                {"id": "EDU", "names": {"es": "Educación"}}
            ]}
        ]}]}})
    }

    fn engine(provider: MockTranslationProvider) -> TranslationFillEngine {
        let cache = TranslationCache::open(Box::new(MemoryStore::new())).unwrap();
        TranslationFillEngine::new(Box::new(provider), cache, Glossary::default())
    }

    #[tokio::test]
    async fn test_refresh_flattens_fetched_tree() {
        let mut transport = MockCatalogTransport::new();
        transport.expect_get_json().times(1).returning(|_| Ok(categories()));

        let mut sync = TaxonomySync::new(ArtifactKind::CategoryScheme, identity(), langs(), Arc::new(transport));
        let table = sync.refresh().await.unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("EDU").unwrap().parent.as_deref(), Some("SOC"));
        assert_eq!(sync.status(), FetchStatus::Loaded);
    }

    #[tokio::test]
    async fn test_refresh_soft_fails_on_malformed_response() {
        let mut transport = MockCatalogTransport::new();
        transport
            .expect_get_json()
            .returning(|_| Ok(json!({"error": "session expired"})));

        let mut sync = TaxonomySync::new(ArtifactKind::ConceptScheme, identity(), langs(), Arc::new(transport));
        assert!(sync.refresh().await.unwrap().is_empty());
        assert_eq!(sync.status(), FetchStatus::MalformedResponse);
    }

    #[tokio::test]
    async fn test_refresh_propagates_http_errors() {
        let mut transport = MockCatalogTransport::new();
        transport.expect_get_json().returning(|path| {
            Err(SyncError::Catalog {
                endpoint: path.to_string(),
                status: 503,
                body: String::new(),
            })
        });

        let mut sync = TaxonomySync::new(ArtifactKind::CategoryScheme, identity(), langs(), Arc::new(transport));
        assert!(matches!(sync.refresh().await, Err(SyncError::Catalog { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_add_record_skips_known_ids() {
        let mut transport = MockCatalogTransport::new();
        transport.expect_get_json().returning(|_| Ok(categories()));

        let mut sync = TaxonomySync::new(ArtifactKind::CategoryScheme, identity(), langs(), Arc::new(transport));
        sync.refresh().await.unwrap();

        assert!(!sync.add_item("edu", Some("SOC"), "es", "Educación", None));
        assert!(sync.add_item("HEALTH", Some("SOC"), "es", "Salud", Some("Sanidad pública")));
        assert!(!sync.add_item("health", None, "es", "Salud", None));
        assert_eq!(sync.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_stage_failure_keeps_pending_batch() {
        let mut transport = MockCatalogTransport::new();
        transport.expect_get_json().times(1).returning(|_| Ok(categories()));
        transport.expect_post_upload().times(1).returning(|path, _| {
            Err(SyncError::Catalog {
                endpoint: path.to_string(),
                status: 400,
                body: "invalid parent".to_string(),
            })
        });
        transport.expect_post_json().never();

        let mut sync = TaxonomySync::new(ArtifactKind::CategoryScheme, identity(), langs(), Arc::new(transport));
        sync.refresh().await.unwrap();
        sync.add_item("HEALTH", Some("SOC"), "es", "Salud", None);

        let result = sync.push_pending("es").await;
        assert!(matches!(result, Err(SyncError::Stage { .. })));
        assert_eq!(sync.pending().len(), 1);
        assert_eq!(sync.pending().records()[0].id, "HEALTH");
    }

    #[tokio::test]
    async fn test_push_pending_clears_batch_and_refetches() {
        let fetches = Arc::new(Mutex::new(0));
        let counter = fetches.clone();

        let mut transport = MockCatalogTransport::new();
        transport.expect_get_json().returning(move |_| {
            *counter.lock().unwrap() += 1;
            Ok(categories())
        });
        transport
            .expect_post_upload()
            .withf(|_, upload| String::from_utf8_lossy(&upload.csv).contains("HEALTH;SOC;Salud;"))
            .times(1)
            .returning(|_, _| Ok(json!({"identity": {}})));
        transport
            .expect_post_json()
            .withf(|path, body| path == COMMIT_ENDPOINT && body["identity"]["ID"] == "CAT_TOPICS")
            .times(1)
            .returning(|_, _| Ok(Value::Null));

        let mut sync = TaxonomySync::new(ArtifactKind::CategoryScheme, identity(), langs(), Arc::new(transport));
        sync.refresh().await.unwrap();
        sync.add_item("HEALTH", Some("SOC"), "es", "Salud", None);

        assert_eq!(sync.push_pending("es").await.unwrap(), 1);
        assert!(sync.pending().is_empty());
        assert_eq!(*fetches.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_upload() {
        let mut transport = MockCatalogTransport::new();
        transport.expect_post_upload().never();
        transport.expect_post_json().never();

        let mut sync = TaxonomySync::new(ArtifactKind::Codelist, identity(), langs(), Arc::new(transport));
        assert_eq!(sync.push_pending("es").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_push_translations_uploads_only_filled_language() {
        let mut transport = MockCatalogTransport::new();
        transport.expect_get_json().returning(|_| Ok(categories()));
        transport
            .expect_post_upload()
            .withf(|_, upload| {
                let csv = String::from_utf8_lossy(&upload.csv);
                upload.language == "en" && csv.contains("EDU;SOC;Education;") && !csv.contains("SOC;;")
            })
            .times(1)
            .returning(|_, _| Ok(json!({})));
        transport
            .expect_post_json()
            .times(1)
            .returning(|_, _| Ok(Value::Null));

        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate()
            .withf(|text, lang| text == "Educación" && lang == "en")
            .times(1)
            .returning(|_, _| Ok("Education".to_string()));
        let mut engine = engine(provider);

        let mut sync = TaxonomySync::new(ArtifactKind::CategoryScheme, identity(), langs(), Arc::new(transport));
        sync.refresh().await.unwrap();
        let reports = sync.push_translations(&mut engine).await.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].language, "en");
        assert_eq!(reports[0].rows, 1);
    }

    #[tokio::test]
    async fn test_synchronize_runs_full_cycle() {
        let mut transport = MockCatalogTransport::new();
        transport.expect_get_json().returning(|_| Ok(categories()));
        transport.expect_post_upload().times(2).returning(|_, _| Ok(json!({})));
        transport.expect_post_json().times(2).returning(|_, _| Ok(Value::Null));

        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate()
            .returning(|text, _| Ok(format!("{}!", text)));
        let mut engine = engine(provider);

        let mut sync = TaxonomySync::new(ArtifactKind::CategoryScheme, identity(), langs(), Arc::new(transport));
        sync.refresh().await.unwrap();
        sync.add_item("HEALTH", Some("SOC"), "es", "Salud", None);

        let report = sync.synchronize("es", Some(&mut engine)).await.unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.translations.len(), 1);
    }

    #[tokio::test]
    async fn test_push_pending_uploads_every_language_with_text() {
        let uploads = Arc::new(Mutex::new(Vec::new()));
        let seen = uploads.clone();

        let mut transport = MockCatalogTransport::new();
        transport.expect_get_json().returning(|_| Ok(categories()));
        transport.expect_post_upload().times(2).returning(move |_, upload| {
            seen.lock()
                .unwrap()
                .push((upload.language.clone(), String::from_utf8_lossy(&upload.csv).to_string()));
            Ok(json!({}))
        });
        transport.expect_post_json().times(2).returning(|_, _| Ok(Value::Null));

        let mut sync = TaxonomySync::new(ArtifactKind::CategoryScheme, identity(), langs(), Arc::new(transport));
        sync.refresh().await.unwrap();
        let record = FlatRecord::new("HEALTH", Some("SOC".to_string()), &langs())
            .with_text(TextField::Name, "es", "Salud")
            .with_text(TextField::Name, "en", "Health");
        assert!(sync.add_record(record));

        assert_eq!(sync.push_pending("es").await.unwrap(), 1);
        assert!(sync.pending().is_empty());

        let uploads = uploads.lock().unwrap();
        assert_eq!(uploads[0].0, "es");
        assert!(uploads[0].1.contains("HEALTH;SOC;Salud;"));
        assert_eq!(uploads[1].0, "en");
        assert!(uploads[1].1.contains("HEALTH;SOC;Health;"));
    }

    #[tokio::test]
    async fn test_second_language_failure_keeps_pending_batch() {
        let mut transport = MockCatalogTransport::new();
        transport.expect_get_json().times(1).returning(|_| Ok(categories()));
        transport
            .expect_post_upload()
            .times(2)
            .returning(|path, upload| {
                if upload.language == "en" {
                    Err(SyncError::Catalog {
                        endpoint: path.to_string(),
                        status: 500,
                        body: String::new(),
                    })
                } else {
                    Ok(json!({}))
                }
            });
        transport.expect_post_json().times(1).returning(|_, _| Ok(Value::Null));

        let mut sync = TaxonomySync::new(ArtifactKind::CategoryScheme, identity(), langs(), Arc::new(transport));
        sync.refresh().await.unwrap();
        sync.add_record(
            FlatRecord::new("HEALTH", None, &langs())
                .with_text(TextField::Name, "es", "Salud")
                .with_text(TextField::Description, "en", "Public health"),
        );

        let result = sync.push_pending("es").await;
        assert!(matches!(result, Err(SyncError::Stage { ref language, .. }) if language == "en"));
        assert_eq!(sync.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_translation_failure_uploads_nothing() {
        let mut transport = MockCatalogTransport::new();
        transport.expect_get_json().times(1).returning(|_| Ok(categories()));
        transport.expect_post_upload().never();
        transport.expect_post_json().never();

        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate()
            .returning(|_, _| Err(SyncError::Translation("quota exceeded".to_string())));
        let mut engine = engine(provider);

        let mut sync = TaxonomySync::new(ArtifactKind::CategoryScheme, identity(), langs(), Arc::new(transport));
        sync.refresh().await.unwrap();

        let result = sync.push_translations(&mut engine).await;
        assert!(matches!(result, Err(SyncError::Translation(_))));
    }

    #[test]
    fn test_rows_filled_in_compares_with_previous_table() {
        let before = ArtifactTable::new(
            langs(),
            vec![FlatRecord::new("A", None, &langs()).with_text(TextField::Name, "es", "Uno")],
        );
        let after = vec![before.records[0].clone().with_text(TextField::Name, "en", "One")];

        assert_eq!(rows_filled_in(&before, &after, "en").len(), 1);
        assert!(rows_filled_in(&before, &after, "es").is_empty());
    }
}
