use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info};

use super::{Glossary, TranslationCache, TranslationProvider};
use crate::error::Result;
use crate::model::{ArtifactTable, FlatRecord, TextField};

/// Language a target column is translated from: the last configured language
/// left after removing the target. With more than two languages this is a
/// positional choice, not a ranking.
pub fn source_language_for<'a>(target: &str, languages: &'a [String]) -> Option<&'a str> {
    languages
        .iter()
        .filter(|l| l.as_str() != target)
        .last()
        .map(String::as_str)
}

/// Where a translated value came from, for the per-column summary.
#[derive(Debug, Default, Clone, Copy)]
struct ColumnCounts {
    glossary: usize,
    cached: usize,
    requested: usize,
}

/// Fills missing language cells from the cache, the glossary or a provider.
pub struct TranslationFillEngine {
    provider: Box<dyn TranslationProvider>,
    cache: TranslationCache,
    glossary: Glossary,
}

impl TranslationFillEngine {
    pub fn new(provider: Box<dyn TranslationProvider>, cache: TranslationCache, glossary: Glossary) -> Self {
        Self {
            provider,
            cache,
            glossary,
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Translate every null cell whose source-language cell holds text.
    ///
    /// Mutates `table` in place and returns the rows that received at least
    /// one translation, in table order. The cache is persisted after each
    /// column that produced new entries. Provider errors propagate.
    pub async fn fill(&mut self, table: &mut ArtifactTable) -> Result<Vec<FlatRecord>> {
        let languages = table.languages.clone();
        let mut touched: BTreeSet<usize> = BTreeSet::new();

        for target in &languages {
            let Some(source) = source_language_for(target, &languages) else {
                debug!("Only one language configured, nothing to translate into {}", target);
                continue;
            };
            if languages.len() > 2 {
                debug!("Translating {} from {} (last remaining language)", target, source);
            }

            for field in TextField::ALL {
                let rows: Vec<usize> = table
                    .records
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.text(field, target).is_none() && r.text(field, source).is_some())
                    .map(|(i, _)| i)
                    .collect();

                if rows.is_empty() {
                    continue;
                }

                let mut counts = ColumnCounts::default();
                for &row in &rows {
                    let Some(text) = table.records[row].text(field, source).map(str::to_string) else {
                        continue;
                    };
                    let translation = match self.resolve(&text, target, &mut counts).await {
                        Ok(translation) => translation,
                        Err(e) => {
                            error!(
                                "Translating {} of {} into {} failed: {}",
                                field.column(target),
                                table.records[row].id,
                                target,
                                e
                            );
                            return Err(e);
                        }
                    };
                    table.records[row].set_text(field, target, Some(translation));
                    touched.insert(row);
                }

                self.cache.flush()?;
                info!(
                    "Translated {} values of column {} ({} requested, {} cached, {} glossary)",
                    rows.len(),
                    field.column(target),
                    counts.requested,
                    counts.cached,
                    counts.glossary
                );
            }
        }

        Ok(touched.into_iter().map(|i| table.records[i].clone()).collect())
    }

    /// Fill the languages missing from an artifact-level label map, using the
    /// first label present as the source text.
    pub async fn translate_labels(
        &mut self,
        labels: &BTreeMap<String, String>,
        languages: &[String],
    ) -> Result<BTreeMap<String, String>> {
        let mut result = labels.clone();
        let Some(source_text) = languages
            .iter()
            .find_map(|l| labels.get(l))
            .or_else(|| labels.values().next())
            .cloned()
        else {
            return Ok(result);
        };

        let mut counts = ColumnCounts::default();
        for language in languages {
            if result.contains_key(language) {
                continue;
            }
            let translation = self.resolve(&source_text, language, &mut counts).await?;
            result.insert(language.clone(), translation);
        }
        self.cache.flush()?;
        Ok(result)
    }

    async fn resolve(&mut self, text: &str, language: &str, counts: &mut ColumnCounts) -> Result<String> {
        if let Some(fixed) = self.glossary.lookup(text, language) {
            counts.glossary += 1;
            return Ok(fixed.to_string());
        }

        if let Some(cached) = self.cache.get(text, language) {
            debug!("Cache hit for '{}' -> {}", text, language);
            counts.cached += 1;
            return Ok(cached.to_string());
        }

        debug!("Requesting translation of '{}' into {}", text, language);
        let translation = self.provider.translate(text, language).await?;
        self.cache.insert(text, language, &translation);
        counts.requested += 1;
        Ok(translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::translate::{MemoryStore, MockTranslationProvider};
    use std::sync::Arc;

    fn langs() -> Vec<String> {
        vec!["es".to_string(), "en".to_string()]
    }

    fn table(records: Vec<FlatRecord>) -> ArtifactTable {
        ArtifactTable::new(langs(), records)
    }

    fn engine(provider: MockTranslationProvider, store: Arc<MemoryStore>) -> TranslationFillEngine {
        let cache = TranslationCache::open(Box::new(store)).unwrap();
        TranslationFillEngine::new(Box::new(provider), cache, Glossary::default())
    }

    #[test]
    fn test_source_language_selection() {
        let two = langs();
        assert_eq!(source_language_for("en", &two), Some("es"));
        assert_eq!(source_language_for("es", &two), Some("en"));

        let three = vec!["es".to_string(), "en".to_string(), "fr".to_string()];
        assert_eq!(source_language_for("es", &three), Some("fr"));
        assert_eq!(source_language_for("fr", &three), Some("en"));

        assert_eq!(source_language_for("es", &["es".to_string()]), None);
    }

    #[tokio::test]
    async fn test_fills_gap_with_one_provider_call() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate()
            .withf(|text, lang| text == "Hola" && lang == "en")
            .times(1)
            .returning(|_, _| Ok("Hello".to_string()));

        let store = Arc::new(MemoryStore::new());
        let mut engine = engine(provider, store.clone());
        let mut data = table(vec![FlatRecord::new("GREET", None, &langs()).with_text(TextField::Name, "es", "Hola")]);

        let translated = engine.fill(&mut data).await.unwrap();

        assert_eq!(data.records[0].text(TextField::Name, "en"), Some("Hello"));
        assert_eq!(translated.len(), 1);
        assert_eq!(translated[0].id, "GREET");
        assert_eq!(engine.cache().get("Hola", "en"), Some("Hello"));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_second_fill_makes_no_provider_calls() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate()
            .times(2)
            .returning(|text, _| Ok(format!("{} (en)", text)));

        let mut engine = engine(provider, Arc::new(MemoryStore::new()));
        let original = table(vec![
            FlatRecord::new("A", None, &langs()).with_text(TextField::Name, "es", "Uno"),
            FlatRecord::new("B", Some("A".to_string()), &langs())
                .with_text(TextField::Name, "es", "Dos")
                .with_text(TextField::Description, "es", "Uno"),
        ]);

        let mut first = original.clone();
        engine.fill(&mut first).await.unwrap();

        let mut second = original.clone();
        engine.fill(&mut second).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.records[1].text(TextField::Description, "en"), Some("Uno (en)"));
    }

    #[tokio::test]
    async fn test_rows_without_source_text_are_left_alone() {
        let mut provider = MockTranslationProvider::new();
        provider.expect_translate().never();

        let store = Arc::new(MemoryStore::new());
        let mut engine = engine(provider, store.clone());
        let mut data = table(vec![FlatRecord::new("EMPTY", None, &langs())]);

        let translated = engine.fill(&mut data).await.unwrap();

        assert!(translated.is_empty());
        assert_eq!(data.records[0].text(TextField::Name, "en"), None);
        assert_eq!(data.records[0].text(TextField::Name, "es"), None);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_fills_in_both_directions() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate()
            .withf(|text, lang| text == "Health" && lang == "es")
            .times(1)
            .returning(|_, _| Ok("Salud".to_string()));
        provider
            .expect_translate()
            .withf(|text, lang| text == "Educación" && lang == "en")
            .times(1)
            .returning(|_, _| Ok("Education".to_string()));

        let mut engine = engine(provider, Arc::new(MemoryStore::new()));
        let mut data = table(vec![
            FlatRecord::new("EDU", None, &langs()).with_text(TextField::Name, "es", "Educación"),
            FlatRecord::new("HEALTH", None, &langs()).with_text(TextField::Name, "en", "Health"),
            FlatRecord::new("DONE", None, &langs())
                .with_text(TextField::Name, "es", "Hecho")
                .with_text(TextField::Name, "en", "Done"),
        ]);

        let translated = engine.fill(&mut data).await.unwrap();
        let ids: Vec<&str> = translated.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["EDU", "HEALTH"]);
        assert_eq!(data.records[1].text(TextField::Name, "es"), Some("Salud"));
    }

    #[tokio::test]
    async fn test_glossary_and_preloaded_cache_skip_provider() {
        let mut provider = MockTranslationProvider::new();
        provider.expect_translate().never();

        let preloaded = crate::translate::CacheEntries::from([(
            "Sanidad".to_string(),
            BTreeMap::from([("en".to_string(), "Health".to_string())]),
        )]);
        let cache = TranslationCache::open(Box::new(MemoryStore::with_entries(preloaded))).unwrap();
        let glossary = Glossary::new(BTreeMap::from([(
            "N/A".to_string(),
            BTreeMap::from([("en".to_string(), "N/A".to_string())]),
        )]));
        let mut engine = TranslationFillEngine::new(Box::new(provider), cache, glossary);

        let mut data = table(vec![
            FlatRecord::new("NA", None, &langs()).with_text(TextField::Name, "es", "N/A"),
            FlatRecord::new("SAN", None, &langs()).with_text(TextField::Name, "es", "Sanidad"),
        ]);
        engine.fill(&mut data).await.unwrap();

        assert_eq!(data.records[0].text(TextField::Name, "en"), Some("N/A"));
        assert_eq!(data.records[1].text(TextField::Name, "en"), Some("Health"));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate()
            .returning(|_, _| Err(SyncError::Translation("quota exceeded".to_string())));

        let mut engine = engine(provider, Arc::new(MemoryStore::new()));
        let mut data = table(vec![FlatRecord::new("A", None, &langs()).with_text(TextField::Name, "es", "Uno")]);

        let result = engine.fill(&mut data).await;
        assert!(matches!(result, Err(SyncError::Translation(_))));
        assert_eq!(data.records[0].text(TextField::Name, "en"), None);
    }

    #[tokio::test]
    async fn test_cache_is_saved_after_each_column() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate()
            .times(2)
            .returning(|text, _| Ok(format!("{} (en)", text)));

        let store = Arc::new(MemoryStore::new());
        let mut engine = engine(provider, store.clone());
        let mut data = table(vec![
            FlatRecord::new("A", None, &langs())
                .with_text(TextField::Name, "es", "Uno")
                .with_text(TextField::Description, "es", "El primero"),
        ]);

        engine.fill(&mut data).await.unwrap();

        assert_eq!(store.save_count(), 2);
        let saved = store.last_saved().unwrap();
        assert_eq!(saved["Uno"]["en"], "Uno (en)");
        assert_eq!(saved["El primero"]["en"], "El primero (en)");
    }

    #[tokio::test]
    async fn test_failed_column_keeps_earlier_columns_persisted() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate()
            .withf(|text, _| text == "Uno")
            .times(1)
            .returning(|_, _| Ok("One".to_string()));
        provider
            .expect_translate()
            .withf(|text, _| text == "El primero")
            .times(1)
            .returning(|_, _| Err(SyncError::Translation("service unavailable".to_string())));

        let store = Arc::new(MemoryStore::new());
        let mut engine = engine(provider, store.clone());
        let mut data = table(vec![
            FlatRecord::new("A", None, &langs())
                .with_text(TextField::Name, "es", "Uno")
                .with_text(TextField::Description, "es", "El primero"),
        ]);

        assert!(engine.fill(&mut data).await.is_err());

        assert_eq!(store.save_count(), 1);
        let saved = store.last_saved().unwrap();
        assert_eq!(saved["Uno"]["en"], "One");
        assert!(!saved.contains_key("El primero"));
    }

    #[tokio::test]
    async fn test_translate_labels_fills_missing_languages() {
        let mut provider = MockTranslationProvider::new();
        provider
            .expect_translate()
            .withf(|text, lang| text == "Municipios" && lang == "en")
            .times(1)
            .returning(|_, _| Ok("Municipalities".to_string()));

        let mut engine = engine(provider, Arc::new(MemoryStore::new()));
        let labels = BTreeMap::from([("es".to_string(), "Municipios".to_string())]);

        let result = engine.translate_labels(&labels, &langs()).await.unwrap();
        assert_eq!(result["es"], "Municipios");
        assert_eq!(result["en"], "Municipalities");

        let again = engine.translate_labels(&labels, &langs()).await.unwrap();
        assert_eq!(again, result);
    }
}
