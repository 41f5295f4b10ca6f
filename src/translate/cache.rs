use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Result, SyncError};

/// source text -> language code -> translation
pub type CacheEntries = BTreeMap<String, BTreeMap<String, String>>;

/// Where the translation cache lives between runs.
pub trait CacheStore: Send + Sync {
    fn load(&self) -> Result<CacheEntries>;

    /// Replace the stored cache with `entries`.
    fn save(&self, entries: &CacheEntries) -> Result<()>;

    fn describe(&self) -> String;
}

/// YAML file, rewritten in full on every save.
pub struct YamlFileStore {
    path: PathBuf,
}

impl YamlFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl CacheStore for YamlFileStore {
    fn load(&self) -> Result<CacheEntries> {
        if !self.path.exists() {
            debug!("No translation cache at {}, starting empty", self.path.display());
            return Ok(CacheEntries::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(CacheEntries::new());
        }

        let entries: Option<CacheEntries> = serde_yaml::from_str(&content).map_err(|e| {
            SyncError::Cache(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        Ok(entries.unwrap_or_default())
    }

    fn save(&self, entries: &CacheEntries) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let content = serde_yaml::to_string(entries)?;
        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        file.persist(&self.path)
            .map_err(|e| SyncError::Cache(format!("Failed to replace {}: {}", self.path.display(), e)))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process store; records each save so callers can observe flushes.
#[derive(Default)]
pub struct MemoryStore {
    initial: CacheEntries,
    saves: Mutex<Vec<CacheEntries>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(initial: CacheEntries) -> Self {
        Self {
            initial,
            saves: Mutex::new(Vec::new()),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn last_saved(&self) -> Option<CacheEntries> {
        self.saves.lock().ok().and_then(|s| s.last().cloned())
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<CacheEntries> {
        Ok(self.initial.clone())
    }

    fn save(&self, entries: &CacheEntries) -> Result<()> {
        self.saves
            .lock()
            .map_err(|_| SyncError::Cache("memory store lock poisoned".to_string()))?
            .push(entries.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

impl<S: CacheStore + ?Sized> CacheStore for std::sync::Arc<S> {
    fn load(&self) -> Result<CacheEntries> {
        (**self).load()
    }

    fn save(&self, entries: &CacheEntries) -> Result<()> {
        (**self).save(entries)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub texts: usize,
    pub translations: usize,
    pub per_language: BTreeMap<String, usize>,
}

/// Translations resolved so far. Once a `(text, language)` pair is present it
/// is served from here for the lifetime of the store.
pub struct TranslationCache {
    entries: CacheEntries,
    store: Box<dyn CacheStore>,
    dirty: bool,
}

impl TranslationCache {
    pub fn open(store: Box<dyn CacheStore>) -> Result<Self> {
        let entries = store.load()?;
        info!(
            "Loaded translation cache from {} ({} texts)",
            store.describe(),
            entries.len()
        );
        Ok(Self {
            entries,
            store,
            dirty: false,
        })
    }

    pub fn get(&self, text: &str, language: &str) -> Option<&str> {
        self.entries
            .get(text)
            .and_then(|by_language| by_language.get(language))
            .map(String::as_str)
    }

    /// Adds a translation without dropping the other languages already
    /// known for the same text.
    pub fn insert(&mut self, text: &str, language: &str, translation: &str) {
        self.entries
            .entry(text.to_string())
            .or_default()
            .insert(language.to_string(), translation.to_string());
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist pending entries. Returns whether anything was written.
    pub fn flush(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.store.save(&self.entries)?;
        self.dirty = false;
        debug!("Translation cache written to {}", self.store.describe());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let mut per_language: HashMap<&str, usize> = HashMap::new();
        for by_language in self.entries.values() {
            for language in by_language.keys() {
                *per_language.entry(language.as_str()).or_default() += 1;
            }
        }
        CacheStats {
            texts: self.entries.len(),
            translations: per_language.values().sum(),
            per_language: per_language
                .into_iter()
                .map(|(l, n)| (l.to_string(), n))
                .collect(),
        }
    }
}
