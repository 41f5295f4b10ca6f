use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identity of one artifact in the catalog: id + owning agency + version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    pub id: String,
    pub agency: String,
    pub version: String,
}

impl ArtifactIdentity {
    pub fn new(id: impl Into<String>, agency: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agency: agency.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}({})", self.agency, self.id, self.version)
    }
}

/// Taxonomy types that share the flatten / translate / upload pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    Codelist,
    ConceptScheme,
    CategoryScheme,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [Self::Codelist, Self::ConceptScheme, Self::CategoryScheme];

    /// Type name the catalog expects in upload descriptors.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::Codelist => "codelist",
            Self::ConceptScheme => "conceptScheme",
            Self::CategoryScheme => "categoryScheme",
        }
    }

    /// Key of the artifact list inside the response `data` envelope.
    pub fn collection_key(&self) -> &'static str {
        match self {
            Self::Codelist => "codelists",
            Self::ConceptScheme => "conceptSchemes",
            Self::CategoryScheme => "categorySchemes",
        }
    }

    /// Key of the item list inside a single artifact. Nested children reuse
    /// it, and log lines use it as the plural item name.
    pub fn item_key(&self) -> &'static str {
        match self {
            Self::Codelist => "codes",
            Self::ConceptScheme => "concepts",
            Self::CategoryScheme => "categories",
        }
    }

}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_type())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "codelist" => Ok(Self::Codelist),
            "conceptscheme" => Ok(Self::ConceptScheme),
            "categoryscheme" => Ok(Self::CategoryScheme),
            _ => Err(format!(
                "Invalid artifact kind '{}'. Valid kinds: codelist, concept-scheme, category-scheme",
                s
            )),
        }
    }
}

/// The two per-language text columns every record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Name,
    Description,
}

impl TextField {
    pub const ALL: [TextField; 2] = [Self::Name, Self::Description];

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "des",
        }
    }

    /// Column name in the flat table, e.g. `name_es`.
    pub fn column(&self, language: &str) -> String {
        format!("{}_{}", self.prefix(), language)
    }
}

/// One row of a flattened taxonomy.
///
/// Every configured language has an entry in both maps; `None` means the
/// catalog holds no text for that language, which is what the fill engine
/// looks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRecord {
    pub id: String,
    pub parent: Option<String>,
    names: BTreeMap<String, Option<String>>,
    descriptions: BTreeMap<String, Option<String>>,
}

impl FlatRecord {
    pub fn new(id: impl Into<String>, parent: Option<String>, languages: &[String]) -> Self {
        let blank: BTreeMap<String, Option<String>> =
            languages.iter().map(|l| (l.clone(), None)).collect();
        Self {
            id: id.into(),
            parent,
            names: blank.clone(),
            descriptions: blank,
        }
    }

    pub fn text(&self, field: TextField, language: &str) -> Option<&str> {
        self.column(field).get(language).and_then(|v| v.as_deref())
    }

    pub fn set_text(&mut self, field: TextField, language: &str, value: Option<String>) {
        let column = match field {
            TextField::Name => &mut self.names,
            TextField::Description => &mut self.descriptions,
        };
        column.insert(language.to_string(), value);
    }

    pub fn with_text(mut self, field: TextField, language: &str, value: impl Into<String>) -> Self {
        self.set_text(field, language, Some(value.into()));
        self
    }

    pub fn same_id(&self, other_id: &str) -> bool {
        self.id.eq_ignore_ascii_case(other_id)
    }

    fn column(&self, field: TextField) -> &BTreeMap<String, Option<String>> {
        match field {
            TextField::Name => &self.names,
            TextField::Description => &self.descriptions,
        }
    }
}

/// Client-side projection of an artifact's items. Not authoritative: it is
/// replaced on every fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactTable {
    pub languages: Vec<String>,
    pub records: Vec<FlatRecord>,
}

impl ArtifactTable {
    pub fn new(languages: Vec<String>, records: Vec<FlatRecord>) -> Self {
        Self { languages, records }
    }

    pub fn empty(languages: Vec<String>) -> Self {
        Self::new(languages, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.same_id(id))
    }

    pub fn get(&self, id: &str) -> Option<&FlatRecord> {
        self.records.iter().find(|r| r.id == id)
    }
}

/// Records added locally that the catalog does not hold yet.
#[derive(Debug, Clone, Default)]
pub struct PendingUploadBatch {
    records: Vec<FlatRecord>,
}

impl PendingUploadBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a record unless its id is already known, either in the fetched
    /// table or in the batch. Ids compare case-insensitively.
    pub fn add(&mut self, record: FlatRecord, existing: &ArtifactTable) -> bool {
        if existing.contains_id(&record.id) || self.records.iter().any(|r| r.same_id(&record.id)) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn records(&self) -> &[FlatRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
