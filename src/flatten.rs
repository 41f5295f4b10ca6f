//! Nested catalog items to flat, parent-referencing tables.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::model::{ArtifactKind, FlatRecord, TextField};

/// One item as the catalog returns it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchicalNode {
    pub id: String,
    /// Explicit parent, present on flat item lists such as codes.
    pub parent: Option<String>,
    pub names: BTreeMap<String, String>,
    pub descriptions: Option<BTreeMap<String, String>>,
    pub children: Vec<HierarchicalNode>,
}

impl HierarchicalNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, language: &str, text: &str) -> Self {
        self.names.insert(language.to_string(), text.to_string());
        self
    }

    pub fn description(mut self, language: &str, text: &str) -> Self {
        self.descriptions
            .get_or_insert_with(BTreeMap::new)
            .insert(language.to_string(), text.to_string());
        self
    }

    pub fn child(mut self, child: HierarchicalNode) -> Self {
        self.children.push(child);
        self
    }

    /// Build a node from its JSON form. Children are read from `child_key`.
    /// Returns `None` when the item has no string id.
    pub fn from_value(value: &Value, child_key: &str) -> Option<Self> {
        let id = value.get("id")?.as_str()?.to_string();
        let parent = value
            .get("parent")
            .and_then(Value::as_str)
            .map(str::to_string);
        let names = text_map(value.get("names")).unwrap_or_default();
        let descriptions = text_map(value.get("descriptions"));
        let children = value
            .get(child_key)
            .and_then(Value::as_array)
            .map(|items| parse_nodes(items, child_key))
            .unwrap_or_default();

        Some(Self {
            id,
            parent,
            names,
            descriptions,
            children,
        })
    }

    pub fn count(&self) -> usize {
        1 + self.children.iter().map(HierarchicalNode::count).sum::<usize>()
    }
}

fn text_map(value: Option<&Value>) -> Option<BTreeMap<String, String>> {
    let object = value?.as_object()?;
    Some(
        object
            .iter()
            .filter_map(|(lang, text)| text.as_str().map(|t| (lang.clone(), t.to_string())))
            .collect(),
    )
}

pub fn parse_nodes(items: &[Value], child_key: &str) -> Vec<HierarchicalNode> {
    items
        .iter()
        .filter_map(|item| {
            let node = HierarchicalNode::from_value(item, child_key);
            if node.is_none() {
                warn!("Skipping catalog item without an id: {}", item);
            }
            node
        })
        .collect()
}

/// Result of reading an artifact fetch response.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Loaded(Vec<HierarchicalNode>),
    /// The envelope is valid but the artifact holds no items.
    EmptyArtifact,
    /// The response carries no `data` envelope at all.
    MalformedResponse(String),
}

impl FetchOutcome {
    pub fn nodes(&self) -> &[HierarchicalNode] {
        match self {
            Self::Loaded(nodes) => nodes,
            Self::EmptyArtifact | Self::MalformedResponse(_) => &[],
        }
    }
}

/// Classify a fetch response for `kind`: `data.<collection>[0].<items>`.
pub fn read_artifact_response(kind: ArtifactKind, response: &Value) -> FetchOutcome {
    let Some(data) = response.get("data") else {
        return FetchOutcome::MalformedResponse(response.to_string());
    };

    let items = data
        .get(kind.collection_key())
        .and_then(|c| c.get(0))
        .and_then(|a| a.get(kind.item_key()))
        .and_then(Value::as_array);

    match items {
        Some(items) => FetchOutcome::Loaded(parse_nodes(items, kind.item_key())),
        None => FetchOutcome::EmptyArtifact,
    }
}

/// Depth-first pre-order flattening. Each record's parent is the node that
/// contained it; top-level nodes keep their explicit parent, if any.
pub fn flatten(roots: &[HierarchicalNode], languages: &[String]) -> Vec<FlatRecord> {
    let mut records = Vec::new();
    for root in roots {
        visit(root, root.parent.clone(), languages, &mut records);
    }
    debug!("Flattened {} nodes", records.len());
    records
}

fn visit(
    node: &HierarchicalNode,
    parent: Option<String>,
    languages: &[String],
    records: &mut Vec<FlatRecord>,
) {
    let mut record = FlatRecord::new(node.id.clone(), parent, languages);
    for language in languages {
        record.set_text(TextField::Name, language, node.names.get(language).cloned());
        let description = node
            .descriptions
            .as_ref()
            .and_then(|d| d.get(language))
            .cloned();
        record.set_text(TextField::Description, language, description);
    }
    records.push(record);

    for child in &node.children {
        visit(child, Some(node.id.clone()), languages, records);
    }
}
