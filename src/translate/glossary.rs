use std::collections::BTreeMap;

/// Fixed translations for literals a provider must never see, such as
/// placeholder labels it cannot translate.
#[derive(Debug, Clone, Default)]
pub struct Glossary {
    overrides: BTreeMap<String, BTreeMap<String, String>>,
}

impl Glossary {
    pub fn new(overrides: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        Self { overrides }
    }

    pub fn lookup(&self, text: &str, language: &str) -> Option<&str> {
        self.overrides
            .get(text)
            .and_then(|by_language| by_language.get(language))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}
