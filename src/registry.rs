use std::collections::BTreeMap;

/// Named table of capability constructors with an explicit default entry.
pub struct Registry<T> {
    entries: BTreeMap<String, T>,
    default_key: String,
}

impl<T> Registry<T> {
    pub fn new(default_key: impl Into<String>) -> Self {
        Self {
            entries: BTreeMap::new(),
            default_key: default_key.into(),
        }
    }

    /// Adds or replaces an entry.
    pub fn register(&mut self, name: impl Into<String>, entry: T) -> &mut Self {
        self.entries.insert(name.into(), entry);
        self
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    pub fn get_key_value(&self, name: &str) -> Option<(&str, &T)> {
        self.entries
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Looks `name` up and falls back to the default key when it is missing.
    /// Returns `None` only if the default itself was never registered.
    pub fn resolve_or_default(&self, name: &str) -> Option<(&str, &T)> {
        if let Some(found) = self.get_key_value(name) {
            return Some(found);
        }
        tracing::info!(
            requested = name,
            default = self.default_key.as_str(),
            "no such entry, using default"
        );
        self.get_key_value(&self.default_key)
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}
