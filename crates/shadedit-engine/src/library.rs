use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Process-wide `library key -> source text` table.
///
/// Every shader's preprocessing pass reads from the same map, regardless of which
/// group registered the library. Keys are global; the last writer wins.
#[derive(Debug, Clone, Default)]
pub struct LibraryMap {
    sources: BTreeMap<String, String>,
}

impl LibraryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.sources.get(key).map(|s| s.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sources.contains_key(key)
    }

    /// Returns the text that was replaced, if any.
    pub fn insert(&mut self, key: impl Into<String>, source: impl Into<String>) -> Option<String> {
        self.sources.insert(key.into(), source.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.sources.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LibraryMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            sources: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// One shared GLSL fragment inside a library group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub key: String,
    pub source: String,
    /// If present the library is watched and saved back to this path.
    pub path: Option<PathBuf>,
    /// Editor hint: start collapsed.
    pub fold_default: bool,
}

impl LibraryEntry {
    pub fn new(key: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source: source.into(),
            path: None,
            fold_default: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn folded(mut self, fold: bool) -> Self {
        self.fold_default = fold;
        self
    }
}

/// Per-group state for a set of libraries registered together.
#[derive(Debug, Clone)]
pub struct LibGroupRecord {
    pub(crate) key: String,
    pub(crate) libraries: Vec<LibraryEntry>,
    pub(crate) originals: BTreeMap<String, String>,
    /// Reverse index: shaders that reference at least one library of this group.
    pub(crate) assoc_shader_keys: BTreeSet<String>,
    pub(crate) readonly: bool,
}

impl LibGroupRecord {
    pub(crate) fn new(key: String, libraries: Vec<LibraryEntry>, readonly: bool) -> Self {
        let originals = libraries
            .iter()
            .map(|l| (l.key.clone(), l.source.clone()))
            .collect();
        Self {
            key,
            libraries,
            originals,
            assoc_shader_keys: BTreeSet::new(),
            readonly,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn libraries(&self) -> &[LibraryEntry] {
        &self.libraries
    }

    pub fn library(&self, key: &str) -> Option<&LibraryEntry> {
        self.libraries.iter().find(|l| l.key == key)
    }

    pub(crate) fn library_mut(&mut self, key: &str) -> Option<&mut LibraryEntry> {
        self.libraries.iter_mut().find(|l| l.key == key)
    }

    /// Text the library had when the group was registered.
    pub fn original(&self, key: &str) -> Option<&str> {
        self.originals.get(key).map(|s| s.as_str())
    }

    pub fn assoc_shader_keys(&self) -> &BTreeSet<String> {
        &self.assoc_shader_keys
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.libraries.iter().filter_map(|l| l.path.as_ref())
    }
}
