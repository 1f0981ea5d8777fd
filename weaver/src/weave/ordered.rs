//! Insertion-ordered name -> declaration map.

use crate::syntax::Declaration;

/// Declarations keyed by name, iterated in insertion order.
///
/// Weave sets hold a handful of entries per operation, so lookups scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclMap {
    entries: Vec<(String, Declaration)>,
}

impl DeclMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. An overwritten entry keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, decl: Declaration) -> Option<Declaration> {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, decl)),
            None => {
                self.entries.push((name, decl));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Declaration> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, decl)| decl)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Declaration)> {
        self.entries.iter().map(|(key, decl)| (key.as_str(), decl))
    }
}
