use std::collections::HashMap;

use crate::models::ScopeReference;

/// Identifies one peer group within a single reference collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    City,
    Neighbourhood(String),
}

/// Caller-owned memo of built scope references.
///
/// Entries are only valid for the reference collection they were built
/// from; call [`ReferenceCache::clear`] when that collection changes.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    scopes: HashMap<ScopeKey, ScopeReference>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ScopeKey) -> Option<&ScopeReference> {
        self.scopes.get(key)
    }

    pub fn get_or_insert_with<F>(&mut self, key: ScopeKey, build: F) -> &ScopeReference
    where
        F: FnOnce() -> ScopeReference,
    {
        self.scopes.entry(key).or_insert_with(build)
    }

    pub fn clear(&mut self) {
        self.scopes.clear();
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
