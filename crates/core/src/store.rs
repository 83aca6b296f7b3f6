//! In-memory index store, keyed by `(repository-kind, repository-path, revision)`.
//!
//! No on-disk persistence (non-goal): an index lives only until the process
//! exits or a later non-dry-run run overwrites the same key.

use crate::types::{IndexResult, RepositorySpec, StoreKey};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct IndexStore {
    entries: RwLock<HashMap<StoreKey, IndexResult>>,
    /// Insertion order, most recent last, for `find_latest`.
    insertion_order: RwLock<Vec<StoreKey>>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: StoreKey, result: IndexResult) {
        let mut order = self.insertion_order.write();
        order.retain(|k| k != &key);
        order.push(key.clone());
        self.entries.write().insert(key, result);
    }

    pub fn get(&self, key: &StoreKey) -> Option<IndexResult> {
        self.entries.read().get(key).cloned()
    }

    /// Most recently stored index matching `spec`'s kind and path, regardless
    /// of revision; `url` is not part of the lookup key today but is matched
    /// when both specs carry one, for forward compatibility with remote specs.
    pub fn find_latest(&self, spec: &RepositorySpec) -> Option<IndexResult> {
        let order = self.insertion_order.read();
        let entries = self.entries.read();
        for key in order.iter().rev() {
            if key.kind == spec.kind && key.path == spec.path {
                if let Some(result) = entries.get(key) {
                    if keys_compatible(&result.spec.url, &spec.url) {
                        return Some(result.clone());
                    }
                }
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn keys_compatible(stored_url: &Option<String>, requested_url: &Option<String>) -> bool {
    match (stored_url, requested_url) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn sample_result(spec: &RepositorySpec, revision: &str) -> IndexResult {
        IndexResult {
            spec: spec.clone(),
            revision: Some(revision.to_string()),
            files: Vec::new(),
            chunks: Vec::new(),
            created_at: 0,
            file_contents_by_path: BTreeMap::new(),
            language_by_content_hash: BTreeMap::new(),
            secret_findings: Vec::new(),
            policy_findings: Vec::new(),
            shards: None,
            resume_cursor: None,
            test_coverage: None,
            dependency_graph: None,
            symbol_index: None,
        }
    }

    #[test]
    fn exact_key_round_trips() {
        let store = IndexStore::new();
        let spec = RepositorySpec::filesystem(PathBuf::from("/repo"));
        let key = spec.store_key(Some("abc123"));
        store.put(key.clone(), sample_result(&spec, "abc123"));

        let hit = store.get(&key).unwrap();
        assert_eq!(hit.revision.as_deref(), Some("abc123"));
    }

    #[test]
    fn find_latest_returns_most_recently_inserted_revision() {
        let store = IndexStore::new();
        let spec = RepositorySpec::filesystem(PathBuf::from("/repo"));

        store.put(spec.store_key(Some("rev1")), sample_result(&spec, "rev1"));
        store.put(spec.store_key(Some("rev2")), sample_result(&spec, "rev2"));

        let latest = store.find_latest(&spec).unwrap();
        assert_eq!(latest.revision.as_deref(), Some("rev2"));
    }

    #[test]
    fn overwriting_a_key_moves_it_to_the_end_of_insertion_order() {
        let store = IndexStore::new();
        let spec_a = RepositorySpec::filesystem(PathBuf::from("/a"));
        let spec_b = RepositorySpec::filesystem(PathBuf::from("/b"));

        store.put(spec_a.store_key(Some("rev1")), sample_result(&spec_a, "rev1"));
        store.put(spec_b.store_key(Some("rev1")), sample_result(&spec_b, "rev1"));
        store.put(spec_a.store_key(Some("rev1")), sample_result(&spec_a, "rev1-again"));

        let latest = store.find_latest(&spec_a).unwrap();
        assert_eq!(latest.revision.as_deref(), Some("rev1-again"));
    }

    #[test]
    fn unknown_spec_returns_none() {
        let store = IndexStore::new();
        let spec = RepositorySpec::filesystem(PathBuf::from("/missing"));
        assert!(store.find_latest(&spec).is_none());
    }
}
