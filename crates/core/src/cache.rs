//! Per-manager content cache: `(contentHash, path)` → cached per-file results.
//!
//! Keyed conservatively on both content hash and path — two different paths
//! with identical bodies do not share work (a deliberate choice over relaxing
//! to content-hash alone; recorded in DESIGN.md). Entries are cloned out on
//! every read so concurrent runs never alias chunk objects.

use crate::types::{Chunk, SecretFinding};
use parking_lot::RwLock;
use std::collections::HashMap;

/// License/PII policy findings never pass through here: they depend only on
/// normalized text, not on chunking, and are recomputed on every call in
/// `pipeline::process_one` whether or not the chunk cache hits.
#[derive(Debug, Clone)]
pub struct CacheRecord {
    pub language: Option<String>,
    pub chunks: Vec<Chunk>,
    pub secret_findings: Vec<SecretFinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    content_hash: String,
    path: String,
}

#[derive(Default)]
pub struct ChunkCache {
    entries: RwLock<HashMap<CacheKey, CacheRecord>>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, content_hash: &str, path: &str) -> Option<CacheRecord> {
        let key = CacheKey { content_hash: content_hash.to_string(), path: path.to_string() };
        self.entries.read().get(&key).cloned()
    }

    pub fn insert(&self, content_hash: &str, path: &str, record: CacheRecord) {
        let key = CacheKey { content_hash: content_hash.to_string(), path: path.to_string() };
        self.entries.write().insert(key, record);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{chunk_id, ChunkMetadata};

    fn sample_chunk() -> Chunk {
        Chunk {
            id: chunk_id("a.txt", 1, 1, "hi", "basic"),
            text: "hi".to_string(),
            metadata: ChunkMetadata {
                origin: "lines".into(),
                path: "a.txt".into(),
                start_line: 1,
                end_line: 1,
                token_count: 1,
                char_count: 2,
                chunk_index: 0,
                total_chunks: 1,
                section: None,
            },
        }
    }

    #[test]
    fn miss_then_hit_round_trips_a_record() {
        let cache = ChunkCache::new();
        assert!(cache.get("hash1", "a.txt").is_none());

        cache.insert("hash1", "a.txt", CacheRecord { language: Some("rust".into()), chunks: vec![sample_chunk()], secret_findings: vec![] });

        let hit = cache.get("hash1", "a.txt").unwrap();
        assert_eq!(hit.chunks.len(), 1);
    }

    #[test]
    fn same_body_different_path_is_keyed_separately() {
        let cache = ChunkCache::new();
        cache.insert("hash1", "a.txt", CacheRecord { language: None, chunks: vec![sample_chunk()], secret_findings: vec![] });
        assert!(cache.get("hash1", "b.txt").is_none());
    }

    #[test]
    fn reads_are_deep_copies_not_aliases() {
        let cache = ChunkCache::new();
        cache.insert("hash1", "a.txt", CacheRecord { language: None, chunks: vec![sample_chunk()], secret_findings: vec![] });

        let mut first = cache.get("hash1", "a.txt").unwrap();
        first.chunks[0].text = "mutated".to_string();

        let second = cache.get("hash1", "a.txt").unwrap();
        assert_eq!(second.chunks[0].text, "hi");
    }
}
