//! Per-run chunk deduplicator: maps a chunk's content hash to the first-seen
//! chunk id. Later chunks with an identical body are dropped from the run's
//! output, but the hash → first-id mapping is retained so callers can still
//! resolve the duplicate to its surviving representative.

use crate::types::{content_hash, Chunk};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    first_seen: HashMap<String, String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(chunk)` if this is the first time its body has been seen
    /// this run, `None` if it is a duplicate (and records the mapping either way).
    pub fn admit(&mut self, chunk: Chunk) -> Option<Chunk> {
        let hash = content_hash(&chunk.text);
        if let Some(_existing_id) = self.first_seen.get(&hash) {
            None
        } else {
            self.first_seen.insert(hash, chunk.id.clone());
            Some(chunk)
        }
    }

    pub fn first_id_for(&self, text: &str) -> Option<&str> {
        self.first_seen.get(&content_hash(text)).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.first_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{chunk_id, ChunkMetadata};

    fn chunk(path: &str, text: &str) -> Chunk {
        Chunk {
            id: chunk_id(path, 1, 1, text, "basic"),
            text: text.to_string(),
            metadata: ChunkMetadata {
                origin: "lines".into(),
                path: path.into(),
                start_line: 1,
                end_line: 1,
                token_count: 1,
                char_count: text.len(),
                chunk_index: 0,
                total_chunks: 1,
                section: None,
            },
        }
    }

    #[test]
    fn drops_duplicate_bodies_within_a_run() {
        let mut dedup = Deduplicator::new();
        let a = dedup.admit(chunk("a.txt", "same text"));
        let b = dedup.admit(chunk("b.txt", "same text"));
        assert!(a.is_some());
        assert!(b.is_none());
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn distinct_bodies_both_survive() {
        let mut dedup = Deduplicator::new();
        let a = dedup.admit(chunk("a.txt", "one"));
        let b = dedup.admit(chunk("b.txt", "two"));
        assert!(a.is_some());
        assert!(b.is_some());
        assert_eq!(dedup.len(), 2);
    }
}
