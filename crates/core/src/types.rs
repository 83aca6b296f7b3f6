//! Core data model: the entities every pipeline stage reads or produces.
//!
//! Sort order, id derivation, and cache identity invariants live on the
//! types that carry them (`IndexResult::finalize_order`, `chunk_id`).

use crate::chunker::ChunkOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Repository spec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum RepositoryKind {
    VersionControlled,
    Filesystem,
    Archive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    Tar,
    Zip,
}

/// Immutable description of the repository an index was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySpec {
    pub kind: RepositoryKind,
    pub path: PathBuf,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub archive_kind: Option<ArchiveKind>,
}

impl RepositorySpec {
    pub fn filesystem(path: impl Into<PathBuf>) -> Self {
        Self { kind: RepositoryKind::Filesystem, path: path.into(), url: None, archive_kind: None }
    }

    pub fn version_controlled(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: RepositoryKind::VersionControlled,
            path: path.into(),
            url: None,
            archive_kind: None,
        }
    }

    pub fn archive(path: impl Into<PathBuf>, archive_kind: Option<ArchiveKind>) -> Self {
        Self { kind: RepositoryKind::Archive, path: path.into(), url: None, archive_kind }
    }

    /// Key used by the index store: a repository+revision identifies one index.
    pub fn store_key(&self, revision: Option<&str>) -> StoreKey {
        StoreKey {
            kind: self.kind.clone(),
            path: self.path.clone(),
            revision: revision.map(|s| s.to_string()).unwrap_or_else(|| "HEAD".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey {
    pub kind: RepositoryKind,
    pub path: PathBuf,
    pub revision: String,
}

// ---------------------------------------------------------------------------
// Indexing options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretPatternConfig {
    pub id: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiPatternConfig {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseOptions {
    pub allowed: Option<Vec<String>>,
    pub denied: Vec<String>,
}

impl Default for LicenseOptions {
    fn default() -> Self {
        Self { allowed: None, denied: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PiiOptions {
    pub enabled: bool,
    pub replacement: String,
    pub patterns: Vec<PiiPatternConfig>,
}

impl Default for PiiOptions {
    fn default() -> Self {
        Self { enabled: false, replacement: "[redacted]".to_string(), patterns: Vec::new() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOptions {
    pub license: LicenseOptions,
    pub pii: PiiOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardingOptions {
    pub chunks_per_shard: Option<usize>,
    pub approx_chunk_size: Option<usize>,
}

/// Every knob the pipeline's run accepts. Populated by an external config
/// loader (out of scope); this crate only defines the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    pub revision: Option<String>,
    pub include_paths: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub exclude_regexes: Vec<String>,
    pub workspace_roots: Vec<String>,
    pub sparse_patterns: Vec<String>,
    pub chunking: ChunkOptions,
    pub tokenizer_id: String,
    pub scan_secrets: bool,
    pub secret_patterns: Vec<SecretPatternConfig>,
    pub enable_submodules: bool,
    pub enable_large_file_ext: bool,
    pub incremental: bool,
    pub base_revision: Option<String>,
    pub concurrency: usize,
    pub max_in_flight_bytes: Option<u64>,
    pub sharding: Option<ShardingOptions>,
    pub max_files_per_run: Option<usize>,
    pub resume_cursor: Option<ResumeCursor>,
    pub dry_run: bool,
    pub policy: PolicyOptions,
    pub language_chunk_profiles: BTreeMap<String, crate::chunker::LanguageChunkProfile>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            revision: None,
            include_paths: Vec::new(),
            exclude_globs: Vec::new(),
            exclude_regexes: Vec::new(),
            workspace_roots: Vec::new(),
            sparse_patterns: Vec::new(),
            chunking: ChunkOptions::default(),
            tokenizer_id: "basic".to_string(),
            scan_secrets: false,
            secret_patterns: Vec::new(),
            enable_submodules: false,
            enable_large_file_ext: false,
            incremental: false,
            base_revision: None,
            concurrency: 4,
            max_in_flight_bytes: None,
            sharding: None,
            max_files_per_run: None,
            resume_cursor: None,
            dry_run: false,
            policy: PolicyOptions::default(),
            language_chunk_profiles: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A consistent, read-only view of a repository, live for a single run.
///
/// `release()` must run on every exit path (success, early return, or
/// panic-unwind via `Drop`); it is idempotent.
pub struct Snapshot {
    pub root: PathBuf,
    pub resolved_revision: Option<String>,
    /// Non-fatal warnings from best-effort steps (submodules, LFS, sparse-checkout).
    pub warnings: Vec<String>,
    cleanup: Vec<Box<dyn FnOnce() + Send>>,
    released: bool,
}

impl Snapshot {
    pub fn new(root: PathBuf, resolved_revision: Option<String>) -> Self {
        Self { root, resolved_revision, warnings: Vec::new(), cleanup: Vec::new(), released: false }
    }

    pub fn push_cleanup(&mut self, f: impl FnOnce() + Send + 'static) {
        self.cleanup.push(Box::new(f));
    }

    /// Run every registered cleanup in LIFO order. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        while let Some(f) = self.cleanup.pop() {
            f();
        }
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// File entry (enumerator output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size_bytes: u64,
    pub executable: bool,
    pub object_id: Option<String>,
}

// ---------------------------------------------------------------------------
// File metadata (post-processing)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFileMetadata {
    pub path: String,
    pub size_bytes: u64,
    pub content_hash: String,
    pub language: Option<String>,
    pub executable: bool,
    pub skip_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Chunks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub origin: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub token_count: usize,
    pub char_count: usize,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub section: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub file_hash: String,
}

/// Stable chunk id: `SHA-256(path ‖ startLine ‖ endLine ‖ text ‖ tokenizerId)`.
pub fn chunk_id(path: &str, start_line: usize, end_line: usize, text: &str, tokenizer_id: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(start_line.to_le_bytes());
    hasher.update(end_line.to_le_bytes());
    hasher.update(text.as_bytes());
    hasher.update(tokenizer_id.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn content_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretFinding {
    pub path: String,
    pub line: usize,
    pub rule_id: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyFindingKind {
    License,
    Pii,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFinding {
    pub path: String,
    pub kind: PolicyFindingKind,
    pub message: String,
    pub details: Option<String>,
}

// ---------------------------------------------------------------------------
// Shards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shard {
    pub id: String,
    pub chunk_ids: Vec<String>,
    pub chunk_count: usize,
    pub approx_size: usize,
}

// ---------------------------------------------------------------------------
// Symbols, dependency graph, test coverage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Interface,
    Trait,
    Constant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub path: String,
    pub line: usize,
    pub context: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub imports: BTreeMap<String, Vec<String>>,
    pub imported_by: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestCoverage {
    /// source path -> test paths that cover it
    pub covered_by: BTreeMap<String, Vec<String>>,
    /// test path -> source paths it covers
    pub covers: BTreeMap<String, Vec<String>>,
}

// ---------------------------------------------------------------------------
// Resume cursor
// ---------------------------------------------------------------------------

/// The highest repo-relative path fully processed by a partial run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResumeCursor(pub String);

// ---------------------------------------------------------------------------
// Index result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResult {
    pub spec: RepositorySpec,
    pub revision: Option<String>,
    pub files: Vec<IndexFileMetadata>,
    pub chunks: Vec<IndexChunk>,
    pub created_at: i64,
    pub file_contents_by_path: BTreeMap<String, String>,
    pub language_by_content_hash: BTreeMap<String, String>,
    pub secret_findings: Vec<SecretFinding>,
    pub policy_findings: Vec<PolicyFinding>,
    pub shards: Option<Vec<Shard>>,
    pub resume_cursor: Option<ResumeCursor>,
    pub test_coverage: Option<TestCoverage>,
    pub dependency_graph: Option<DependencyGraph>,
    pub symbol_index: Option<Vec<Symbol>>,
}

impl IndexResult {
    /// Enforces ordering invariants: files by path, chunks by (path, startLine),
    /// findings by (path, line)/(path, message). Recomputes per-file
    /// `totalChunks`/`chunkIndex` from the final surviving chunk set.
    pub fn finalize_order(&mut self) {
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
        self.chunks.sort_by(|a, b| {
            a.chunk
                .metadata
                .path
                .cmp(&b.chunk.metadata.path)
                .then(a.chunk.metadata.start_line.cmp(&b.chunk.metadata.start_line))
        });

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for c in &self.chunks {
            *counts.entry(c.chunk.metadata.path.clone()).or_default() += 1;
        }
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        for c in &mut self.chunks {
            let total = counts[&c.chunk.metadata.path];
            let idx = seen.entry(c.chunk.metadata.path.clone()).or_insert(0);
            c.chunk.metadata.chunk_index = *idx;
            c.chunk.metadata.total_chunks = total;
            *idx += 1;
        }

        self.secret_findings.sort_by(|a, b| a.path.cmp(&b.path).then(a.line.cmp(&b.line)));
        self.policy_findings.sort_by(|a, b| a.path.cmp(&b.path).then(a.message.cmp(&b.message)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_deterministic_and_position_sensitive() {
        let a = chunk_id("src/lib.rs", 1, 10, "fn main() {}", "basic");
        let b = chunk_id("src/lib.rs", 1, 10, "fn main() {}", "basic");
        assert_eq!(a, b);

        let c = chunk_id("src/lib.rs", 2, 10, "fn main() {}", "basic");
        assert_ne!(a, c);

        let d = chunk_id("src/lib.rs", 1, 10, "fn main() {}", "tiktoken");
        assert_ne!(a, d);
    }

    #[test]
    fn finalize_order_sorts_and_renumbers_chunks() {
        let mut result = IndexResult {
            spec: RepositorySpec::filesystem("/repo"),
            revision: None,
            files: vec![
                IndexFileMetadata {
                    path: "b.rs".into(),
                    size_bytes: 1,
                    content_hash: "h".into(),
                    language: None,
                    executable: false,
                    skip_reason: None,
                },
                IndexFileMetadata {
                    path: "a.rs".into(),
                    size_bytes: 1,
                    content_hash: "h".into(),
                    language: None,
                    executable: false,
                    skip_reason: None,
                },
            ],
            chunks: vec![
                make_chunk("a.rs", 20, 30),
                make_chunk("a.rs", 1, 10),
                make_chunk("b.rs", 1, 5),
            ],
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
        };

        result.finalize_order();

        assert_eq!(result.files[0].path, "a.rs");
        assert_eq!(result.files[1].path, "b.rs");

        assert_eq!(result.chunks[0].chunk.metadata.path, "a.rs");
        assert_eq!(result.chunks[0].chunk.metadata.start_line, 1);
        assert_eq!(result.chunks[0].chunk.metadata.chunk_index, 0);
        assert_eq!(result.chunks[0].chunk.metadata.total_chunks, 2);

        assert_eq!(result.chunks[1].chunk.metadata.start_line, 20);
        assert_eq!(result.chunks[1].chunk.metadata.chunk_index, 1);
        assert_eq!(result.chunks[1].chunk.metadata.total_chunks, 2);

        assert_eq!(result.chunks[2].chunk.metadata.path, "b.rs");
        assert_eq!(result.chunks[2].chunk.metadata.chunk_index, 0);
        assert_eq!(result.chunks[2].chunk.metadata.total_chunks, 1);
    }

    fn make_chunk(path: &str, start: usize, end: usize) -> IndexChunk {
        IndexChunk {
            chunk: Chunk {
                id: chunk_id(path, start, end, "text", "basic"),
                text: "text".into(),
                metadata: ChunkMetadata {
                    origin: "lines".into(),
                    path: path.into(),
                    start_line: start,
                    end_line: end,
                    token_count: 1,
                    char_count: 4,
                    chunk_index: 0,
                    total_chunks: 0,
                    section: None,
                },
            },
            file_hash: "h".into(),
        }
    }
}
