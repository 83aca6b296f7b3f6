//! `IndexManager`: the query, diff, blame, context-pack, and pull-request
//! façade. Owns the collaborators worth keeping across runs —
//! the index store, the snapshot provider, and the pipeline's shared content
//! cache — and builds a fresh `Pipeline` invocation for every call.

use crate::cache::ChunkCache;
use crate::error::{IndexError, Result};
use crate::forge::{CommitStatusOptions, CommitStatusState, ForgeClient, PullRequestDetails, PullRequestFileStatus};
use crate::glob_compiler::{compile_pattern, CompiledPattern};
use crate::pipeline::Pipeline;
use crate::snapshot::{BlameLine, SnapshotProvider};
use crate::store::IndexStore;
use crate::types::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct IndexManager {
    store: IndexStore,
    snapshot_provider: Arc<dyn SnapshotProvider>,
    pipeline: Pipeline,
}

impl IndexManager {
    pub fn new(snapshot_provider: Arc<dyn SnapshotProvider>) -> Self {
        let cache = Arc::new(ChunkCache::new());
        Self { store: IndexStore::new(), snapshot_provider: snapshot_provider.clone(), pipeline: Pipeline::new(snapshot_provider, cache) }
    }

    /// Runs one indexing pass and memoizes it unless `options.dry_run`.
    /// `base` resolution: an explicit `base_revision` looks up that exact
    /// key; otherwise falls back to the store's most recent entry for `spec`.
    pub async fn index(&self, spec: &RepositorySpec, options: &IndexOptions) -> Result<IndexResult> {
        let base = self.resolve_base(spec, options);
        let result = self.pipeline.run(spec, options, base.as_ref()).await?;
        if !options.dry_run {
            self.store.put(spec.store_key(result.revision.as_deref()), result.clone());
        }
        Ok(result)
    }

    fn resolve_base(&self, spec: &RepositorySpec, options: &IndexOptions) -> Option<IndexResult> {
        match &options.base_revision {
            Some(rev) => self.store.get(&spec.store_key(Some(rev))),
            None => self.store.find_latest(spec),
        }
    }

    fn lookup(&self, spec: &RepositorySpec, revision: Option<&str>) -> Result<IndexResult> {
        let found = match revision {
            Some(rev) => self.store.get(&spec.store_key(Some(rev))),
            None => self.store.find_latest(spec),
        };
        found.ok_or_else(|| IndexError::IndexMissing { path: spec.path.clone(), revision: revision.map(str::to_string) })
    }

    pub fn list_files(&self, spec: &RepositorySpec, revision: Option<&str>, include: &[String], exclude: &[String]) -> Result<Vec<IndexFileMetadata>> {
        let result = self.lookup(spec, revision)?;
        let include = compile_globs(include);
        let exclude = compile_globs(exclude);
        Ok(result.files.into_iter().filter(|f| matches_globs(&f.path, &include, &exclude)).collect())
    }

    pub fn list_chunks(&self, spec: &RepositorySpec, revision: Option<&str>, path: Option<&str>, lang: Option<&str>, max_tokens: Option<usize>) -> Result<Vec<IndexChunk>> {
        let result = self.lookup(spec, revision)?;
        Ok(result
            .chunks
            .into_iter()
            .filter(|c| path.map(|p| c.chunk.metadata.path == p).unwrap_or(true))
            .filter(|c| lang.map(|l| result.language_by_content_hash.get(&c.file_hash).map(|got| got == l).unwrap_or(false)).unwrap_or(true))
            .filter(|c| max_tokens.map(|m| c.chunk.metadata.token_count <= m).unwrap_or(true))
            .collect())
    }

    pub fn get_chunk(&self, spec: &RepositorySpec, id: &str, revision: Option<&str>) -> Result<IndexChunk> {
        let result = self.lookup(spec, revision)?;
        result.chunks.into_iter().find(|c| c.chunk.id == id).ok_or_else(|| IndexError::NotFound(format!("chunk {id}")))
    }

    /// `getFile`: attaches the stored file content and the subset of secret
    /// findings scoped to `path`.
    pub fn get_file(&self, spec: &RepositorySpec, path: &str, revision: Option<&str>) -> Result<FileDetail> {
        let result = self.lookup(spec, revision)?;
        let metadata = result.files.iter().find(|f| f.path == path).cloned().ok_or_else(|| IndexError::NotFound(format!("file {path}")))?;
        let content = result.file_contents_by_path.get(path).cloned().unwrap_or_default();
        let secret_findings = result.secret_findings.iter().filter(|f| f.path == path).cloned().collect();
        Ok(FileDetail { metadata, content, secret_findings })
    }

    /// Case-insensitive substring search over chunk lines, capped at 2000 hits.
    pub fn search_text(&self, spec: &RepositorySpec, query: &str, revision: Option<&str>, path_glob: Option<&str>) -> Result<Vec<TextMatch>> {
        const MAX_HITS: usize = 2000;
        let result = self.lookup(spec, revision)?;
        let needle = query.to_lowercase();
        let matcher = path_glob.and_then(|g| compile_pattern(g, ""));

        let mut hits = Vec::new();
        'chunks: for chunk in &result.chunks {
            if let Some(m) = &matcher {
                if !m.is_match(&chunk.chunk.metadata.path) {
                    continue;
                }
            }
            for (i, line) in chunk.chunk.text.lines().enumerate() {
                if line.to_lowercase().contains(&needle) {
                    hits.push(TextMatch { path: chunk.chunk.metadata.path.clone(), line: chunk.chunk.metadata.start_line + i, excerpt: line.chars().take(200).collect() });
                    if hits.len() >= MAX_HITS {
                        break 'chunks;
                    }
                }
            }
        }
        Ok(hits)
    }

    /// Regex search over the symbol index, capped at 500 hits. `query`
    /// absent means "every symbol".
    pub fn search_symbols(&self, spec: &RepositorySpec, query: Option<&str>, revision: Option<&str>) -> Result<Vec<Symbol>> {
        const MAX_HITS: usize = 500;
        let result = self.lookup(spec, revision)?;
        let re = query.and_then(|q| regex::Regex::new(q).ok());
        Ok(result
            .symbol_index
            .unwrap_or_default()
            .into_iter()
            .filter(|s| re.as_ref().map(|r| r.is_match(&s.name)).unwrap_or(true))
            .take(MAX_HITS)
            .collect())
    }

    /// Runs two dry-run indexings at `base_revision` and `head_revision` and
    /// set-differences their chunk ids. Identical revisions short-circuit
    /// without indexing: `diff_chunks(r, r)` is always empty.
    pub async fn diff_chunks(
        &self,
        spec: &RepositorySpec,
        base_revision: &str,
        head_revision: &str,
        paths: Option<&[String]>,
        limit: usize,
        index_options: &IndexOptions,
    ) -> Result<ChunkDiff> {
        if base_revision == head_revision {
            return Ok(ChunkDiff { added: Vec::new(), removed: Vec::new(), changed_files: Vec::new() });
        }

        let mut base_opts = index_options.clone();
        base_opts.revision = Some(base_revision.to_string());
        base_opts.dry_run = true;
        let mut head_opts = index_options.clone();
        head_opts.revision = Some(head_revision.to_string());
        head_opts.dry_run = true;

        let base_result = self.pipeline.run(spec, &base_opts, None).await?;
        let head_result = self.pipeline.run(spec, &head_opts, None).await?;

        let in_scope = |path: &str| paths.map(|ps| ps.iter().any(|p| p == path)).unwrap_or(true);

        let base_ids: BTreeSet<String> = base_result.chunks.iter().filter(|c| in_scope(&c.chunk.metadata.path)).map(|c| c.chunk.id.clone()).collect();
        let head_ids: BTreeSet<String> = head_result.chunks.iter().filter(|c| in_scope(&c.chunk.metadata.path)).map(|c| c.chunk.id.clone()).collect();

        let added: Vec<String> = head_ids.difference(&base_ids).take(limit).cloned().collect();
        let removed: Vec<String> = base_ids.difference(&head_ids).take(limit).cloned().collect();

        let changed_files = head_result
            .files
            .iter()
            .filter(|f| in_scope(&f.path))
            .filter(|f| base_result.files.iter().any(|b| b.path == f.path && b.content_hash != f.content_hash))
            .map(|f| f.path.clone())
            .collect();

        Ok(ChunkDiff { added, removed, changed_files })
    }

    pub fn blame_file(&self, spec: &RepositorySpec, path: &str, revision: Option<&str>) -> Result<Vec<BlameLine>> {
        self.snapshot_provider.blame(spec, path, revision)
    }

    pub fn resolve_reference(&self, spec: &RepositorySpec, revision: &str) -> Result<String> {
        self.snapshot_provider.resolve_ref(spec, revision)
    }

    /// Selects chunks under `max_tokens`, sorted by descending size, top `limit`.
    pub fn build_context_pack(&self, spec: &RepositorySpec, revision: Option<&str>, paths: Option<&[String]>, limit: usize, max_tokens: Option<usize>) -> Result<Vec<IndexChunk>> {
        let result = self.lookup(spec, revision)?;
        let mut candidates: Vec<IndexChunk> = result
            .chunks
            .into_iter()
            .filter(|c| paths.map(|ps| ps.iter().any(|p| p == &c.chunk.metadata.path)).unwrap_or(true))
            .filter(|c| max_tokens.map(|m| c.chunk.metadata.token_count <= m).unwrap_or(true))
            .collect();
        candidates.sort_by(|a, b| b.chunk.metadata.char_count.cmp(&a.chunk.metadata.char_count));
        candidates.truncate(limit);
        Ok(candidates)
    }

    /// The pull-request workflow. Forge calls other than the initial
    /// fetch are best-effort: failures are logged and reflected in
    /// `status_submitted`/`comment_submitted` rather than aborting the run.
    pub async fn index_pull_request<F: ForgeClient>(&self, spec: &RepositorySpec, forge: &F, pr_id: &str, options: &PullRequestIndexOptions) -> Result<PullRequestOutcome> {
        let pr = forge.fetch_pull_request(pr_id)?;

        if options.report_status {
            self.post_status(forge, &pr.head_sha, CommitStatusState::Pending, options, None);
        }

        let mut index_options = options.index_options.clone();
        index_options.include_paths = derive_include_paths(&index_options.include_paths, &pr);
        index_options.revision = Some(pr.head_sha.clone());

        let result = match self.index(spec, &index_options).await {
            Ok(r) => r,
            Err(e) => {
                if options.report_status {
                    self.post_status(forge, &pr.head_sha, CommitStatusState::Error, options, Some(&format!("indexing failed: {e}")));
                }
                return Err(e);
            }
        };

        let failed = options.fail_on_secret_findings && !result.secret_findings.is_empty();

        let mut status_submitted = false;
        if options.report_status {
            let summary = format!(
                "files:{} • chunks:{} • secrets:{}{}",
                result.files.len(),
                result.chunks.len(),
                result.secret_findings.len(),
                if failed { " • status:attention" } else { "" }
            );
            let state = if failed { CommitStatusState::Failure } else { CommitStatusState::Success };
            status_submitted = self.post_status(forge, &pr.head_sha, state, options, Some(&summary));
        }

        let mut comment_submitted = false;
        if options.post_comment {
            let body = render_comment(&pr, &result);
            comment_submitted = match forge.create_comment(pr_id, &body) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(pr = %pr_id, error = %e, "failed to post pull request comment");
                    false
                }
            };
        }

        Ok(PullRequestOutcome { result, status_submitted, comment_submitted, failed })
    }

    fn post_status<F: ForgeClient>(&self, forge: &F, sha: &str, state: CommitStatusState, options: &PullRequestIndexOptions, description: Option<&str>) -> bool {
        let opts = CommitStatusOptions { context: options.status_context.clone(), description: description.map(|s| s.to_string()), target_url: options.target_url.clone() };
        match forge.set_commit_status(sha, state, &opts) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(sha = %sha, error = %e, "failed to post commit status");
                false
            }
        }
    }
}

fn derive_include_paths(existing: &[String], pr: &PullRequestDetails) -> Vec<String> {
    let pr_paths: Vec<String> = pr.files.iter().filter(|f| f.status != PullRequestFileStatus::Removed).map(|f| f.path.clone()).collect();
    if existing.is_empty() {
        return pr_paths;
    }
    let intersected: Vec<String> = existing.iter().filter(|p| pr_paths.contains(p)).cloned().collect();
    if intersected.is_empty() {
        pr_paths
    } else {
        intersected
    }
}

fn render_comment(pr: &PullRequestDetails, result: &IndexResult) -> String {
    let changed: Vec<String> = pr.files.iter().take(20).map(|f| format!("- {} {}", status_prefix(f.status), f.path)).collect();
    format!(
        "files:{files} • chunks:{chunks} • secrets:{secrets}\n\n\
         `{head_ref}` ({head_sha}) into `{base_ref}` ({base_sha})\n{url}\n\nChanged files:\n{changed}\n",
        files = result.files.len(),
        chunks = result.chunks.len(),
        secrets = result.secret_findings.len(),
        head_ref = pr.head_ref,
        head_sha = short_sha(&pr.head_sha),
        base_ref = pr.base_ref,
        base_sha = short_sha(&pr.base_sha),
        url = pr.url,
        changed = changed.join("\n"),
    )
}

fn short_sha(sha: &str) -> String {
    sha.chars().take(12).collect()
}

fn status_prefix(status: PullRequestFileStatus) -> &'static str {
    match status {
        PullRequestFileStatus::Added => "added",
        PullRequestFileStatus::Modified => "modified",
        PullRequestFileStatus::Removed => "removed",
        PullRequestFileStatus::Renamed => "renamed",
    }
}

fn compile_globs(patterns: &[String]) -> Vec<CompiledPattern> {
    patterns.iter().filter_map(|p| compile_pattern(p, "")).collect()
}

fn matches_globs(path: &str, include: &[CompiledPattern], exclude: &[CompiledPattern]) -> bool {
    let included = include.is_empty() || include.iter().any(|p| p.is_match(path));
    included && !exclude.iter().any(|p| p.is_match(path))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDetail {
    pub metadata: IndexFileMetadata,
    pub content: String,
    pub secret_findings: Vec<SecretFinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextMatch {
    pub path: String,
    pub line: usize,
    pub excerpt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed_files: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PullRequestIndexOptions {
    pub index_options: IndexOptions,
    pub report_status: bool,
    pub status_context: Option<String>,
    pub target_url: Option<String>,
    pub post_comment: bool,
    pub fail_on_secret_findings: bool,
}

#[derive(Debug, Clone)]
pub struct PullRequestOutcome {
    pub result: IndexResult,
    pub status_submitted: bool,
    pub comment_submitted: bool,
    pub failed: bool,
}
