//! The indexing pipeline: the orchestrator, and the run's hard core.
//!
//! Implemented as a single `run` method walking the stages in order
//! (`Opening → Planning → Seeding → Enumerating → Selecting → Processing →
//! Assembling`) rather than as a generic state-machine type, favoring direct
//! imperative control flow over a framework.
//! `Memoizing` (writing the result into the index store) is the caller's
//! job — `manager::IndexManager` owns the store and decides whether a dry
//! run should be persisted at all. `Releasing` happens here, unconditionally,
//! once processing finishes or fails.

use crate::bytebudget::ByteBudget;
use crate::cache::{CacheRecord, ChunkCache};
use crate::chunker::{self, ChunkInput, ChunkOptions, LanguageChunkProfile};
use crate::dedup::Deduplicator;
use crate::depgraph::{build_dependency_graph, build_test_coverage, extract_imports};
use crate::enumerator::{self, EnumerateOptions};
use crate::error::{IndexError, Result};
use crate::filter::ContentFilter;
use crate::language;
use crate::normalize::{normalize, NormalizeOptions};
use crate::policy::{LicenseAction, LicensePolicy, PiiPattern, PiiPolicy};
use crate::sanitize::{self, Sanitizer};
use crate::secrets::{SecretRule, SecretScanner};
use crate::snapshot::{ChangedFiles, SnapshotOpenOptions, SnapshotProvider};
use crate::symbols::extract_symbols;
use crate::tokenizer::{self, Tokenizer};
use crate::types::*;

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Owns the collaborators worth sharing across runs: the snapshot provider
/// and the per-manager content cache. Everything else (normalizer,
/// sanitizer, detectors, scanners) is rebuilt fresh per run from
/// `IndexOptions`, since none of it holds state worth keeping.
pub struct Pipeline {
    snapshot_provider: Arc<dyn SnapshotProvider>,
    cache: Arc<ChunkCache>,
    content_filter: ContentFilter,
    normalize_options: NormalizeOptions,
    sanitizer: Sanitizer,
}

impl Pipeline {
    pub fn new(snapshot_provider: Arc<dyn SnapshotProvider>, cache: Arc<ChunkCache>) -> Self {
        Self {
            snapshot_provider,
            cache,
            content_filter: ContentFilter::default(),
            normalize_options: NormalizeOptions::default(),
            sanitizer: Sanitizer::new(sanitize::default_rules()),
        }
    }

    pub fn with_content_filter(mut self, filter: ContentFilter) -> Self {
        self.content_filter = filter;
        self
    }

    pub fn with_normalize_options(mut self, opts: NormalizeOptions) -> Self {
        self.normalize_options = opts;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Runs one indexing pass over `spec`. `base` is the prior result to
    /// seed unchanged files from when `options.incremental` is set; resolving
    /// which prior result that is (explicit revision vs. most recent) is
    /// `manager::IndexManager`'s job, not the pipeline's.
    pub async fn run(&self, spec: &RepositorySpec, options: &IndexOptions, base: Option<&IndexResult>) -> Result<IndexResult> {
        let open_opts = SnapshotOpenOptions {
            revision: options.revision.clone(),
            sparse_patterns: options.sparse_patterns.clone(),
            enable_submodules: options.enable_submodules,
            enable_large_file_ext: options.enable_large_file_ext,
        };
        let mut snapshot = self.snapshot_provider.open(spec, &open_opts)?;
        tracing::info!(path = %spec.path.display(), revision = ?snapshot.resolved_revision, "snapshot opened");

        let outcome = self.run_against_snapshot(spec, options, base, &snapshot).await;

        // Releasing: unconditional, every exit path, idempotent.
        snapshot.release();
        match &outcome {
            Ok(result) => tracing::info!(path = %spec.path.display(), files = result.files.len(), chunks = result.chunks.len(), "index run complete"),
            Err(e) => tracing::warn!(path = %spec.path.display(), error = %e, "index run failed"),
        }
        outcome
    }

    async fn run_against_snapshot(
        &self,
        spec: &RepositorySpec,
        options: &IndexOptions,
        base: Option<&IndexResult>,
        snapshot: &Snapshot,
    ) -> Result<IndexResult> {
        let diff = self.plan_diff(spec, options, snapshot, base)?;

        let mut files: Vec<IndexFileMetadata> = Vec::new();
        let mut chunks: Vec<IndexChunk> = Vec::new();
        let mut file_contents: BTreeMap<String, String> = BTreeMap::new();
        let mut language_by_hash: BTreeMap<String, String> = BTreeMap::new();
        let mut secret_findings: Vec<SecretFinding> = Vec::new();
        let mut policy_findings: Vec<PolicyFinding> = Vec::new();
        let mut raw_imports: BTreeMap<String, Vec<String>> = BTreeMap::new();

        if let (Some(base), Some(diff)) = (base, &diff) {
            seed_unchanged(
                base,
                diff,
                &mut files,
                &mut chunks,
                &mut file_contents,
                &mut language_by_hash,
                &mut secret_findings,
                &mut policy_findings,
                &mut raw_imports,
            );
        }

        let enum_opts = EnumerateOptions {
            ignore_file_names: vec![".gitignore".to_string()],
            workspace_roots: options.workspace_roots.clone(),
            exclude_regexes: options.exclude_regexes.clone(),
            sparse_patterns: options.sparse_patterns.clone(),
            include_paths: options.include_paths.clone(),
        };
        let entries = enumerator::enumerate(&snapshot.root, &enum_opts)?;

        let candidates: Vec<FileEntry> = entries
            .into_iter()
            .filter(|e| diff.as_ref().map(|d| d.changed.iter().any(|c| c == &e.path)).unwrap_or(true))
            .filter(|e| options.resume_cursor.as_ref().map(|c| e.path.as_str() > c.0.as_str()).unwrap_or(true))
            .collect();

        let truncated = options.max_files_per_run.map(|n| candidates.len() > n).unwrap_or(false);
        let selected: Vec<FileEntry> = match options.max_files_per_run {
            Some(n) => candidates.into_iter().take(n).collect(),
            None => candidates,
        };
        let resume_cursor = if truncated { selected.last().map(|e| ResumeCursor(e.path.clone())) } else { None };

        let mut base_chunk_options = options.chunking.clone();
        base_chunk_options.tokenizer_id = options.tokenizer_id.clone();
        let base_tokenizer = tokenizer::registry().resolve(&base_chunk_options.tokenizer_id)?;

        let license_policy = LicensePolicy::new(options.policy.license.allowed.clone(), options.policy.license.denied.clone());
        let pii_patterns: Vec<PiiPattern> = options
            .policy
            .pii
            .patterns
            .iter()
            .filter_map(|p| PiiPattern::new(p.name.clone(), &p.pattern).ok())
            .collect();
        let pii_policy = PiiPolicy::new(options.policy.pii.enabled, options.policy.pii.replacement.clone(), pii_patterns);

        let secret_rules: Vec<SecretRule> = options
            .secret_patterns
            .iter()
            .filter_map(|p| SecretRule::new(p.id.clone(), &p.pattern).ok())
            .collect();
        let secret_scanner = SecretScanner::new(secret_rules);

        let files_acc = Arc::new(Mutex::new(files));
        let chunks_acc = Arc::new(Mutex::new(chunks));
        let contents_acc = Arc::new(Mutex::new(file_contents));
        let lang_acc = Arc::new(Mutex::new(language_by_hash));
        let secrets_acc = Arc::new(Mutex::new(secret_findings));
        let policy_acc = Arc::new(Mutex::new(policy_findings));
        let imports_acc = Arc::new(Mutex::new(raw_imports));
        let dedup = Arc::new(Mutex::new(Deduplicator::new()));

        let root = snapshot.root.clone();
        let candidates = Arc::new(selected);
        let cursor = Arc::new(AtomicUsize::new(0));
        let byte_budget = ByteBudget::new(options.max_in_flight_bytes);
        let language_profiles = Arc::new(options.language_chunk_profiles.clone());
        let base_chunk_options = Arc::new(base_chunk_options);

        let concurrency = if candidates.is_empty() { 0 } else { options.concurrency.max(1) };
        let mut handles = Vec::new();
        for _ in 0..concurrency {
            let candidates = candidates.clone();
            let cursor = cursor.clone();
            let root = root.clone();
            let language_profiles = language_profiles.clone();
            let base_chunk_options = base_chunk_options.clone();
            let base_tokenizer = base_tokenizer.clone();
            let content_filter = self.content_filter.clone();
            let normalize_options = self.normalize_options.clone();
            let sanitizer = self.sanitizer.clone();
            let license_policy = license_policy.clone();
            let pii_policy = pii_policy.clone();
            let secret_scanner = secret_scanner.clone();
            let scan_secrets = options.scan_secrets;
            let dry_run = options.dry_run;
            let cache = self.cache.clone();
            let dedup = dedup.clone();
            let files_acc = files_acc.clone();
            let chunks_acc = chunks_acc.clone();
            let contents_acc = contents_acc.clone();
            let lang_acc = lang_acc.clone();
            let secrets_acc = secrets_acc.clone();
            let policy_acc = policy_acc.clone();
            let imports_acc = imports_acc.clone();
            let byte_budget = byte_budget.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let idx = cursor.fetch_add(1, Ordering::SeqCst);
                    if idx >= candidates.len() {
                        break;
                    }
                    let entry = candidates[idx].clone();
                    let _permit = byte_budget.acquire(entry.size_bytes).await;
                    process_one(ProcessCtx {
                        root: &root,
                        entry,
                        language_profiles: &language_profiles,
                        base_chunk_options: &base_chunk_options,
                        base_tokenizer: &base_tokenizer,
                        content_filter: &content_filter,
                        normalize_options: &normalize_options,
                        sanitizer: &sanitizer,
                        license_policy: &license_policy,
                        pii_policy: &pii_policy,
                        secret_scanner: &secret_scanner,
                        scan_secrets,
                        dry_run,
                        cache: &cache,
                        dedup: &dedup,
                        files_acc: &files_acc,
                        chunks_acc: &chunks_acc,
                        contents_acc: &contents_acc,
                        lang_acc: &lang_acc,
                        secrets_acc: &secrets_acc,
                        policy_acc: &policy_acc,
                        imports_acc: &imports_acc,
                    });
                }
            }));
        }
        for handle in handles {
            handle.await.map_err(|e| IndexError::SnapshotFailure(format!("pipeline worker failed: {e}")))?;
        }

        let mut result = IndexResult {
            spec: spec.clone(),
            revision: snapshot.resolved_revision.clone(),
            files: unwrap_mutex(files_acc),
            chunks: unwrap_mutex(chunks_acc),
            created_at: now_unix(),
            file_contents_by_path: unwrap_mutex(contents_acc),
            language_by_content_hash: unwrap_mutex(lang_acc),
            secret_findings: unwrap_mutex(secrets_acc),
            policy_findings: unwrap_mutex(policy_acc),
            shards: None,
            resume_cursor,
            test_coverage: None,
            dependency_graph: None,
            symbol_index: None,
        };

        result.finalize_order();

        if let Some(sharding) = &options.sharding {
            result.shards = Some(build_shards(&result.chunks, sharding));
        }

        let mut symbols = Vec::new();
        for c in &result.chunks {
            for sym in extract_symbols(&c.chunk.metadata.path, &c.chunk.text) {
                let absolute_line = sym.line + c.chunk.metadata.start_line - 1;
                symbols.push(Symbol { line: absolute_line, ..sym });
            }
        }
        result.symbol_index = Some(symbols);

        let known_paths: Vec<String> = result.files.iter().map(|f| f.path.clone()).collect();
        let raw_imports = unwrap_mutex(imports_acc);
        let graph = build_dependency_graph(&raw_imports, &known_paths);
        result.test_coverage = Some(build_test_coverage(&known_paths, &graph));
        result.dependency_graph = Some(graph);

        Ok(result)
    }

    /// Planning: decides which files to treat as "changed" this run. `None`
    /// means every enumerated file is a candidate (the non-incremental case,
    /// and — per the documented edge case — a plain directory/archive source
    /// with no real diff mechanism, where the content cache does the work of
    /// skipping files whose bytes didn't actually change).
    fn plan_diff(
        &self,
        spec: &RepositorySpec,
        options: &IndexOptions,
        snapshot: &Snapshot,
        base: Option<&IndexResult>,
    ) -> Result<Option<ChangedFiles>> {
        if !options.incremental || spec.kind != RepositoryKind::VersionControlled {
            return Ok(None);
        }
        let base_revision = match &options.base_revision {
            Some(explicit) => explicit.clone(),
            None => match base.and_then(|b| b.revision.clone()) {
                Some(rev) => rev,
                None => return Ok(None),
            },
        };
        let head = snapshot
            .resolved_revision
            .clone()
            .ok_or_else(|| IndexError::SnapshotFailure("version-controlled snapshot has no resolved revision".to_string()))?;
        Ok(Some(self.snapshot_provider.list_changed_files(spec, &base_revision, &head)?))
    }
}

#[allow(clippy::too_many_arguments)]
fn seed_unchanged(
    base: &IndexResult,
    diff: &ChangedFiles,
    files: &mut Vec<IndexFileMetadata>,
    chunks: &mut Vec<IndexChunk>,
    file_contents: &mut BTreeMap<String, String>,
    language_by_hash: &mut BTreeMap<String, String>,
    secret_findings: &mut Vec<SecretFinding>,
    policy_findings: &mut Vec<PolicyFinding>,
    raw_imports: &mut BTreeMap<String, Vec<String>>,
) {
    for file in &base.files {
        if diff.changed.iter().any(|p| p == &file.path) || diff.deleted.iter().any(|p| p == &file.path) {
            continue;
        }
        files.push(file.clone());
        if let Some(content) = base.file_contents_by_path.get(&file.path) {
            file_contents.insert(file.path.clone(), content.clone());
        }
        if let Some(lang) = base.language_by_content_hash.get(&file.content_hash) {
            language_by_hash.insert(file.content_hash.clone(), lang.clone());
        }
        for c in &base.chunks {
            if c.chunk.metadata.path == file.path {
                chunks.push(c.clone());
            }
        }
        secret_findings.extend(base.secret_findings.iter().filter(|f| f.path == file.path).cloned());
        policy_findings.extend(base.policy_findings.iter().filter(|f| f.path == file.path).cloned());
        if let Some(deps) = base.dependency_graph.as_ref().and_then(|g| g.imports.get(&file.path)) {
            raw_imports.insert(file.path.clone(), deps.clone());
        }
    }
}

struct ProcessCtx<'a> {
    root: &'a PathBuf,
    entry: FileEntry,
    language_profiles: &'a BTreeMap<String, LanguageChunkProfile>,
    base_chunk_options: &'a ChunkOptions,
    base_tokenizer: &'a Arc<dyn Tokenizer>,
    content_filter: &'a ContentFilter,
    normalize_options: &'a NormalizeOptions,
    sanitizer: &'a Sanitizer,
    license_policy: &'a LicensePolicy,
    pii_policy: &'a PiiPolicy,
    secret_scanner: &'a SecretScanner,
    scan_secrets: bool,
    dry_run: bool,
    cache: &'a ChunkCache,
    dedup: &'a Mutex<Deduplicator>,
    files_acc: &'a Mutex<Vec<IndexFileMetadata>>,
    chunks_acc: &'a Mutex<Vec<IndexChunk>>,
    contents_acc: &'a Mutex<BTreeMap<String, String>>,
    lang_acc: &'a Mutex<BTreeMap<String, String>>,
    secrets_acc: &'a Mutex<Vec<SecretFinding>>,
    policy_acc: &'a Mutex<Vec<PolicyFinding>>,
    imports_acc: &'a Mutex<BTreeMap<String, Vec<String>>>,
}

/// Processes one candidate file end to end: classify, read,
/// normalize, sanitize, policy-evaluate, hash, cache-check, then either
/// reuse a cached record or scan/chunk/dedup fresh. Every early return here
/// is a swallowed per-file failure — the run continues with the next file.
fn process_one(ctx: ProcessCtx) {
    let entry = ctx.entry;
    let full_path = ctx.root.join(&entry.path);

    let sniff = sniff_prefix(&full_path);
    let classification = ctx.content_filter.classify(&entry.path, entry.size_bytes, sniff.as_deref());
    if classification.is_skipped() {
        return;
    }

    let raw_text = match std::fs::read_to_string(&full_path) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(path = %entry.path, error = %e, "skipping unreadable file");
            return;
        }
    };

    let (normalized, _) = normalize(&raw_text, ctx.normalize_options);
    let pre_sanitize_text = normalized.clone();
    let (sanitized, _) = ctx.sanitizer.apply(&normalized);

    let (license_action, license_finding) = ctx.license_policy.evaluate(&entry.path, &sanitized);
    if let Some(finding) = license_finding {
        ctx.policy_acc.lock().push(finding);
    }
    if license_action == LicenseAction::Deny {
        return;
    }

    let (final_text, pii_findings) = ctx.pii_policy.redact(&entry.path, &sanitized);
    if !pii_findings.is_empty() {
        ctx.policy_acc.lock().extend(pii_findings);
    }

    let hash = content_hash(&final_text);
    let language = language::detect_language(&entry.path);

    let effective_opts = match &language {
        Some(lang) => ctx
            .language_profiles
            .get(lang)
            .map(|profile| profile.apply(ctx.base_chunk_options))
            .unwrap_or_else(|| ctx.base_chunk_options.clone()),
        None => ctx.base_chunk_options.clone(),
    };

    let tokenizer: Arc<dyn Tokenizer> = if effective_opts.tokenizer_id == ctx.base_tokenizer.id() {
        ctx.base_tokenizer.clone()
    } else {
        match tokenizer::registry().resolve(&effective_opts.tokenizer_id) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %entry.path, tokenizer = %effective_opts.tokenizer_id, error = %e, "skipping file: tokenizer unavailable");
                return;
            }
        }
    };

    let cached = ctx.cache.get(&hash, &entry.path);
    let (chunk_list, file_secret_findings) = if let Some(record) = cached {
        (record.chunks, record.secret_findings)
    } else {
        let findings = if ctx.scan_secrets { ctx.secret_scanner.scan(&entry.path, &pre_sanitize_text) } else { Vec::new() };
        let input = ChunkInput { text: &final_text, path: &entry.path, language: language.as_deref() };
        let chunked = chunker::chunk(&input, &effective_opts, tokenizer.as_ref());
        if !ctx.dry_run {
            ctx.cache.insert(
                &hash,
                &entry.path,
                CacheRecord { language: language.clone(), chunks: chunked.clone(), secret_findings: findings.clone() },
            );
        }
        (chunked, findings)
    };

    let mut deduped = Vec::new();
    {
        let mut guard = ctx.dedup.lock();
        for c in chunk_list {
            if let Some(kept) = guard.admit(c) {
                deduped.push(kept);
            }
        }
    }

    ctx.secrets_acc.lock().extend(file_secret_findings);

    let imports = extract_imports(&entry.path, &final_text);
    if !imports.is_empty() {
        ctx.imports_acc.lock().insert(entry.path.clone(), imports);
    }

    for c in deduped {
        ctx.chunks_acc.lock().push(IndexChunk { chunk: c, file_hash: hash.clone() });
    }

    ctx.files_acc.lock().push(IndexFileMetadata {
        path: entry.path.clone(),
        size_bytes: entry.size_bytes,
        content_hash: hash.clone(),
        language: language.clone(),
        executable: entry.executable,
        skip_reason: None,
    });
    ctx.contents_acc.lock().insert(entry.path.clone(), final_text);
    if let Some(lang) = language {
        ctx.lang_acc.lock().insert(hash, lang);
    }
}

fn build_shards(chunks: &[IndexChunk], opts: &ShardingOptions) -> Vec<Shard> {
    let count_cap = opts.chunks_per_shard.unwrap_or(usize::MAX);
    let size_cap = opts.approx_chunk_size.unwrap_or(usize::MAX);

    let mut shards = Vec::new();
    let mut ids: Vec<String> = Vec::new();
    let mut size = 0usize;

    for c in chunks {
        let exceeds_count = ids.len() >= count_cap;
        let exceeds_size = !ids.is_empty() && size + c.chunk.metadata.char_count > size_cap;
        if !ids.is_empty() && (exceeds_count || exceeds_size) {
            shards.push(Shard { id: format!("shard-{}", shards.len() + 1), chunk_count: ids.len(), chunk_ids: std::mem::take(&mut ids), approx_size: size });
            size = 0;
        }
        ids.push(c.chunk.id.clone());
        size += c.chunk.metadata.char_count;
    }
    if !ids.is_empty() {
        shards.push(Shard { id: format!("shard-{}", shards.len() + 1), chunk_count: ids.len(), chunk_ids: ids, approx_size: size });
    }
    shards
}

fn sniff_prefix(path: &std::path::Path) -> Option<Vec<u8>> {
    use std::io::Read;
    let mut file = std::fs::File::open(path).ok()?;
    let mut buf = vec![0u8; 4096];
    let n = file.read(&mut buf).ok()?;
    buf.truncate(n);
    Some(buf)
}

fn unwrap_mutex<T>(arc: Arc<Mutex<T>>) -> T {
    Arc::try_unwrap(arc).unwrap_or_else(|_| panic!("pipeline accumulator still has outstanding references")).into_inner()
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::PlainSnapshotProvider;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &std::path::Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(Arc::new(PlainSnapshotProvider::new()), Arc::new(ChunkCache::new()))
    }

    #[tokio::test]
    async fn secret_is_found_and_masked_in_stored_content() {
        let dir = tempdir().unwrap();
        write(dir.path(), "safe.txt", "hello world");
        write(dir.path(), "secret.env", "API_KEY=super-secret");

        let spec = RepositorySpec::filesystem(dir.path());
        let mut options = IndexOptions::default();
        options.scan_secrets = true;

        let result = pipeline().run(&spec, &options, None).await.unwrap();

        assert_eq!(result.files.len(), 2);
        assert_eq!(result.secret_findings.len(), 1);
        assert_eq!(result.secret_findings[0].path, "secret.env");
        assert_eq!(result.file_contents_by_path["secret.env"], "API_KEY=***");
    }

    #[tokio::test]
    async fn license_denial_excludes_the_file() {
        let dir = tempdir().unwrap();
        write(dir.path(), "LICENSE", "MIT License Permission is hereby granted");
        write(dir.path(), "lib.rs", "pub fn main() {}\n");

        let spec = RepositorySpec::filesystem(dir.path());
        let mut options = IndexOptions::default();
        options.policy.license.denied = vec!["MIT".to_string()];

        let result = pipeline().run(&spec, &options, None).await.unwrap();

        assert!(result.files.iter().all(|f| f.path != "LICENSE"));
        assert!(result.policy_findings.iter().any(|f| f.path == "LICENSE"));
        assert!(result.files.iter().any(|f| f.path == "lib.rs"));
    }

    #[tokio::test]
    async fn pii_redaction_runs_after_license_check() {
        let dir = tempdir().unwrap();
        write(dir.path(), "pii.txt", "email john.doe@example.com");

        let spec = RepositorySpec::filesystem(dir.path());
        let mut options = IndexOptions::default();
        options.policy.pii.enabled = true;
        options.policy.pii.replacement = "[pii]".to_string();

        let result = pipeline().run(&spec, &options, None).await.unwrap();

        assert_eq!(result.file_contents_by_path["pii.txt"], "email [pii]");
        assert!(!result.file_contents_by_path["pii.txt"].contains("@example.com"));
    }

    #[tokio::test]
    async fn sharding_splits_one_chunk_per_shard() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.txt", "one\n");
        write(dir.path(), "b.txt", "two\n");
        write(dir.path(), "c.txt", "three\n");

        let spec = RepositorySpec::filesystem(dir.path());
        let mut options = IndexOptions::default();
        options.concurrency = 3;
        options.sharding = Some(ShardingOptions { chunks_per_shard: Some(1), approx_chunk_size: None });

        let result = pipeline().run(&spec, &options, None).await.unwrap();

        let shards = result.shards.unwrap();
        assert_eq!(shards.len(), result.chunks.len());
        assert!(shards.iter().all(|s| s.chunk_count == 1));
    }

    #[tokio::test]
    async fn resume_cursor_is_set_when_a_run_is_truncated() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.txt", "a");
        write(dir.path(), "b.txt", "b");
        write(dir.path(), "c.txt", "c");

        let spec = RepositorySpec::filesystem(dir.path());
        let mut options = IndexOptions::default();
        options.max_files_per_run = Some(2);

        let result = pipeline().run(&spec, &options, None).await.unwrap();

        assert_eq!(result.files.len(), 2);
        assert!(result.resume_cursor.is_some());
    }

    #[tokio::test]
    async fn binary_files_are_skipped_entirely() {
        let dir = tempdir().unwrap();
        write(dir.path(), "logo.png", "not really png bytes");
        write(dir.path(), "readme.txt", "hello");

        let spec = RepositorySpec::filesystem(dir.path());
        let options = IndexOptions::default();

        let result = pipeline().run(&spec, &options, None).await.unwrap();

        assert!(result.files.iter().all(|f| f.path != "logo.png"));
        assert!(result.files.iter().any(|f| f.path == "readme.txt"));
    }
}
