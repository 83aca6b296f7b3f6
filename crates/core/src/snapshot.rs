//! Materializes a read-only view of a repository at a chosen revision.
//!
//! Two implementations: [`GitSnapshotProvider`] (checks a commit's tree out
//! into a scratch directory via `git2`, vendored libgit2 — grounded in the
//! teacher's `git.rs` blame/history queries) and [`PlainSnapshotProvider`]
//! (copies a working directory, or extracts a `tar`/`zip` archive).

use crate::error::{IndexError, Result};
use crate::types::{ArchiveKind, RepositoryKind, RepositorySpec, Snapshot};
use git2::{BlameOptions, Repository};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct SnapshotOpenOptions {
    pub revision: Option<String>,
    pub sparse_patterns: Vec<String>,
    pub enable_submodules: bool,
    pub enable_large_file_ext: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ChangedFiles {
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlameLine {
    pub line: usize,
    pub author: String,
    pub date: String,
    pub commit: String,
    pub content: String,
}

pub trait SnapshotProvider: Send + Sync {
    fn open(&self, spec: &RepositorySpec, opts: &SnapshotOpenOptions) -> Result<Snapshot>;

    /// Only meaningful for version-controlled sources; the default rejects.
    fn resolve_ref(&self, spec: &RepositorySpec, name: &str) -> Result<String> {
        let _ = (spec, name);
        Err(IndexError::InvalidInput("resolve_ref is only supported for version-controlled sources".to_string()))
    }

    fn list_changed_files(&self, spec: &RepositorySpec, base: &str, head: &str) -> Result<ChangedFiles> {
        let _ = (spec, base, head);
        Err(IndexError::InvalidInput("list_changed_files is only supported for version-controlled sources".to_string()))
    }

    fn blame(&self, spec: &RepositorySpec, path: &str, revision: Option<&str>) -> Result<Vec<BlameLine>> {
        let _ = (spec, path, revision);
        Err(IndexError::InvalidInput("blame is only supported for version-controlled sources".to_string()))
    }
}

// ---------------------------------------------------------------------------
// date formatting: chrono-free epoch math (Howard Hinnant's civil_from_days)
// ---------------------------------------------------------------------------

fn format_git_time(time: git2::Time) -> String {
    let adjusted = time.seconds() + (time.offset_minutes() as i64) * 60;
    let days = adjusted.div_euclid(86400);
    let rem = adjusted.rem_euclid(86400);
    let hours = rem / 3600;
    let mins = (rem % 3600) / 60;
    let (year, month, day) = days_to_ymd(days);
    format!("{year:04}-{month:02}-{day:02} {hours:02}:{mins:02}")
}

/// Civil-from-days algorithm (Howard Hinnant), used instead of a chrono
/// dependency for a single date-formatting call.
fn days_to_ymd(mut days: i64) -> (i64, i64, i64) {
    days += 719468;
    let era = if days >= 0 { days } else { days - 146096 } / 146097;
    let doe = days - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

fn status_label(delta: git2::Delta) -> &'static str {
    match delta {
        git2::Delta::Added => "added",
        git2::Delta::Deleted => "deleted",
        git2::Delta::Modified => "modified",
        git2::Delta::Renamed => "renamed",
        git2::Delta::Copied => "copied",
        git2::Delta::Typechange => "typechange",
        _ => "unknown",
    }
}

// ---------------------------------------------------------------------------
// Git-backed provider
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct GitSnapshotProvider;

impl GitSnapshotProvider {
    pub fn new() -> Self {
        Self
    }

    fn open_repo(spec: &RepositorySpec) -> Result<Repository> {
        Repository::open(&spec.path).map_err(|e| IndexError::SnapshotFailure(format!("failed to open repository at {}: {e}", spec.path.display())))
    }

    pub fn resolve_ref(&self, spec: &RepositorySpec, name: &str) -> Result<String> {
        let repo = Self::open_repo(spec)?;
        let obj = repo
            .revparse_single(name)
            .map_err(|_| IndexError::InvalidRevision { path: spec.path.clone(), revision: name.to_string() })?;
        let commit = obj
            .peel_to_commit()
            .map_err(|_| IndexError::InvalidRevision { path: spec.path.clone(), revision: name.to_string() })?;
        Ok(commit.id().to_string())
    }

    /// Files that differ between `base` and `head`, split into changed (added,
    /// modified, renamed, copied, typechanged) and deleted.
    pub fn list_changed_files(&self, spec: &RepositorySpec, base: &str, head: &str) -> Result<ChangedFiles> {
        let repo = Self::open_repo(spec)?;
        let base_tree = Self::tree_for(&repo, spec, base)?;
        let head_tree = Self::tree_for(&repo, spec, head)?;

        let diff = repo
            .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)
            .map_err(|e| IndexError::SnapshotFailure(format!("diff failed: {e}")))?;

        let mut result = ChangedFiles::default();
        diff.foreach(
            &mut |delta, _| {
                let path = delta
                    .new_file()
                    .path()
                    .or_else(|| delta.old_file().path())
                    .and_then(|p| p.to_str())
                    .unwrap_or("")
                    .to_string();
                if path.is_empty() {
                    return true;
                }
                match delta.status() {
                    git2::Delta::Deleted => result.deleted.push(path),
                    _ => result.changed.push(path),
                }
                true
            },
            None,
            None,
            None,
        )
        .map_err(|e| IndexError::SnapshotFailure(format!("diff iteration failed: {e}")))?;

        result.changed.sort();
        result.deleted.sort();
        Ok(result)
    }

    fn tree_for<'repo>(repo: &'repo Repository, spec: &RepositorySpec, revision: &str) -> Result<git2::Tree<'repo>> {
        let obj = repo
            .revparse_single(revision)
            .map_err(|_| IndexError::InvalidRevision { path: spec.path.clone(), revision: revision.to_string() })?;
        let commit = obj
            .peel_to_commit()
            .map_err(|_| IndexError::InvalidRevision { path: spec.path.clone(), revision: revision.to_string() })?;
        commit.tree().map_err(|e| IndexError::SnapshotFailure(format!("failed to read tree: {e}")))
    }

    /// Line-level authorship, optionally scoped to a revision. Only supported
    /// for version-controlled sources.
    pub fn blame(&self, spec: &RepositorySpec, path: &str, revision: Option<&str>) -> Result<Vec<BlameLine>> {
        let repo = Self::open_repo(spec)?;
        let mut opts = BlameOptions::new();
        if let Some(rev) = revision {
            let commit = repo
                .revparse_single(rev)
                .and_then(|o| o.peel_to_commit())
                .map_err(|_| IndexError::InvalidRevision { path: spec.path.clone(), revision: rev.to_string() })?;
            opts.newest_commit(commit.id());
        }

        let blame = repo
            .blame_file(Path::new(path), Some(&mut opts))
            .map_err(|e| IndexError::SnapshotFailure(format!("blame failed for {path}: {e}")))?;

        let contents = if let Some(rev) = revision {
            let tree = Self::tree_for(&repo, spec, rev)?;
            let entry = tree
                .get_path(Path::new(path))
                .map_err(|_| IndexError::NotFound(format!("{path} at {rev}")))?;
            let blob = entry
                .to_object(&repo)
                .ok()
                .and_then(|o| o.peel_to_blob().ok())
                .ok_or_else(|| IndexError::NotFound(format!("{path} at {rev}")))?;
            String::from_utf8_lossy(blob.content()).into_owned()
        } else {
            std::fs::read_to_string(spec.path.join(path)).map_err(|source| IndexError::ReadFailure { path: spec.path.join(path), source })?
        };
        let lines: Vec<&str> = contents.lines().collect();

        let mut result = Vec::new();
        for hunk_idx in 0..blame.len() {
            let Some(hunk) = blame.get_index(hunk_idx) else { continue };
            let sig = hunk.final_signature();
            let author = sig.name().unwrap_or("unknown").to_string();
            let commit_id = hunk.final_commit_id();
            let date = repo.find_commit(commit_id).map(|c| format_git_time(c.time())).unwrap_or_else(|_| "unknown".to_string());
            let short_hash = commit_id.to_string()[..8].to_string();

            let start_line = hunk.final_start_line();
            for i in 0..hunk.lines_in_hunk() {
                let line_num = start_line + i;
                result.push(BlameLine {
                    line: line_num,
                    author: author.clone(),
                    date: date.clone(),
                    commit: short_hash.clone(),
                    content: lines.get(line_num.saturating_sub(1)).copied().unwrap_or("").to_string(),
                });
            }
        }
        Ok(result)
    }

    fn init_submodules(repo: &Repository) -> std::result::Result<(), String> {
        let submodules = repo.submodules().map_err(|e| e.to_string())?;
        for mut sub in submodules {
            sub.update(true, None).map_err(|e| format!("{}: {e}", sub.name().unwrap_or("<unnamed>")))?;
        }
        Ok(())
    }
}

impl SnapshotProvider for GitSnapshotProvider {
    fn open(&self, spec: &RepositorySpec, opts: &SnapshotOpenOptions) -> Result<Snapshot> {
        let repo = Self::open_repo(spec)?;
        let revision_request = opts.revision.as_deref().unwrap_or("HEAD");
        let resolved = self.resolve_ref(spec, revision_request)?;
        let oid = git2::Oid::from_str(&resolved).map_err(|_| IndexError::InvalidRevision { path: spec.path.clone(), revision: resolved.clone() })?;
        let commit = repo.find_commit(oid).map_err(|e| IndexError::SnapshotFailure(format!("failed to load commit {resolved}: {e}")))?;
        let tree = commit.tree().map_err(|e| IndexError::SnapshotFailure(format!("failed to read tree: {e}")))?;

        let scratch = std::env::temp_dir().join(format!("strata-snapshot-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&scratch)?;

        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.target_dir(&scratch).force();
        repo.checkout_tree(tree.as_object(), Some(&mut checkout))
            .map_err(|e| IndexError::SnapshotFailure(format!("checkout failed: {e}")))?;

        let mut snapshot = Snapshot::new(scratch.clone(), Some(resolved));
        snapshot.push_cleanup(move || {
            let _ = std::fs::remove_dir_all(&scratch);
        });

        if !opts.sparse_patterns.is_empty() {
            snapshot.warnings.push(
                "sparse-checkout patterns were requested but are not applied to exported tree snapshots".to_string(),
            );
        }
        if opts.enable_submodules {
            if let Err(e) = Self::init_submodules(&repo) {
                snapshot.warnings.push(format!("submodule initialization failed: {e}"));
            }
        }
        if opts.enable_large_file_ext {
            snapshot.warnings.push("large-file extension checkout (e.g. Git LFS) is not implemented; pointer files may be left in place".to_string());
        }

        Ok(snapshot)
    }

    fn resolve_ref(&self, spec: &RepositorySpec, name: &str) -> Result<String> {
        GitSnapshotProvider::resolve_ref(self, spec, name)
    }

    fn list_changed_files(&self, spec: &RepositorySpec, base: &str, head: &str) -> Result<ChangedFiles> {
        GitSnapshotProvider::list_changed_files(self, spec, base, head)
    }

    fn blame(&self, spec: &RepositorySpec, path: &str, revision: Option<&str>) -> Result<Vec<BlameLine>> {
        GitSnapshotProvider::blame(self, spec, path, revision)
    }
}

// ---------------------------------------------------------------------------
// Plain (filesystem / archive) provider
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct PlainSnapshotProvider;

impl PlainSnapshotProvider {
    pub fn new() -> Self {
        Self
    }
}

impl SnapshotProvider for PlainSnapshotProvider {
    fn open(&self, spec: &RepositorySpec, _opts: &SnapshotOpenOptions) -> Result<Snapshot> {
        match spec.kind {
            RepositoryKind::Filesystem => {
                let scratch = std::env::temp_dir().join(format!("strata-snapshot-{}", uuid::Uuid::new_v4()));
                copy_dir_recursive(&spec.path, &scratch)?;
                let mut snapshot = Snapshot::new(scratch.clone(), None);
                snapshot.push_cleanup(move || {
                    let _ = std::fs::remove_dir_all(&scratch);
                });
                Ok(snapshot)
            }
            RepositoryKind::Archive => {
                let scratch = std::env::temp_dir().join(format!("strata-snapshot-{}", uuid::Uuid::new_v4()));
                std::fs::create_dir_all(&scratch)?;
                extract_archive(&spec.path, &scratch, spec.archive_kind)?;
                let root = single_top_level_dir(&scratch)?;
                let mut snapshot = Snapshot::new(root, None);
                snapshot.push_cleanup(move || {
                    let _ = std::fs::remove_dir_all(&scratch);
                });
                Ok(snapshot)
            }
            RepositoryKind::VersionControlled => Err(IndexError::InvalidInput(
                "PlainSnapshotProvider cannot materialize a version-controlled source; use GitSnapshotProvider".to_string(),
            )),
        }
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dest_path = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}

fn detect_archive_kind(path: &Path, declared: Option<ArchiveKind>) -> Result<ArchiveKind> {
    if let Some(kind) = declared {
        return Ok(kind);
    }
    let name = path.to_string_lossy().to_lowercase();
    if name.ends_with(".zip") {
        Ok(ArchiveKind::Zip)
    } else if name.ends_with(".tar") || name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Ok(ArchiveKind::Tar)
    } else {
        Err(IndexError::InvalidInput(format!("cannot infer archive kind for {}", path.display())))
    }
}

fn extract_archive(archive_path: &Path, dest: &Path, declared_kind: Option<ArchiveKind>) -> Result<()> {
    let kind = detect_archive_kind(archive_path, declared_kind)?;
    match kind {
        ArchiveKind::Zip => {
            let file = std::fs::File::open(archive_path)?;
            let mut zip = zip::ZipArchive::new(file).map_err(|e| IndexError::SnapshotFailure(format!("invalid zip archive: {e}")))?;
            zip.extract(dest).map_err(|e| IndexError::SnapshotFailure(format!("zip extraction failed: {e}")))?;
        }
        ArchiveKind::Tar => {
            let file = std::fs::File::open(archive_path)?;
            let name = archive_path.to_string_lossy().to_lowercase();
            if name.ends_with(".gz") || name.ends_with(".tgz") {
                let decoder = flate2::read::GzDecoder::new(file);
                tar::Archive::new(decoder).unpack(dest).map_err(|e| IndexError::SnapshotFailure(format!("tar.gz extraction failed: {e}")))?;
            } else {
                tar::Archive::new(file).unpack(dest).map_err(|e| IndexError::SnapshotFailure(format!("tar extraction failed: {e}")))?;
            }
        }
    }
    Ok(())
}

/// If an extraction root contains exactly one entry and it is a directory,
/// that directory becomes the effective snapshot root.
fn single_top_level_dir(extract_root: &Path) -> Result<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(extract_root)?.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    if entries.len() == 1 && entries[0].is_dir() {
        Ok(entries.remove(0))
    } else {
        Ok(extract_root.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_label_maps_every_delta_kind() {
        assert_eq!(status_label(git2::Delta::Added), "added");
        assert_eq!(status_label(git2::Delta::Deleted), "deleted");
        assert_eq!(status_label(git2::Delta::Modified), "modified");
    }

    #[test]
    fn days_to_ymd_round_trips_a_known_epoch_date() {
        // 2024-01-15T00:00:00Z
        let seconds_since_epoch = 1705276800i64;
        let (y, m, d) = days_to_ymd(seconds_since_epoch / 86400);
        assert_eq!((y, m, d), (2024, 1, 15));
    }

    #[test]
    fn single_top_level_dir_unwraps_a_lone_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("project-v1");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("a.txt"), "hi").unwrap();

        let resolved = single_top_level_dir(tmp.path()).unwrap();
        assert_eq!(resolved, nested);
    }

    #[test]
    fn single_top_level_dir_keeps_root_with_multiple_entries() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "hi").unwrap();
        std::fs::write(tmp.path().join("b.txt"), "bye").unwrap();

        let resolved = single_top_level_dir(tmp.path()).unwrap();
        assert_eq!(resolved, tmp.path());
    }

    #[test]
    fn copy_dir_recursive_copies_nested_files() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("sub")).unwrap();
        std::fs::write(src.path().join("top.txt"), "top").unwrap();
        std::fs::write(src.path().join("sub/nested.txt"), "nested").unwrap();

        let dst = tempfile::tempdir().unwrap();
        let dest_root = dst.path().join("copy");
        copy_dir_recursive(src.path(), &dest_root).unwrap();

        assert_eq!(std::fs::read_to_string(dest_root.join("top.txt")).unwrap(), "top");
        assert_eq!(std::fs::read_to_string(dest_root.join("sub/nested.txt")).unwrap(), "nested");
    }
}
