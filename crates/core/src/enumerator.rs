//! Walks a snapshot and produces the ordered candidate file list.
//!
//! Layered ignore rules are applied by hand via [`glob_compiler`] rather than
//! delegated to the directory walker's own gitignore engine, so `.gitignore`
//! inheritance, negation, and anchoring follow the documented rule set
//! exactly; `ignore::WalkBuilder` is used only for the raw recursive walk
//! (skipping VCS metadata and respecting symlink safety), with its own
//! ignore-file handling switched off.

use crate::error::{IndexError, Result};
use crate::glob_compiler::LayeredIgnoreMatcher;
use crate::types::FileEntry;
use ignore::WalkBuilder;
use regex::RegexSet;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct EnumerateOptions {
    pub ignore_file_names: Vec<String>,
    pub workspace_roots: Vec<String>,
    pub exclude_regexes: Vec<String>,
    pub sparse_patterns: Vec<String>,
    pub include_paths: Vec<String>,
}

impl EnumerateOptions {
    pub fn with_default_ignore_file() -> Self {
        Self { ignore_file_names: vec![".gitignore".to_string()], ..Default::default() }
    }
}

pub fn enumerate(root: &Path, opts: &EnumerateOptions) -> Result<Vec<FileEntry>> {
    let exclude_set = if opts.exclude_regexes.is_empty() {
        None
    } else {
        Some(
            RegexSet::new(&opts.exclude_regexes)
                .map_err(|e| IndexError::InvalidInput(format!("invalid exclude regex: {e}")))?,
        )
    };

    let mut matcher = LayeredIgnoreMatcher::new();
    // Load ignore files from the root down as we discover directories below;
    // since WalkBuilder yields depth-first in lexical order we load ancestor
    // ignore files before descending into their children by walking directories first.
    load_ignore_files_recursively(root, root, opts, &mut matcher)?;

    let mut walker = WalkBuilder::new(root);
    walker
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .follow_links(false);

    let mut entries = Vec::new();
    for result in walker.build() {
        let entry = match result {
            Ok(e) => e,
            Err(_) => continue,
        };
        let path = entry.path();
        if path == root {
            continue;
        }
        let is_vcs_dir = path.file_name().map(|n| n == ".git").unwrap_or(false);
        if is_vcs_dir {
            continue;
        }
        let file_type = match entry.file_type() {
            Some(ft) => ft,
            None => continue,
        };
        if !file_type.is_file() {
            continue;
        }

        let rel = match path.strip_prefix(root) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let rel_str = normalize_path(rel);

        if matcher.is_ignored(&rel_str) {
            continue;
        }

        if !opts.workspace_roots.is_empty() && !under_any_root(&rel_str, &opts.workspace_roots) {
            continue;
        }

        if let Some(set) = &exclude_set {
            if set.is_match(&rel_str) {
                continue;
            }
        }

        if !opts.sparse_patterns.is_empty() && !matches_any(&rel_str, &opts.sparse_patterns) {
            continue;
        }

        if !opts.include_paths.is_empty() && !matches_any(&rel_str, &opts.include_paths) {
            continue;
        }

        let metadata = fs::symlink_metadata(path).map_err(IndexError::Io)?;
        let executable = is_executable(&metadata);

        entries.push(FileEntry {
            path: rel_str,
            size_bytes: metadata.len(),
            executable,
            object_id: None,
        });
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn load_ignore_files_recursively(
    root: &Path,
    dir: &Path,
    opts: &EnumerateOptions,
    matcher: &mut LayeredIgnoreMatcher,
) -> Result<()> {
    let rel = dir.strip_prefix(root).unwrap_or(Path::new(""));
    let declared_in = normalize_path(rel);

    for name in &opts.ignore_file_names {
        let candidate = dir.join(name);
        if let Ok(contents) = fs::read_to_string(&candidate) {
            matcher.push_file(&declared_in, &contents);
        }
    }

    let read_dir = match fs::read_dir(dir) {
        Ok(r) => r,
        Err(_) => return Ok(()),
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.file_name().map(|n| n == ".git").unwrap_or(false) {
            continue;
        }
        if path.is_dir() {
            load_ignore_files_recursively(root, &path, opts, matcher)?;
        }
    }
    Ok(())
}

fn matches_any(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| {
        crate::glob_compiler::compile_pattern(p, "").map(|c| c.is_match(path)).unwrap_or(false)
    })
}

fn under_any_root(path: &str, roots: &[String]) -> bool {
    roots.iter().any(|root| {
        let root = root.trim_matches('/');
        path == root || path.starts_with(&format!("{root}/"))
    })
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}

pub fn normalize_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Used by the symbol/import-edge passes: maps a repo-relative path to its
/// directory component, forward-slash normalized.
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}
