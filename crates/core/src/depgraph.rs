//! Import-edge extraction and test↔source mapping, building the
//! `DependencyGraph`/`TestCoverage` types.

use crate::enumerator::parent_dir;
use crate::types::{DependencyGraph, TestCoverage};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

const TEST_PATH_MARKERS: &[&str] = &["__tests__/", ".test.", ".spec.", "/tests/"];

pub fn is_test_path(path: &str) -> bool {
    TEST_PATH_MARKERS.iter().any(|m| path.contains(m))
}

fn import_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r#"(?:import|from)\s+['"](\./[^'"]+|\.\./[^'"]+)['"]"#).unwrap(),
            Regex::new(r#"require\(\s*['"](\./[^'"]+|\.\./[^'"]+)['"]\s*\)"#).unwrap(),
            Regex::new(r#"^\s*(?:pub\s+)?mod\s+(\w+)\s*;"#).unwrap(),
        ]
    })
}

/// Extracts relative import targets from `text`, resolved against `path`'s
/// directory. Only relative specifiers are followed — cross-language or
/// package-registry resolution is out of scope (non-goal: semantic cross-
/// language reference resolution).
pub fn extract_imports(path: &str, text: &str) -> Vec<String> {
    let dir = parent_dir(path);
    let mut out = Vec::new();
    for (idx, pattern) in import_patterns().iter().enumerate() {
        for caps in pattern.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let raw = m.as_str();
            let resolved = if idx == 2 {
                // `mod foo;` resolves to a sibling file/module, not a relative path.
                resolve_relative(dir, &format!("./{raw}"))
            } else {
                resolve_relative(dir, raw)
            };
            if let Some(resolved) = resolved {
                out.push(resolved);
            }
        }
    }
    out
}

fn resolve_relative(dir: &str, raw: &str) -> Option<String> {
    let mut parts: Vec<&str> = if dir.is_empty() { Vec::new() } else { dir.split('/').collect() };
    for segment in raw.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

const RESOLVE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "py", "rs", "go"];

fn resolve_against_known(target: &str, known_paths: &[String]) -> Option<String> {
    if known_paths.iter().any(|p| p == target) {
        return Some(target.to_string());
    }
    for ext in RESOLVE_EXTENSIONS {
        let candidate = format!("{target}.{ext}");
        if known_paths.iter().any(|p| p == &candidate) {
            return Some(candidate);
        }
        let index_candidate = format!("{target}/index.{ext}");
        if known_paths.iter().any(|p| p == &index_candidate) {
            return Some(index_candidate);
        }
        let mod_candidate = format!("{target}/mod.{ext}");
        if known_paths.iter().any(|p| p == &mod_candidate) {
            return Some(mod_candidate);
        }
    }
    None
}

/// Resolves every file's raw import targets against the known file set,
/// building both directions of the edge.
pub fn build_dependency_graph(raw_imports: &BTreeMap<String, Vec<String>>, known_paths: &[String]) -> DependencyGraph {
    let mut imports: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut imported_by: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (path, targets) in raw_imports {
        let mut resolved = Vec::new();
        for target in targets {
            if let Some(hit) = resolve_against_known(target, known_paths) {
                resolved.push(hit.clone());
                imported_by.entry(hit).or_default().push(path.clone());
            }
        }
        if !resolved.is_empty() {
            resolved.sort();
            resolved.dedup();
            imports.insert(path.clone(), resolved);
        }
    }
    for v in imported_by.values_mut() {
        v.sort();
        v.dedup();
    }
    DependencyGraph { imports, imported_by }
}

fn stem_of(path: &str) -> String {
    let filename = path.rsplit('/').next().unwrap_or(path);
    let stem = filename.split('.').next().unwrap_or(filename);
    stem.to_string()
}

/// A source file is covered by a test file when the test file's stem matches
/// the source file's stem, or the source file is one of the test file's
/// resolved import targets.
pub fn build_test_coverage(known_paths: &[String], graph: &DependencyGraph) -> TestCoverage {
    let mut covers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut covered_by: BTreeMap<String, Vec<String>> = BTreeMap::new();

    let test_paths: Vec<&String> = known_paths.iter().filter(|p| is_test_path(p)).collect();
    let source_paths: Vec<&String> = known_paths.iter().filter(|p| !is_test_path(p)).collect();

    for test_path in &test_paths {
        let test_stem = stem_of(test_path);
        let mut matched: Vec<String> = Vec::new();

        for source_path in &source_paths {
            if stem_of(source_path) == test_stem {
                matched.push((*source_path).clone());
            }
        }
        if let Some(imported) = graph.imports.get(*test_path) {
            for target in imported {
                if source_paths.iter().any(|p| *p == target) && !matched.contains(target) {
                    matched.push(target.clone());
                }
            }
        }
        if matched.is_empty() {
            continue;
        }
        matched.sort();
        matched.dedup();
        for source in &matched {
            covered_by.entry(source.clone()).or_default().push((*test_path).clone());
        }
        covers.insert((*test_path).clone(), matched);
    }
    for v in covered_by.values_mut() {
        v.sort();
        v.dedup();
    }
    TestCoverage { covered_by, covers }
}
