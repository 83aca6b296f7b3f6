//! Compiles gitignore-style glob patterns into regular expressions.
//!
//! Pattern → regex rules (mirrors `.gitignore` semantics, not delegated to a
//! VCS-aware crate so every rule is explicit and testable in isolation):
//! `**/` matches any number of directory segments; `**` matches across
//! separators; `*` matches any run of non-`/` characters; `?` matches exactly
//! one non-`/` character; `[set]` is a character class. A leading `/` anchors
//! the pattern to the directory that declared it; otherwise the pattern
//! matches at any depth below that directory (`**/pattern`). A trailing `/`
//! restricts the match to directories and everything beneath them
//! (`pattern/**`).

use regex::Regex;

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub negate: bool,
    /// Directory (repo-relative, forward-slash, no trailing slash; empty for root)
    /// that this pattern was declared in and is anchored against.
    pub declared_in: String,
    regex: Regex,
}

impl CompiledPattern {
    /// `path` is repo-relative and forward-slash normalized.
    pub fn is_match(&self, path: &str) -> bool {
        if self.declared_in.is_empty() {
            self.regex.is_match(path)
        } else if let Some(rest) = path.strip_prefix(&self.declared_in) {
            rest.strip_prefix('/').map(|r| self.regex.is_match(r)).unwrap_or(false)
        } else {
            false
        }
    }
}

/// Compile a single gitignore-style pattern declared in directory `declared_in`
/// (repo-relative, no leading/trailing slash; `""` for the repository root).
pub fn compile_pattern(raw: &str, declared_in: &str) -> Option<CompiledPattern> {
    let mut pattern = raw.trim_end();
    if pattern.is_empty() || pattern.starts_with('#') {
        return None;
    }

    let negate = pattern.starts_with('!');
    if negate {
        pattern = &pattern[1..];
    }

    let is_dir_only = pattern.ends_with('/') && !pattern.ends_with("\\/");
    let mut body = pattern.trim_end_matches('/').to_string();

    let anchored = body.starts_with('/');
    if anchored {
        body = body.trim_start_matches('/').to_string();
    }

    let mut core = glob_to_regex_body(&body);
    if is_dir_only {
        core = format!("(?:{core})(?:/.*)?");
    }

    let full = if anchored { format!("^{core}$") } else { format!("^(?:.*/)?{core}$") };

    let regex = Regex::new(&full).ok()?;
    Some(CompiledPattern { negate, declared_in: declared_in.to_string(), regex })
}

fn glob_to_regex_body(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                if i + 1 < chars.len() && chars[i + 1] == '*' {
                    let followed_by_slash = i + 2 < chars.len() && chars[i + 2] == '/';
                    if followed_by_slash {
                        out.push_str("(?:.*/)?");
                        i += 3;
                    } else {
                        out.push_str(".*");
                        i += 2;
                    }
                } else {
                    out.push_str("[^/]*");
                    i += 1;
                }
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '[' => {
                let mut j = i + 1;
                let mut class = String::from("[");
                if j < chars.len() && (chars[j] == '!' || chars[j] == '^') {
                    class.push('^');
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    class.push(chars[j]);
                    j += 1;
                }
                class.push(']');
                out.push_str(&class);
                i = j + 1;
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }
    out
}

/// A set of patterns layered down a tree: patterns from ancestor directories
/// apply to descendants too; the innermost-declared match for a given path
/// wins the negation check (later patterns override earlier ones of the same
/// specificity, matching gitignore's "last match wins" rule).
#[derive(Debug, Clone, Default)]
pub struct LayeredIgnoreMatcher {
    patterns: Vec<CompiledPattern>,
}

impl LayeredIgnoreMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_file(&mut self, declared_in: &str, contents: &str) {
        for line in contents.lines() {
            if let Some(p) = compile_pattern(line, declared_in) {
                self.patterns.push(p);
            }
        }
    }

    pub fn push_patterns(&mut self, declared_in: &str, raw_patterns: &[String]) {
        for raw in raw_patterns {
            if let Some(p) = compile_pattern(raw, declared_in) {
                self.patterns.push(p);
            }
        }
    }

    /// Whether `path` is ignored: last matching pattern (by declaration order)
    /// determines the effective flag; a negation pattern flips it back off.
    pub fn is_ignored(&self, path: &str) -> bool {
        let mut ignored = false;
        for p in &self.patterns {
            if p.is_match(path) {
                ignored = !p.negate;
            }
        }
        ignored
    }
}
