//! Per-file classifier: binary, generated, or large.
//!
//! Any true flag excludes the file from further processing; `skip_reason` is
//! the comma-joined set of flags that fired.

use regex::RegexSet;
use std::path::Path;

const DEFAULT_BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "pdf", "zip", "tar", "gz", "xz", "7z",
    "rar", "exe", "dll", "so", "dylib", "a", "o", "class", "jar", "wasm", "woff", "woff2", "ttf",
    "otf", "mp3", "mp4", "mov", "avi", "bin",
];

const DEFAULT_GENERATED_PATTERNS: &[&str] = &[
    r"(?i)\.min\.(js|css)$",
    r"(?i)package-lock\.json$",
    r"(?i)yarn\.lock$",
    r"(?i)pnpm-lock\.yaml$",
    r"(?i)cargo\.lock$",
    r"(?i)\.generated\.",
    r"(?i)\.map$",
];

const DEFAULT_GENERATED_DIRS: &[&str] = &["dist", "build", "out", "vendor", "tmp", ".next"];

const DEFAULT_LARGE_THRESHOLD_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ContentFilter {
    binary_extensions: Vec<String>,
    generated_patterns: RegexSet,
    generated_dirs: Vec<String>,
    large_threshold_bytes: u64,
    sniff_binary_content: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ContentFilterConfig {
    pub extra_binary_extensions: Vec<String>,
    pub extra_generated_patterns: Vec<String>,
    pub extra_generated_dirs: Vec<String>,
    pub large_threshold_bytes: Option<u64>,
    pub sniff_binary_content: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifyResult {
    pub binary: bool,
    pub generated: bool,
    pub large: bool,
}

impl ClassifyResult {
    pub fn is_skipped(&self) -> bool {
        self.binary || self.generated || self.large
    }

    pub fn skip_reason(&self) -> Option<String> {
        if !self.is_skipped() {
            return None;
        }
        let mut flags = Vec::new();
        if self.binary {
            flags.push("binary");
        }
        if self.generated {
            flags.push("generated");
        }
        if self.large {
            flags.push("large");
        }
        Some(flags.join(","))
    }
}

impl ContentFilter {
    pub fn new(config: ContentFilterConfig) -> Self {
        let mut extensions: Vec<String> =
            DEFAULT_BINARY_EXTENSIONS.iter().map(|s| s.to_string()).collect();
        extensions.extend(config.extra_binary_extensions);

        let mut patterns: Vec<String> =
            DEFAULT_GENERATED_PATTERNS.iter().map(|s| s.to_string()).collect();
        patterns.extend(config.extra_generated_patterns);

        let mut dirs: Vec<String> = DEFAULT_GENERATED_DIRS.iter().map(|s| s.to_string()).collect();
        dirs.extend(config.extra_generated_dirs);

        Self {
            binary_extensions: extensions,
            generated_patterns: RegexSet::new(&patterns).expect("default patterns compile"),
            generated_dirs: dirs,
            large_threshold_bytes: config.large_threshold_bytes.unwrap_or(DEFAULT_LARGE_THRESHOLD_BYTES),
            sniff_binary_content: config.sniff_binary_content,
        }
    }

    pub fn classify(&self, path: &str, size_bytes: u64, sniff_prefix: Option<&[u8]>) -> ClassifyResult {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let binary_by_extension = self.binary_extensions.iter().any(|e| e == &ext);
        let binary_by_sniff = self.sniff_binary_content
            && sniff_prefix.map(|bytes| bytes.iter().take(4096).any(|&b| b == 0)).unwrap_or(false);

        let generated_by_pattern = self.generated_patterns.is_match(path);
        let generated_by_dir = path.split('/').any(|segment| self.generated_dirs.iter().any(|d| d == segment));

        ClassifyResult {
            binary: binary_by_extension || binary_by_sniff,
            generated: generated_by_pattern || generated_by_dir,
            large: size_bytes >= self.large_threshold_bytes,
        }
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(ContentFilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_binary_by_extension() {
        let filter = ContentFilter::default();
        let result = filter.classify("logo.png", 100, None);
        assert!(result.binary);
        assert_eq!(result.skip_reason(), Some("binary".to_string()));
    }

    #[test]
    fn classifies_generated_by_directory_segment() {
        let filter = ContentFilter::default();
        let result = filter.classify("frontend/dist/bundle.txt", 10, None);
        assert!(result.generated);
    }

    #[test]
    fn classifies_large_by_threshold() {
        let filter = ContentFilter::default();
        let result = filter.classify("big.txt", 3 * 1024 * 1024, None);
        assert!(result.large);
    }

    #[test]
    fn empty_file_is_not_classified_binary() {
        let filter = ContentFilter::default();
        let result = filter.classify("empty.txt", 0, Some(&[]));
        assert!(!result.is_skipped());
    }

    #[test]
    fn sniff_detects_null_byte_when_enabled() {
        let filter = ContentFilter::new(ContentFilterConfig { sniff_binary_content: true, ..Default::default() });
        let result = filter.classify("weird.data", 10, Some(&[0x00, 0x01]));
        assert!(result.binary);
    }

    #[test]
    fn multiple_flags_join_with_comma() {
        let filter = ContentFilter::default();
        let result = filter.classify("vendor/logo.png", 3 * 1024 * 1024, None);
        assert_eq!(result.skip_reason(), Some("binary,generated,large".to_string()));
    }
}
