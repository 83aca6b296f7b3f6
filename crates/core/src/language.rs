//! Extension-based language detection.
//!
//! A single lookup table, not a content sniffer: good enough to tag
//! `IndexFileMetadata::language`, drive the `by-section` markdown heuristic,
//! and pick a language-chunk-profile key. Semantic understanding (resolving
//! ambiguous extensions via shebang or content) is out of scope.

use std::path::Path;

const EXTENSION_TABLE: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("py", "python"),
    ("pyi", "python"),
    ("go", "go"),
    ("java", "java"),
    ("kt", "kotlin"),
    ("kts", "kotlin"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("cxx", "cpp"),
    ("hpp", "cpp"),
    ("hh", "cpp"),
    ("hxx", "cpp"),
    ("cs", "csharp"),
    ("rb", "ruby"),
    ("php", "php"),
    ("swift", "swift"),
    ("scala", "scala"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("zsh", "shell"),
    ("ps1", "powershell"),
    ("sql", "sql"),
    ("html", "html"),
    ("htm", "html"),
    ("css", "css"),
    ("scss", "scss"),
    ("less", "less"),
    ("vue", "vue"),
    ("svelte", "svelte"),
    ("json", "json"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("toml", "toml"),
    ("xml", "xml"),
    ("md", "markdown"),
    ("markdown", "markdown"),
    ("rst", "restructuredtext"),
    ("proto", "protobuf"),
    ("graphql", "graphql"),
    ("gql", "graphql"),
];

/// Maps a repo-relative path's extension to a language name; `None` for
/// extensionless files or extensions not in the table.
pub fn detect_language(path: &str) -> Option<String> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    EXTENSION_TABLE.iter().find(|(e, _)| *e == ext).map(|(_, lang)| lang.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_languages() {
        assert_eq!(detect_language("src/lib.rs"), Some("rust".to_string()));
        assert_eq!(detect_language("app/component.tsx"), Some("typescript".to_string()));
        assert_eq!(detect_language("README.md"), Some("markdown".to_string()));
    }

    #[test]
    fn unknown_extension_is_none() {
        assert_eq!(detect_language("data.xyz123"), None);
    }

    #[test]
    fn extensionless_file_is_none() {
        assert_eq!(detect_language("Makefile"), None);
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(detect_language("SRC/LIB.RS"), Some("rust".to_string()));
    }
}
