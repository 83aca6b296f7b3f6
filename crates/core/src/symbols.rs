//! Regex-based symbol extraction.
//!
//! A declaration-shaped line becomes a [`Symbol`] — this is not semantic
//! analysis (call graphs from type information are an explicit non-goal);
//! it is a single regex pass over already-chunked text.

use crate::types::{Symbol, SymbolKind};
use regex::Regex;
use std::sync::OnceLock;

struct SymbolRule {
    kind: SymbolKind,
    regex: Regex,
}

fn rules() -> &'static Vec<SymbolRule> {
    static RULES: OnceLock<Vec<SymbolRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            SymbolRule { kind: SymbolKind::Function, regex: Regex::new(r"^\s*(?:export\s+)?(?:async\s+)?function\s+(\w+)").unwrap() },
            SymbolRule { kind: SymbolKind::Function, regex: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+(\w+)").unwrap() },
            SymbolRule { kind: SymbolKind::Function, regex: Regex::new(r"^\s*(?:async\s+)?def\s+(\w+)\s*\(").unwrap() },
            SymbolRule { kind: SymbolKind::Function, regex: Regex::new(r"^\s*func\s+(\w+)\s*\(").unwrap() },
            SymbolRule { kind: SymbolKind::Class, regex: Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+(\w+)").unwrap() },
            SymbolRule { kind: SymbolKind::Struct, regex: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+(\w+)").unwrap() },
            SymbolRule { kind: SymbolKind::Enum, regex: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+(\w+)").unwrap() },
            SymbolRule { kind: SymbolKind::Interface, regex: Regex::new(r"^\s*(?:export\s+)?interface\s+(\w+)").unwrap() },
            SymbolRule { kind: SymbolKind::Trait, regex: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+(\w+)").unwrap() },
            SymbolRule { kind: SymbolKind::Constant, regex: Regex::new(r"^\s*(?:export\s+)?(?:pub(?:\([^)]*\))?\s+)?const\s+(\w+)\s*[:=]").unwrap() },
            SymbolRule { kind: SymbolKind::Method, regex: Regex::new(r"^\s*(?:export\s+)?(?:public|private|protected)?\s*(?:static\s+)?(?:async\s+)?\w+\s*\(.*\)\s*\{?\s*//\s*method").unwrap() },
        ]
    })
}

/// Scans each line of `text` against the declaration heuristics, tagging hits
/// with their 1-based line number and the declaring line as context.
pub fn extract_symbols(path: &str, text: &str) -> Vec<Symbol> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        for rule in rules() {
            if let Some(caps) = rule.regex.captures(line) {
                if let Some(name) = caps.get(1) {
                    out.push(Symbol {
                        name: name.as_str().to_string(),
                        kind: rule.kind,
                        path: path.to_string(),
                        line: idx + 1,
                        context: line.trim().to_string(),
                    });
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rust_function_and_struct() {
        let text = "pub struct Widget {\n    x: i32,\n}\n\npub fn build() -> Widget {\n    Widget { x: 0 }\n}\n";
        let symbols = extract_symbols("lib.rs", text);
        assert!(symbols.iter().any(|s| s.name == "Widget" && s.kind == SymbolKind::Struct));
        assert!(symbols.iter().any(|s| s.name == "build" && s.kind == SymbolKind::Function));
    }

    #[test]
    fn extracts_js_exported_function_and_class() {
        let text = "export function add(a, b) {\n  return a + b;\n}\n\nexport class Shape {}\n";
        let symbols = extract_symbols("math.js", text);
        assert!(symbols.iter().any(|s| s.name == "add" && s.kind == SymbolKind::Function));
        assert!(symbols.iter().any(|s| s.name == "Shape" && s.kind == SymbolKind::Class));
    }

    #[test]
    fn extracts_python_def() {
        let text = "def compute(x):\n    return x * 2\n";
        let symbols = extract_symbols("calc.py", text);
        assert!(symbols.iter().any(|s| s.name == "compute" && s.kind == SymbolKind::Function));
    }

    #[test]
    fn records_one_based_line_numbers() {
        let text = "// comment\npub fn second() {}\n";
        let symbols = extract_symbols("f.rs", text);
        let found = symbols.iter().find(|s| s.name == "second").unwrap();
        assert_eq!(found.line, 2);
    }
}
