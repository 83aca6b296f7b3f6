//! Ordered replacement-rule sanitizer. Rules apply in declaration order, so
//! an earlier rule's replacement is visible to later rules.

use regex::Regex;

#[derive(Debug, Clone)]
pub struct SanitizeRule {
    pub id: String,
    pattern: Regex,
    replacement: String,
}

impl SanitizeRule {
    pub fn new(id: impl Into<String>, pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self { id: id.into(), pattern: Regex::new(pattern)?, replacement: replacement.into() })
    }
}

/// Rules the pipeline wires in by default: masking common secret-assignment
/// shapes while keeping the key name, so a denied/allowed file still reads
/// sensibly once a [`crate::secrets::SecretScanner`] has already recorded the
/// finding against the pre-sanitize text. Mirrors `secrets::default_rules`'s
/// rule ids so the pair is easy to read side by side.
pub fn default_rules() -> Vec<SanitizeRule> {
    vec![
        SanitizeRule::new(
            "api-key",
            r#"(?i)(\b[a-z_]*api[_-]?key\b\s*[=:]\s*['"]?)[a-z0-9\-_.]{8,}"#,
            "$1***",
        )
        .unwrap(),
        SanitizeRule::new("aws-access-key", r"\bAKIA[0-9A-Z]{16}\b", "[aws-access-key-redacted]").unwrap(),
        SanitizeRule::new(
            "bearer-token",
            r"(?i)(\bbearer\s+)[a-z0-9._~+/=-]{10,}\b",
            "$1[redacted]",
        )
        .unwrap(),
        SanitizeRule::new("jwt", r"\beyJ[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+\b", "[jwt-redacted]").unwrap(),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    rules: Vec<SanitizeRule>,
}

#[derive(Debug, Clone, Default)]
pub struct SanitizeReport {
    pub applied_rule_ids: Vec<String>,
}

impl Sanitizer {
    pub fn new(rules: Vec<SanitizeRule>) -> Self {
        Self { rules }
    }

    pub fn apply(&self, text: &str) -> (String, SanitizeReport) {
        let mut working = text.to_string();
        let mut applied = Vec::new();
        for rule in &self.rules {
            if rule.pattern.is_match(&working) {
                working = rule.pattern.replace_all(&working, rule.replacement.as_str()).into_owned();
                applied.push(rule.id.clone());
            }
        }
        (working, SanitizeReport { applied_rule_ids: applied })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_rules_in_order_and_reports_ids() {
        let sanitizer = Sanitizer::new(vec![
            SanitizeRule::new("mask-secret", r"API_KEY=\S+", "API_KEY=***").unwrap(),
            SanitizeRule::new("mask-stars", r"\*\*\*", "[redacted]").unwrap(),
        ]);
        let (result, report) = sanitizer.apply("API_KEY=super-secret");
        assert_eq!(result, "API_KEY=[redacted]");
        assert_eq!(report.applied_rule_ids, vec!["mask-secret", "mask-stars"]);
    }

    #[test]
    fn no_match_produces_no_applied_ids() {
        let sanitizer = Sanitizer::new(vec![SanitizeRule::new("noop", r"nomatch", "x").unwrap()]);
        let (result, report) = sanitizer.apply("hello world");
        assert_eq!(result, "hello world");
        assert!(report.applied_rule_ids.is_empty());
    }

    #[test]
    fn is_idempotent_when_replacement_is_a_fixed_point() {
        let sanitizer = Sanitizer::new(vec![SanitizeRule::new("mask", r"secret\d*", "***").unwrap()]);
        let (once, _) = sanitizer.apply("secret123");
        let (twice, _) = sanitizer.apply(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn default_rules_mask_api_key_value_but_keep_the_key_name() {
        let sanitizer = Sanitizer::new(default_rules());
        let (result, report) = sanitizer.apply("API_KEY=super-secret");
        assert_eq!(result, "API_KEY=***");
        assert!(report.applied_rule_ids.contains(&"api-key".to_string()));
    }
}
