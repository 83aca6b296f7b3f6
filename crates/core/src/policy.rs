//! Policy engine: license gating and PII redaction.
//!
//! Two independent passes. License runs first and can deny a file outright
//! (excluding it from `files`/`chunks`); PII runs on whatever text survives
//! and only redacts, it never denies.

use crate::types::{PolicyFinding, PolicyFindingKind};
use regex::Regex;

const LICENSE_SNIFF_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseAction {
    Allow,
    Deny,
}

#[derive(Debug, Clone)]
pub struct LicensePolicy {
    pub allow_list: Option<Vec<String>>,
    pub deny_list: Vec<String>,
    detectors: Vec<(String, Regex)>,
}

impl LicensePolicy {
    pub fn new(allow_list: Option<Vec<String>>, deny_list: Vec<String>) -> Self {
        Self { allow_list, deny_list, detectors: default_license_detectors() }
    }

    pub fn detect(&self, text: &str) -> Option<String> {
        let prefix: String = text.chars().take(LICENSE_SNIFF_BYTES).collect();
        self.detectors.iter().find(|(_, re)| re.is_match(&prefix)).map(|(name, _)| name.clone())
    }

    /// Evaluates the license pass for one file. Returns `(action, finding)`;
    /// `finding` is present only when a license was detected (denied or not).
    pub fn evaluate(&self, path: &str, text: &str) -> (LicenseAction, Option<PolicyFinding>) {
        let detected = match self.detect(text) {
            Some(d) => d,
            None => return (LicenseAction::Allow, None),
        };

        let denied = self.deny_list.iter().any(|d| d == &detected)
            || self.allow_list.as_ref().map(|allowed| !allowed.contains(&detected)).unwrap_or(false);

        let finding = PolicyFinding {
            path: path.to_string(),
            kind: PolicyFindingKind::License,
            message: format!("detected license: {detected}"),
            details: Some(detected),
        };

        if denied {
            (LicenseAction::Deny, Some(finding))
        } else {
            (LicenseAction::Allow, Some(finding))
        }
    }
}

fn default_license_detectors() -> Vec<(String, Regex)> {
    vec![
        ("MIT".to_string(), Regex::new(r"(?i)MIT License|Permission is hereby granted").unwrap()),
        (
            "Apache2".to_string(),
            Regex::new(r"(?i)Apache License,?\s*Version 2\.0|www\.apache\.org/licenses/LICENSE-2\.0").unwrap(),
        ),
        ("GPL".to_string(), Regex::new(r"(?i)GNU GENERAL PUBLIC LICENSE").unwrap()),
        (
            "BSD".to_string(),
            Regex::new(r"(?i)Redistribution and use in source and binary forms").unwrap(),
        ),
        ("MPL".to_string(), Regex::new(r"(?i)Mozilla Public License").unwrap()),
    ]
}

#[derive(Debug, Clone)]
pub struct PiiPattern {
    pub name: String,
    pattern: Regex,
}

impl PiiPattern {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self { name: name.into(), pattern: Regex::new(pattern)? })
    }
}

pub fn default_pii_patterns() -> Vec<PiiPattern> {
    vec![
        PiiPattern::new("email", r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap(),
        PiiPattern::new("ssn", r"\b\d{3}-\d{2}-\d{4}\b").unwrap(),
        PiiPattern::new("phone", r"\b\(?\d{3}\)?[-.\s]\d{3}[-.\s]\d{4}\b").unwrap(),
        PiiPattern::new("card-number", r"\b\d{13,16}\b").unwrap(),
    ]
}

#[derive(Debug, Clone)]
pub struct PiiPolicy {
    pub enabled: bool,
    pub replacement: String,
    patterns: Vec<PiiPattern>,
}

impl PiiPolicy {
    pub fn new(enabled: bool, replacement: impl Into<String>, extra_patterns: Vec<PiiPattern>) -> Self {
        let mut patterns = default_pii_patterns();
        patterns.extend(extra_patterns);
        Self { enabled, replacement: replacement.into(), patterns }
    }

    pub fn redact(&self, path: &str, text: &str) -> (String, Vec<PolicyFinding>) {
        if !self.enabled {
            return (text.to_string(), Vec::new());
        }
        let mut working = text.to_string();
        let mut findings = Vec::new();
        for pattern in &self.patterns {
            let match_count = pattern.pattern.find_iter(&working).count();
            if match_count > 0 {
                working = pattern.pattern.replace_all(&working, self.replacement.as_str()).into_owned();
                for _ in 0..match_count {
                    findings.push(PolicyFinding {
                        path: path.to_string(),
                        kind: PolicyFindingKind::Pii,
                        message: format!("redacted {}", pattern.name),
                        details: None,
                    });
                }
            }
        }
        (working, findings)
    }
}

impl Default for PiiPolicy {
    fn default() -> Self {
        Self::new(false, "[redacted]", Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mit_license_in_deny_list_is_denied() {
        let policy = LicensePolicy::new(None, vec!["MIT".to_string()]);
        let (action, finding) =
            policy.evaluate("LICENSE", "MIT License Permission is hereby granted");
        assert_eq!(action, LicenseAction::Deny);
        assert!(finding.is_some());
    }

    #[test]
    fn allow_list_set_without_detected_name_is_denied() {
        let policy = LicensePolicy::new(Some(vec!["Apache2".to_string()]), Vec::new());
        let (action, _) = policy.evaluate("LICENSE", "MIT License Permission is hereby granted");
        assert_eq!(action, LicenseAction::Deny);
    }

    #[test]
    fn no_license_detected_is_allowed_without_finding() {
        let policy = LicensePolicy::new(None, vec!["MIT".to_string()]);
        let (action, finding) = policy.evaluate("plain.txt", "just some text");
        assert_eq!(action, LicenseAction::Allow);
        assert!(finding.is_none());
    }

    #[test]
    fn pii_redacts_email_and_records_finding() {
        let policy = PiiPolicy::new(true, "[pii]", Vec::new());
        let (redacted, findings) = policy.redact("pii.txt", "email john.doe@example.com");
        assert_eq!(redacted, "email [pii]");
        assert!(!redacted.contains("@example.com"));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, PolicyFindingKind::Pii);
    }

    #[test]
    fn disabled_pii_policy_is_a_no_op() {
        let policy = PiiPolicy::new(false, "[pii]", Vec::new());
        let (redacted, findings) = policy.redact("pii.txt", "email john.doe@example.com");
        assert_eq!(redacted, "email john.doe@example.com");
        assert!(findings.is_empty());
    }
}
