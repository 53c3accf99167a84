//! Redaction boundary.
//!
//! The redaction service itself lives outside this crate; the pipeline only
//! depends on the contract here. Every raw snippet, table cell, and text
//! chunk MUST pass through a `ContentRedactor` before persistence. The
//! orchestrator enforces this; repositories never see un-redacted content.

use regex::Regex;

/// Collaborator contract for the PII-scrubbing step.
pub trait ContentRedactor: Send + Sync {
    /// Redact raw content prior to persistence.
    fn redact(&self, content: &[u8], mime_type: &str) -> Vec<u8>;

    /// Convenience wrapper for text content.
    fn redact_text(&self, text: &str) -> String {
        String::from_utf8_lossy(&self.redact(text.as_bytes(), "text/plain")).into_owned()
    }
}

/// Pattern-based redactor used when no external service is wired in.
///
/// Scrubs US social security numbers, email addresses, and phone numbers.
/// Deployments substitute an HTTP client implementing the same trait.
pub struct PatternRedactor {
    patterns: Vec<(Regex, &'static str)>,
}

impl PatternRedactor {
    pub fn new() -> Self {
        let patterns = vec![
            (
                Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("static pattern"),
                "[SSN]",
            ),
            (
                Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
                    .expect("static pattern"),
                "[EMAIL]",
            ),
            (
                Regex::new(r"(?:\+1[-. ]?)?\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b")
                    .expect("static pattern"),
                "[PHONE]",
            ),
        ];
        Self { patterns }
    }
}

impl Default for PatternRedactor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentRedactor for PatternRedactor {
    fn redact(&self, content: &[u8], _mime_type: &str) -> Vec<u8> {
        let mut text = String::from_utf8_lossy(content).into_owned();
        for (pattern, replacement) in &self.patterns {
            text = pattern.replace_all(&text, *replacement).into_owned();
        }
        text.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrubs_ssn() {
        let redactor = PatternRedactor::new();
        let out = redactor.redact_text("SSN 123-45-6789 on file");
        assert_eq!(out, "SSN [SSN] on file");
    }

    #[test]
    fn test_scrubs_email_and_phone() {
        let redactor = PatternRedactor::new();
        let out = redactor.redact_text("contact jane@acme.com or (555) 867-5309");
        assert!(out.contains("[EMAIL]"));
        assert!(out.contains("[PHONE]"));
        assert!(!out.contains("acme.com"));
    }

    #[test]
    fn test_clean_text_unchanged() {
        let redactor = PatternRedactor::new();
        let input = "Base Rent: $2,500.00 per month";
        assert_eq!(redactor.redact_text(input), input);
    }
}
