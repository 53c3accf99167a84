//! Parser adapter abstraction over external extraction engines.
//!
//! Supports multiple engines behind one interface:
//! - Layout: structure-aware HTTP parser (fields, tables, page geometry)
//! - Docparse: general-purpose HTTP document parser (text + pages)
//! - Plaintext: local last-resort fallback
//!
//! Adapters do not persist anything; they turn bytes into a `ParseResult`
//! or fail with a `ParserError` that the router treats as recoverable.

mod docparse;
mod layout;
mod plaintext;
mod router;

pub use docparse::DocParser;
pub use layout::LayoutParser;
pub use plaintext::PlainTextParser;
pub use router::ParserRouter;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::BoundingBox;

/// Errors from parser adapters.
///
/// Every variant names the adapter that raised it so chain logs and
/// surfaced failures identify the engine without extra context.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("{parser}: timed out after {elapsed_secs}s")]
    Timeout { parser: String, elapsed_secs: u64 },

    #[error("{parser}: request failed (status {status:?}): {message}")]
    Http {
        parser: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{parser}: not available: {hint}")]
    Unavailable { parser: String, hint: String },

    #[error("{parser}: unusable response: {message}")]
    Malformed { parser: String, message: String },

    #[error("{parser}: unsupported mime type {mime_type}")]
    UnsupportedMime { parser: String, mime_type: String },
}

impl ParserError {
    /// Name of the adapter that raised the error.
    pub fn parser(&self) -> &str {
        match self {
            Self::Timeout { parser, .. }
            | Self::Http { parser, .. }
            | Self::Unavailable { parser, .. }
            | Self::Malformed { parser, .. }
            | Self::UnsupportedMime { parser, .. } => parser,
        }
    }

    /// Whether retrying later could succeed (timeouts, 429s, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http { status, .. } => match status {
                Some(code) => *code == 429 || *code >= 500,
                None => true,
            },
            _ => false,
        }
    }
}

/// Per-page text from an engine that reports page boundaries.
#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-based page number.
    pub page: u32,
    pub text: String,
}

/// A key/value candidate reported by a structure-aware engine.
#[derive(Debug, Clone)]
pub struct RawField {
    pub name: String,
    pub value: String,
    pub page: Option<u32>,
    pub bbox: Option<BoundingBox>,
    /// Engine-reported confidence for this field, 0..1.
    pub confidence: Option<f64>,
}

/// A table reported by an engine, headers plus row cells.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub title: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub page: Option<u32>,
}

/// Result of one parse attempt.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    /// Full plain-text content.
    pub text: String,
    /// Per-page text when the engine reports it.
    pub pages: Vec<PageText>,
    /// Tables when the engine reports them.
    pub tables: Vec<RawTable>,
    /// Key/value candidates when the engine reports structure.
    pub fields: Vec<RawField>,
    /// Engine-reported overall confidence, 0..1.
    pub confidence: Option<f64>,
}

/// Uniform interface to one external extraction engine.
#[async_trait]
pub trait ParserAdapter: Send + Sync {
    /// Stable adapter name used in config chains and extraction rows.
    fn name(&self) -> &'static str;

    /// Whether this adapter handles the given MIME type.
    fn supports(&self, mime_type: &str) -> bool;

    /// Whether the adapter can run at all (API keys present, etc).
    fn is_available(&self) -> bool;

    /// What is needed to make this adapter available.
    fn availability_hint(&self) -> String;

    /// Probe the engine without submitting a document.
    async fn health_check(&self) -> Result<(), ParserError>;

    /// Parse document bytes into a `ParseResult`.
    async fn parse(&self, content: &[u8], mime_type: &str) -> Result<ParseResult, ParserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let timeout = ParserError::Timeout {
            parser: "layout".into(),
            elapsed_secs: 30,
        };
        assert!(timeout.is_transient());

        let rate_limited = ParserError::Http {
            parser: "layout".into(),
            status: Some(429),
            message: "too many requests".into(),
        };
        assert!(rate_limited.is_transient());

        let bad_request = ParserError::Http {
            parser: "layout".into(),
            status: Some(400),
            message: "bad payload".into(),
        };
        assert!(!bad_request.is_transient());

        let unavailable = ParserError::Unavailable {
            parser: "layout".into(),
            hint: "set LEASEFLOW_LAYOUT_API_KEY".into(),
        };
        assert!(!unavailable.is_transient());
    }

    #[test]
    fn test_error_names_parser() {
        let err = ParserError::Malformed {
            parser: "docparse".into(),
            message: "empty body".into(),
        };
        assert_eq!(err.parser(), "docparse");
        assert!(err.to_string().contains("docparse"));
    }
}
