//! Plain-text fallback parser.
//!
//! Last resort in every chain: no external engine, no structure recovery.
//! Decodes bytes as lossy UTF-8 and, for delimited formats, splits rows
//! into a single table. Self-reported confidence is deliberately low so
//! results from this adapter land in the review queue.

use async_trait::async_trait;

use super::{ParseResult, ParserAdapter, ParserError, RawTable};

/// Confidence reported for any result this adapter produces.
const FALLBACK_CONFIDENCE: f64 = 0.40;

/// Local fallback parser that never needs credentials.
pub struct PlainTextParser;

impl PlainTextParser {
    pub fn new() -> Self {
        Self
    }

    /// Split delimited text into a headers + rows table.
    fn split_delimited(text: &str, delimiter: char) -> Option<RawTable> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let headers: Vec<String> = lines
            .next()?
            .split(delimiter)
            .map(|c| c.trim().to_string())
            .collect();
        if headers.len() < 2 {
            return None;
        }
        let rows: Vec<Vec<String>> = lines
            .map(|line| {
                line.split(delimiter)
                    .map(|c| c.trim().to_string())
                    .collect()
            })
            .collect();
        Some(RawTable {
            title: None,
            headers,
            rows,
            page: None,
        })
    }
}

impl Default for PlainTextParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParserAdapter for PlainTextParser {
    fn name(&self) -> &'static str {
        "plaintext"
    }

    fn supports(&self, _mime_type: &str) -> bool {
        true
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        "always available".to_string()
    }

    async fn health_check(&self) -> Result<(), ParserError> {
        Ok(())
    }

    async fn parse(&self, content: &[u8], mime_type: &str) -> Result<ParseResult, ParserError> {
        let text = String::from_utf8_lossy(content).to_string();
        if text.trim().is_empty() {
            return Err(ParserError::Malformed {
                parser: self.name().to_string(),
                message: "no decodable text content".to_string(),
            });
        }

        let tables = match mime_type {
            "text/csv" => Self::split_delimited(&text, ',').into_iter().collect(),
            "text/tab-separated-values" => Self::split_delimited(&text, '\t').into_iter().collect(),
            _ => Vec::new(),
        };

        Ok(ParseResult {
            text,
            pages: Vec::new(),
            tables,
            fields: Vec::new(),
            confidence: Some(FALLBACK_CONFIDENCE),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parses_plain_text() {
        let parser = PlainTextParser::new();
        let result = parser
            .parse(b"Base Rent: $2,500.00\n", "text/plain")
            .await
            .unwrap();
        assert!(result.text.contains("Base Rent"));
        assert_eq!(result.confidence, Some(FALLBACK_CONFIDENCE));
    }

    #[tokio::test]
    async fn test_csv_becomes_table() {
        let parser = PlainTextParser::new();
        let result = parser
            .parse(b"unit,tenant,rent\n101,Acme Corp,2500\n102,Bravo LLC,3100\n", "text/csv")
            .await
            .unwrap();
        assert_eq!(result.tables.len(), 1);
        let table = &result.tables[0];
        assert_eq!(table.headers, vec!["unit", "tenant", "rent"]);
        assert_eq!(table.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_content_fails() {
        let parser = PlainTextParser::new();
        let err = parser.parse(b"   ", "text/plain").await.unwrap_err();
        assert_eq!(err.parser(), "plaintext");
    }
}
