//! General-purpose HTTP document parser adapter.
//!
//! Middle of the chain: broad format coverage, text and page splits but no
//! field structure. Requires LEASEFLOW_DOCPARSE_API_KEY.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{PageText, ParseResult, ParserAdapter, ParserError};

const DEFAULT_ENDPOINT: &str = "https://api.docparse.dev/v2";

/// Adapter for a general-purpose document parsing service.
pub struct DocParser {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    filetype: &'a str,
    /// Base64-encoded document bytes.
    data: String,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    content: String,
    page_texts: Option<Vec<String>>,
    quality: Option<f64>,
}

impl DocParser {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key: std::env::var("LEASEFLOW_DOCPARSE_API_KEY").ok(),
        }
    }

    fn http_error(&self, status: Option<u16>, message: impl Into<String>) -> ParserError {
        ParserError::Http {
            parser: self.name().to_string(),
            status,
            message: message.into(),
        }
    }
}

#[async_trait]
impl ParserAdapter for DocParser {
    fn name(&self) -> &'static str {
        "docparse"
    }

    fn supports(&self, mime_type: &str) -> bool {
        mime_type == "application/pdf"
            || mime_type.starts_with("image/")
            || mime_type.starts_with("text/")
            || mime_type.contains("spreadsheet")
            || mime_type.contains("excel")
            || mime_type.contains("word")
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn availability_hint(&self) -> String {
        "set LEASEFLOW_DOCPARSE_API_KEY".to_string()
    }

    async fn health_check(&self) -> Result<(), ParserError> {
        let key = self.api_key.as_deref().ok_or_else(|| ParserError::Unavailable {
            parser: self.name().to_string(),
            hint: self.availability_hint(),
        })?;
        let resp = self
            .client
            .get(format!("{}/status", self.endpoint))
            .header("x-api-key", key)
            .send()
            .await
            .map_err(|e| self.http_error(e.status().map(|s| s.as_u16()), e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(self.http_error(Some(resp.status().as_u16()), "status probe failed"))
        }
    }

    async fn parse(&self, content: &[u8], mime_type: &str) -> Result<ParseResult, ParserError> {
        if !self.supports(mime_type) {
            return Err(ParserError::UnsupportedMime {
                parser: self.name().to_string(),
                mime_type: mime_type.to_string(),
            });
        }
        let key = self.api_key.as_deref().ok_or_else(|| ParserError::Unavailable {
            parser: self.name().to_string(),
            hint: self.availability_hint(),
        })?;

        let request = ExtractRequest {
            filetype: mime_type,
            data: base64::engine::general_purpose::STANDARD.encode(content),
        };

        let resp = self
            .client
            .post(format!("{}/extract", self.endpoint))
            .header("x-api-key", key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.http_error(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(self.http_error(Some(status.as_u16()), body));
        }

        let body: ExtractResponse = resp.json().await.map_err(|e| ParserError::Malformed {
            parser: self.name().to_string(),
            message: e.to_string(),
        })?;

        if body.content.trim().is_empty() {
            return Err(ParserError::Malformed {
                parser: self.name().to_string(),
                message: "engine returned empty content".to_string(),
            });
        }

        let pages = body
            .page_texts
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText {
                page: i as u32 + 1,
                text,
            })
            .collect();

        Ok(ParseResult {
            text: body.content,
            pages,
            tables: Vec::new(),
            fields: Vec::new(),
            confidence: body.quality,
        })
    }
}
