//! Structure-aware HTTP parser adapter.
//!
//! First choice in the PDF chain: the engine returns key/value fields with
//! page geometry and reconstructed tables, not just text. Requires
//! LEASEFLOW_LAYOUT_API_KEY.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{PageText, ParseResult, ParserAdapter, ParserError, RawField, RawTable};
use crate::models::BoundingBox;

const DEFAULT_ENDPOINT: &str = "https://api.layoutparse.io/v1";

/// Adapter for a structure-aware document parsing service.
pub struct LayoutParser {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    mime_type: &'a str,
    /// Base64-encoded document bytes.
    content: String,
    features: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    text: Option<String>,
    pages: Option<Vec<WirePage>>,
    fields: Option<Vec<WireField>>,
    tables: Option<Vec<WireTable>>,
    confidence: Option<f64>,
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WirePage {
    number: u32,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireField {
    name: String,
    value: String,
    page: Option<u32>,
    bbox: Option<BoundingBox>,
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireTable {
    title: Option<String>,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

impl LayoutParser {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key: std::env::var("LEASEFLOW_LAYOUT_API_KEY").ok(),
        }
    }

    fn api_key(&self) -> Result<&str, ParserError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ParserError::Unavailable {
                parser: self.name().to_string(),
                hint: self.availability_hint(),
            })
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
impl ParserAdapter for LayoutParser {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn supports(&self, mime_type: &str) -> bool {
        matches!(
            mime_type,
            "application/pdf"
                | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                | "application/vnd.ms-excel"
        ) || mime_type.starts_with("image/")
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn availability_hint(&self) -> String {
        "set LEASEFLOW_LAYOUT_API_KEY".to_string()
    }

    async fn health_check(&self) -> Result<(), ParserError> {
        let key = self.api_key()?;
        let resp = self
            .client
            .get(format!("{}/health", self.endpoint))
            .bearer_auth(key)
            .send()
            .await
            .map_err(|e| self.http_error(e.status().map(|s| s.as_u16()), e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(self.http_error(Some(resp.status().as_u16()), "health check failed"))
        }
    }

    async fn parse(&self, content: &[u8], mime_type: &str) -> Result<ParseResult, ParserError> {
        if !self.supports(mime_type) {
            return Err(ParserError::UnsupportedMime {
                parser: self.name().to_string(),
                mime_type: mime_type.to_string(),
            });
        }
        let key = self.api_key()?;

        let request = AnalyzeRequest {
            mime_type,
            content: base64::engine::general_purpose::STANDARD.encode(content),
            features: &["fields", "tables", "pages"],
        };

        let resp = self
            .client
            .post(format!("{}/analyze", self.endpoint))
            .bearer_auth(key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.http_error(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(self.http_error(Some(status.as_u16()), body));
        }

        let body: AnalyzeResponse = resp
            .json()
            .await
            .map_err(|e| ParserError::Malformed {
                parser: self.name().to_string(),
                message: e.to_string(),
            })?;

        if let Some(err) = body.error {
            return Err(ParserError::Malformed {
                parser: self.name().to_string(),
                message: err.message,
            });
        }

        let pages: Vec<PageText> = body
            .pages
            .unwrap_or_default()
            .into_iter()
            .map(|p| PageText {
                page: p.number,
                text: p.text,
            })
            .collect();

        let text = match body.text {
            Some(t) if !t.is_empty() => t,
            _ => pages
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        };

        if text.is_empty() && body.fields.as_ref().map_or(true, |f| f.is_empty()) {
            return Err(ParserError::Malformed {
                parser: self.name().to_string(),
                message: "engine returned no content".to_string(),
            });
        }

        Ok(ParseResult {
            text,
            pages,
            tables: body
                .tables
                .unwrap_or_default()
                .into_iter()
                .map(|t| RawTable {
                    title: t.title,
                    headers: t.headers,
                    rows: t.rows,
                    page: t.page,
                })
                .collect(),
            fields: body
                .fields
                .unwrap_or_default()
                .into_iter()
                .map(|f| RawField {
                    name: f.name,
                    value: f.value,
                    page: f.page,
                    bbox: f.bbox,
                    confidence: f.confidence,
                })
                .collect(),
            confidence: body.confidence,
        })
    }
}
