//! Extraction models: versioned parse results over a document.
//!
//! Each orchestration run produces one immutable `Extraction` row. Versions
//! are monotonic per document and exactly one row per document carries
//! `is_current` at any time; superseding happens atomically in the
//! repository layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of one extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Processing,
    Completed,
    Failed,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Coarse classification of the document produced during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Lease,
    Amendment,
    RentRoll,
    Estoppel,
    Unknown,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lease => "lease",
            Self::Amendment => "amendment",
            Self::RentRoll => "rent_roll",
            Self::Estoppel => "estoppel",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "lease" => Some(Self::Lease),
            "amendment" => Some(Self::Amendment),
            "rent_roll" => Some(Self::RentRoll),
            "estoppel" => Some(Self::Estoppel),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// One parsing attempt over a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub id: String,
    pub tenant_id: String,
    pub document_id: String,
    /// Monotonic per document, starting at 1.
    pub version: i64,
    pub status: ExtractionStatus,
    /// Aggregate confidence in 0..1, set when the run completes.
    pub overall_confidence: Option<f64>,
    pub doc_type: DocType,
    /// Name of the adapter that produced the accepted result.
    pub parser_used: Option<String>,
    /// Exactly one extraction per document is current.
    pub is_current: bool,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Where a field value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Parser,
    Llm,
    Rule,
}

impl FieldSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parser => "parser",
            Self::Llm => "llm",
            Self::Rule => "rule",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "parser" => Some(Self::Parser),
            "llm" => Some(Self::Llm),
            "rule" => Some(Self::Rule),
            _ => None,
        }
    }
}

/// A normalized, typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    /// Monetary amount as a plain decimal, currency symbols stripped.
    Currency(f64),
    Date(NaiveDate),
    Boolean(bool),
    /// Canonical token from a closed vocabulary.
    Enum(String),
}

impl FieldValue {
    /// Short type tag, used in logs and the CLI.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Currency(_) => "currency",
            Self::Date(_) => "date",
            Self::Boolean(_) => "boolean",
            Self::Enum(_) => "enum",
        }
    }
}

/// Bounding box in page coordinates: `[x0, y0, x1, y1]`.
pub type BoundingBox = [f64; 4];

/// One key/value fact extracted from a document.
///
/// Mutable only through an explicit human override; the parser-derived
/// value and confidence are retained alongside the override for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionField {
    pub id: i64,
    pub extraction_id: String,
    pub name: String,
    pub value: FieldValue,
    /// Redacted snippet of the source text the value was read from.
    pub raw_text: Option<String>,
    pub confidence: f64,
    pub source: FieldSource,
    pub page: Option<u32>,
    pub bbox: Option<BoundingBox>,
    pub is_override: bool,
    pub override_value: Option<FieldValue>,
    pub overridden_by: Option<String>,
    pub overridden_at: Option<DateTime<Utc>>,
}

impl ExtractionField {
    /// The value a consumer should read: the override when present,
    /// otherwise the parser-derived value.
    pub fn effective_value(&self) -> &FieldValue {
        self.override_value.as_ref().unwrap_or(&self.value)
    }
}

/// A tabular extraction result. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionTable {
    pub id: i64,
    pub extraction_id: String,
    pub title: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_json_round_trip() {
        let value = FieldValue::Currency(2500.0);
        let json = serde_json::to_string(&value).unwrap();
        let back: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);

        let date = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        let json = serde_json::to_string(&date).unwrap();
        assert_eq!(serde_json::from_str::<FieldValue>(&json).unwrap(), date);
    }

    #[test]
    fn test_effective_value_prefers_override() {
        let field = ExtractionField {
            id: 1,
            extraction_id: "x".into(),
            name: "base_rent".into(),
            value: FieldValue::Currency(2500.0),
            raw_text: None,
            confidence: 0.9,
            source: FieldSource::Parser,
            page: None,
            bbox: None,
            is_override: true,
            override_value: Some(FieldValue::Currency(2600.0)),
            overridden_by: Some("reviewer".into()),
            overridden_at: Some(Utc::now()),
        };
        assert_eq!(field.effective_value(), &FieldValue::Currency(2600.0));
    }
}
