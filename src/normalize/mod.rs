//! Field normalization: raw parser output to typed, scored field values.
//!
//! The normalizer is total: malformed input degrades to low-confidence text
//! or gets dropped, it never fails the pipeline. Confidence is always
//! capped below 1.0.

mod schema;
mod values;

pub use schema::{EnumValue, FieldDef, FieldSchema, FieldType};

use crate::models::{BoundingBox, DocType, FieldSource, FieldValue};
use crate::parsers::ParseResult;

/// No extraction is ever exactly certain.
pub const MAX_CONFIDENCE: f64 = 0.99;

/// Base confidence for engine-reported fields without their own score.
const PARSER_BASE_CONFIDENCE: f64 = 0.85;

/// Base confidence for fields recovered by label scanning.
const RULE_BASE_CONFIDENCE: f64 = 0.70;

/// Confidence assigned when a value resists typed parsing and is kept as
/// raw text for the reviewer.
const UNPARSED_CONFIDENCE: f64 = 0.30;

/// Overall confidence when nothing in the schema was found at all.
const NO_FIELDS_CONFIDENCE: f64 = 0.20;

/// A typed field candidate produced by normalization.
#[derive(Debug, Clone)]
pub struct NormalizedField {
    pub name: String,
    pub value: FieldValue,
    pub raw_text: String,
    pub confidence: f64,
    pub source: FieldSource,
    pub page: Option<u32>,
    pub bbox: Option<BoundingBox>,
    pub critical: bool,
}

/// The normalizer's verdict over one parse result.
#[derive(Debug, Clone)]
pub struct NormalizedExtraction {
    pub fields: Vec<NormalizedField>,
    pub overall_confidence: f64,
    pub doc_type: DocType,
}

/// Converts raw parser output into typed field values with confidences.
pub struct FieldNormalizer {
    schema: FieldSchema,
}

impl FieldNormalizer {
    pub fn new(schema: FieldSchema) -> Self {
        Self { schema }
    }

    /// Normalize one parse result. Missing fields are absent from the
    /// output, not placeholders.
    pub fn normalize(&self, parse: &ParseResult) -> NormalizedExtraction {
        let mut fields = Vec::new();

        for def in self.schema.defs() {
            if let Some(field) = self.extract_field(def, parse) {
                fields.push(field);
            }
        }

        let overall_confidence = aggregate_confidence(&fields);
        let doc_type = classify_doc_type(&parse.text);

        NormalizedExtraction {
            fields,
            overall_confidence,
            doc_type,
        }
    }

    /// Find a candidate for one field: engine-reported structure first,
    /// label scanning over the text second.
    fn extract_field(&self, def: &FieldDef, parse: &ParseResult) -> Option<NormalizedField> {
        if let Some(raw) = find_parser_field(def, parse) {
            let base = raw
                .confidence
                .or(parse.confidence)
                .unwrap_or(PARSER_BASE_CONFIDENCE);
            return Some(self.typed_field(
                def,
                &raw.value,
                base,
                FieldSource::Parser,
                raw.page,
                raw.bbox,
            ));
        }

        if let Some(raw_value) = scan_labeled_line(def, &parse.text) {
            let base = match parse.confidence {
                Some(engine) => RULE_BASE_CONFIDENCE.min(engine),
                None => RULE_BASE_CONFIDENCE,
            };
            return Some(self.typed_field(def, &raw_value, base, FieldSource::Rule, None, None));
        }

        None
    }

    /// Parse the raw value per the declared type. Values that resist
    /// parsing stay as raw text at a floor confidence for the reviewer.
    fn typed_field(
        &self,
        def: &FieldDef,
        raw: &str,
        base_confidence: f64,
        source: FieldSource,
        page: Option<u32>,
        bbox: Option<BoundingBox>,
    ) -> NormalizedField {
        let raw = raw.trim();
        let parsed = match &def.field_type {
            FieldType::Text => {
                if raw.is_empty() {
                    None
                } else {
                    Some(FieldValue::Text(raw.to_string()))
                }
            }
            FieldType::Number => values::parse_number(raw).map(FieldValue::Number),
            FieldType::Currency => values::parse_currency(raw).map(FieldValue::Currency),
            FieldType::Date => values::parse_date(raw).map(FieldValue::Date),
            FieldType::Boolean => values::parse_boolean(raw).map(FieldValue::Boolean),
            FieldType::Enum(variants) => {
                values::canonical_enum(raw, variants).map(FieldValue::Enum)
            }
        };

        let (value, confidence) = match parsed {
            Some(value) => (value, base_confidence.min(MAX_CONFIDENCE)),
            None => (
                FieldValue::Text(raw.to_string()),
                UNPARSED_CONFIDENCE.min(base_confidence),
            ),
        };

        NormalizedField {
            name: def.name.to_string(),
            value,
            raw_text: raw.to_string(),
            confidence,
            source,
            page,
            bbox,
            critical: def.critical,
        }
    }
}

/// Weighted mean of field confidences; critical fields count double.
fn aggregate_confidence(fields: &[NormalizedField]) -> f64 {
    if fields.is_empty() {
        return NO_FIELDS_CONFIDENCE;
    }
    let mut weighted = 0.0;
    let mut weights = 0.0;
    for field in fields {
        let weight = if field.critical { 2.0 } else { 1.0 };
        weighted += field.confidence * weight;
        weights += weight;
    }
    (weighted / weights).min(MAX_CONFIDENCE)
}

/// Keyword classification of the document. Amendment is checked before
/// lease since amendments mention the lease they amend.
fn classify_doc_type(text: &str) -> DocType {
    let haystack = text.to_lowercase();
    if haystack.contains("rent roll") {
        DocType::RentRoll
    } else if haystack.contains("estoppel") {
        DocType::Estoppel
    } else if haystack.contains("amendment") {
        DocType::Amendment
    } else if haystack.contains("lease") {
        DocType::Lease
    } else {
        DocType::Unknown
    }
}

/// Lowercase, strip punctuation, collapse whitespace.
fn normalize_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

fn matches_def(def: &FieldDef, key: &str) -> bool {
    let key = normalize_key(key);
    if key.is_empty() {
        return false;
    }
    if normalize_key(def.name) == key {
        return true;
    }
    def.aliases.iter().any(|a| normalize_key(a) == key)
}

fn find_parser_field<'a>(
    def: &FieldDef,
    parse: &'a ParseResult,
) -> Option<&'a crate::parsers::RawField> {
    parse.fields.iter().find(|f| matches_def(def, &f.name))
}

/// Scan text lines for `Label: value` pairs matching the field's aliases.
fn scan_labeled_line(def: &FieldDef, text: &str) -> Option<String> {
    for line in text.lines() {
        let Some((label, rest)) = line.split_once(':') else {
            continue;
        };
        if matches_def(def, label) {
            let value = rest.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::{ParseResult, RawField};

    fn parse_with_text(text: &str) -> ParseResult {
        ParseResult {
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalizes_labeled_lines() {
        let normalizer = FieldNormalizer::new(FieldSchema::lease());
        let parse = parse_with_text(
            "COMMERCIAL LEASE AGREEMENT\n\
             Tenant: Acme Corp\n\
             Base Rent: $2,500.00\n\
             Commencement Date: January 5, 2024\n",
        );
        let result = normalizer.normalize(&parse);

        let rent = result.fields.iter().find(|f| f.name == "base_rent").unwrap();
        assert_eq!(rent.value, FieldValue::Currency(2500.0));
        assert_eq!(rent.source, FieldSource::Rule);
        assert!(rent.critical);

        let start = result
            .fields
            .iter()
            .find(|f| f.name == "lease_start")
            .unwrap();
        assert!(matches!(start.value, FieldValue::Date(_)));
        assert_eq!(result.doc_type, DocType::Lease);
    }

    #[test]
    fn test_parser_fields_win_over_text_scan() {
        let normalizer = FieldNormalizer::new(FieldSchema::lease());
        let parse = ParseResult {
            text: "Base Rent: $1.00\n".to_string(),
            fields: vec![RawField {
                name: "Base Rent".to_string(),
                value: "$2,500.00".to_string(),
                page: Some(1),
                bbox: None,
                confidence: Some(0.92),
            }],
            ..Default::default()
        };
        let result = normalizer.normalize(&parse);
        let rent = result.fields.iter().find(|f| f.name == "base_rent").unwrap();
        assert_eq!(rent.value, FieldValue::Currency(2500.0));
        assert_eq!(rent.source, FieldSource::Parser);
        assert_eq!(rent.confidence, 0.92);
        assert_eq!(rent.page, Some(1));
    }

    #[test]
    fn test_unparseable_value_kept_as_low_confidence_text() {
        let normalizer = FieldNormalizer::new(FieldSchema::lease());
        let parse = parse_with_text("Commencement Date: upon substantial completion\n");
        let result = normalizer.normalize(&parse);
        let start = result
            .fields
            .iter()
            .find(|f| f.name == "lease_start")
            .unwrap();
        assert!(matches!(start.value, FieldValue::Text(_)));
        assert!(start.confidence <= 0.30);
    }

    #[test]
    fn test_missing_fields_are_absent() {
        let normalizer = FieldNormalizer::new(FieldSchema::lease());
        let parse = parse_with_text("Tenant: Acme Corp\n");
        let result = normalizer.normalize(&parse);
        assert!(result.fields.iter().all(|f| f.name != "security_deposit"));
    }

    #[test]
    fn test_confidence_capped_below_one() {
        let normalizer = FieldNormalizer::new(FieldSchema::lease());
        let parse = ParseResult {
            fields: vec![RawField {
                name: "tenant".to_string(),
                value: "Acme Corp".to_string(),
                page: None,
                bbox: None,
                confidence: Some(1.0),
            }],
            ..Default::default()
        };
        let result = normalizer.normalize(&parse);
        assert!(result.fields[0].confidence <= MAX_CONFIDENCE);
        assert!(result.overall_confidence <= MAX_CONFIDENCE);
    }

    #[test]
    fn test_aggregate_weighs_critical_fields() {
        let low_critical = NormalizedField {
            name: "base_rent".into(),
            value: FieldValue::Currency(1.0),
            raw_text: String::new(),
            confidence: 0.4,
            source: FieldSource::Parser,
            page: None,
            bbox: None,
            critical: true,
        };
        let high_plain = NormalizedField {
            name: "landlord_name".into(),
            value: FieldValue::Text("x".into()),
            raw_text: String::new(),
            confidence: 1.0,
            source: FieldSource::Parser,
            page: None,
            bbox: None,
            critical: false,
        };
        // (0.4 * 2 + 1.0) / 3 = 0.6
        let overall = aggregate_confidence(&[low_critical, high_plain]);
        assert!((overall - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_no_fields_low_overall() {
        let normalizer = FieldNormalizer::new(FieldSchema::lease());
        let result = normalizer.normalize(&parse_with_text("nothing relevant"));
        assert!(result.fields.is_empty());
        assert_eq!(result.overall_confidence, NO_FIELDS_CONFIDENCE);
    }

    #[test]
    fn test_doc_type_classification() {
        assert_eq!(classify_doc_type("FIRST AMENDMENT TO LEASE"), DocType::Amendment);
        assert_eq!(classify_doc_type("Rent Roll as of June"), DocType::RentRoll);
        assert_eq!(classify_doc_type("Tenant Estoppel Certificate"), DocType::Estoppel);
        assert_eq!(classify_doc_type("Office Lease Agreement"), DocType::Lease);
        assert_eq!(classify_doc_type("grocery list"), DocType::Unknown);
    }
}
