//! Typed value parsing for raw field text.
//!
//! Every function is total over arbitrary input: failure means `None`,
//! never a panic or an error, so malformed parser output degrades instead
//! of breaking the pipeline.

use chrono::NaiveDate;

use super::schema::EnumValue;

/// Date formats seen in lease documents, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
];

/// Parse a monetary amount: strips currency symbols and grouping,
/// treats parentheses as negative.
pub fn parse_currency(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let negative = trimmed.starts_with('(') && trimmed.ends_with(')');
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Parse a plain number, tolerating grouping separators and a unit suffix
/// ("12,500 SF" -> 12500).
pub fn parse_number(raw: &str) -> Option<f64> {
    let token = raw.trim().split_whitespace().next()?;
    let cleaned: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse().ok()
}

/// Parse a calendar date from the formats leases actually use.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    None
}

/// Parse a yes/no style boolean.
pub fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "yes" | "y" | "true" | "1" | "included" => Some(true),
        "no" | "n" | "false" | "0" | "none" | "not included" => Some(false),
        _ => None,
    }
}

/// Resolve a raw spelling to its canonical enum token via the alias table.
pub fn canonical_enum(raw: &str, values: &[EnumValue]) -> Option<String> {
    let needle = raw.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    for value in values {
        if value.canonical == needle || value.aliases.iter().any(|a| *a == needle) {
            return Some(value.canonical.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("$2,500.00"), Some(2500.0));
        assert_eq!(parse_currency("  1200 "), Some(1200.0));
        assert_eq!(parse_currency("($300.50)"), Some(-300.5));
        assert_eq!(parse_currency("USD"), None);
        assert_eq!(parse_currency(""), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12,500 SF"), Some(12500.0));
        assert_eq!(parse_number("3.5"), Some(3.5));
        assert_eq!(parse_number("approximately"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(parse_date("2024-01-05"), Some(expected));
        assert_eq!(parse_date("01/05/2024"), Some(expected));
        assert_eq!(parse_date("January 5, 2024"), Some(expected));
        assert_eq!(parse_date("Jan 5, 2024"), Some(expected));
        assert_eq!(parse_date("5 January 2024"), Some(expected));
        assert_eq!(parse_date("sometime in 2024"), None);
    }

    #[test]
    fn test_parse_boolean() {
        assert_eq!(parse_boolean("Yes"), Some(true));
        assert_eq!(parse_boolean("no"), Some(false));
        assert_eq!(parse_boolean("maybe"), None);
    }

    #[test]
    fn test_canonical_enum() {
        let values = &[EnumValue {
            canonical: "nnn",
            aliases: &["triple net", "nnn"],
        }];
        assert_eq!(canonical_enum("Triple Net", values), Some("nnn".into()));
        assert_eq!(canonical_enum("nnn", values), Some("nnn".into()));
        assert_eq!(canonical_enum("gross", values), None);
    }
}
