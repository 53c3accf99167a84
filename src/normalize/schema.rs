//! Field schema: the set of facts the pipeline tries to extract.

/// One canonical value in a closed vocabulary, with the spellings that
/// resolve to it.
#[derive(Debug, Clone)]
pub struct EnumValue {
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
}

/// Expected type of a field value.
#[derive(Debug, Clone)]
pub enum FieldType {
    Text,
    Number,
    Currency,
    Date,
    Boolean,
    Enum(&'static [EnumValue]),
}

/// Definition of one expected field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Canonical snake_case name persisted on extraction fields.
    pub name: &'static str,
    pub field_type: FieldType,
    /// Labels the field appears under in documents and parser output.
    pub aliases: &'static [&'static str],
    /// Critical fields carry extra weight in confidence aggregation and
    /// review priority.
    pub critical: bool,
}

/// The schema of expected fields for a document family.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    defs: Vec<FieldDef>,
}

const LEASE_TYPES: &[EnumValue] = &[
    EnumValue {
        canonical: "nnn",
        aliases: &["nnn", "triple net", "triple-net", "net net net"],
    },
    EnumValue {
        canonical: "gross",
        aliases: &["gross", "full service", "full-service gross", "fsg"],
    },
    EnumValue {
        canonical: "modified_gross",
        aliases: &["modified gross", "modified-gross", "mg"],
    },
];

impl FieldSchema {
    pub fn new(defs: Vec<FieldDef>) -> Self {
        Self { defs }
    }

    /// Default schema for commercial leases.
    pub fn lease() -> Self {
        Self::new(vec![
            FieldDef {
                name: "tenant_name",
                field_type: FieldType::Text,
                aliases: &["tenant", "tenant name", "lessee"],
                critical: true,
            },
            FieldDef {
                name: "landlord_name",
                field_type: FieldType::Text,
                aliases: &["landlord", "landlord name", "lessor"],
                critical: false,
            },
            FieldDef {
                name: "base_rent",
                field_type: FieldType::Currency,
                aliases: &["base rent", "monthly rent", "monthly base rent", "rent"],
                critical: true,
            },
            FieldDef {
                name: "lease_start",
                field_type: FieldType::Date,
                aliases: &[
                    "commencement date",
                    "lease start",
                    "start date",
                    "lease commencement",
                ],
                critical: true,
            },
            FieldDef {
                name: "lease_end",
                field_type: FieldType::Date,
                aliases: &[
                    "expiration date",
                    "lease end",
                    "end date",
                    "termination date",
                    "lease expiration",
                ],
                critical: true,
            },
            FieldDef {
                name: "square_feet",
                field_type: FieldType::Number,
                aliases: &["square feet", "rentable area", "sq ft", "rsf", "square footage"],
                critical: true,
            },
            FieldDef {
                name: "security_deposit",
                field_type: FieldType::Currency,
                aliases: &["security deposit", "deposit"],
                critical: false,
            },
            FieldDef {
                name: "lease_type",
                field_type: FieldType::Enum(LEASE_TYPES),
                aliases: &["lease type", "lease structure"],
                critical: false,
            },
            FieldDef {
                name: "renewal_option",
                field_type: FieldType::Boolean,
                aliases: &["renewal option", "option to renew", "option to extend"],
                critical: false,
            },
            FieldDef {
                name: "escalation_rate",
                field_type: FieldType::Number,
                aliases: &["escalation rate", "annual escalation", "annual increase"],
                critical: false,
            },
        ])
    }

    /// Replace the critical-field set, e.g. from `[review] critical_fields`.
    /// Names not in the schema are ignored.
    pub fn with_critical_fields(mut self, names: &[String]) -> Self {
        if names.is_empty() {
            return self;
        }
        for def in &mut self.defs {
            def.critical = names.iter().any(|n| n == def.name);
        }
        self
    }

    pub fn defs(&self) -> &[FieldDef] {
        &self.defs
    }

    /// Names of critical fields.
    pub fn critical_names(&self) -> Vec<&'static str> {
        self.defs
            .iter()
            .filter(|d| d.critical)
            .map(|d| d.name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_schema_criticals() {
        let schema = FieldSchema::lease();
        let criticals = schema.critical_names();
        assert!(criticals.contains(&"base_rent"));
        assert!(criticals.contains(&"lease_start"));
        assert!(!criticals.contains(&"security_deposit"));
    }

    #[test]
    fn test_critical_override() {
        let schema =
            FieldSchema::lease().with_critical_fields(&["security_deposit".to_string()]);
        let criticals = schema.critical_names();
        assert_eq!(criticals, vec!["security_deposit"]);
    }
}
