//! Test-suite schema entity and the YAML document format it is loaded from.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    is_known_sample_type, is_reserved_column, DEFAULT_METRIC_TYPE, IDENTIFIER_PATTERN,
    MACHINE_RESERVED_COLUMNS, ORDER_RESERVED_COLUMNS, RUN_RESERVED_COLUMNS,
    SAMPLE_RESERVED_COLUMNS, SAMPLE_TYPE_HASH, SAMPLE_TYPE_REAL, SAMPLE_TYPE_STATUS,
    SCHEMA_FORMAT_VERSION,
};
use crate::error::{DomainError, DomainResult};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(IDENTIFIER_PATTERN).expect("identifier pattern is valid"));

/// Sample (metric) value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleType {
    Real,
    Status,
    Hash,
}

impl SampleType {
    /// Name as stored in the `sample_types` table and schema documents
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleType::Real => SAMPLE_TYPE_REAL,
            SampleType::Status => SAMPLE_TYPE_STATUS,
            SampleType::Hash => SAMPLE_TYPE_HASH,
        }
    }
}

impl std::str::FromStr for SampleType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            SAMPLE_TYPE_REAL => Ok(SampleType::Real),
            SAMPLE_TYPE_STATUS => Ok(SampleType::Status),
            SAMPLE_TYPE_HASH => Ok(SampleType::Hash),
            other => Err(DomainError::invalid_schema(format!(
                "Unknown metric type '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SampleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine-level attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineField {
    pub name: String,
    pub info_key: Option<String>,
}

/// Run field that participates in ordering runs (e.g. a revision)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderField {
    pub name: String,
    pub info_key: Option<String>,
    pub ordinal: i32,
}

/// Run-level attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunField {
    pub name: String,
    pub info_key: Option<String>,
}

/// Per-test metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleField {
    pub name: String,
    pub sample_type: SampleType,
    pub info_key: Option<String>,
    /// Name of the Status metric that qualifies this one
    pub status_field: Option<String>,
    pub bigger_is_better: bool,
    pub display_name: Option<String>,
    pub unit: Option<String>,
    pub unit_abbrev: Option<String>,
}

/// Test-suite schema: the fields recorded for machines, orders, runs and samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub name: String,
    /// Prefix of the suite's table names
    pub db_key_name: String,
    pub version: String,
    pub machine_fields: Vec<MachineField>,
    pub order_fields: Vec<OrderField>,
    pub run_fields: Vec<RunField>,
    pub sample_fields: Vec<SampleField>,
    /// Document the suite was parsed from (None when recovered from database rows)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonschema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    format_version: Option<Value>,
    name: Option<String>,
    metrics: Option<Vec<MetricDocument>>,
    #[serde(default)]
    run_fields: Vec<RunFieldDocument>,
    #[serde(default)]
    machine_fields: Vec<FieldDocument>,
}

#[derive(Debug, Deserialize)]
struct MetricDocument {
    name: String,
    #[serde(rename = "type")]
    metric_type: Option<String>,
    display_name: Option<String>,
    unit: Option<String>,
    unit_abbrev: Option<String>,
    #[serde(default)]
    bigger_is_better: bool,
    status_field: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunFieldDocument {
    name: String,
    #[serde(default)]
    order: bool,
}

#[derive(Debug, Deserialize)]
struct FieldDocument {
    name: String,
}

impl TestSuite {
    /// Create an empty suite whose tables are keyed by its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            db_key_name: name.clone(),
            name,
            version: SCHEMA_FORMAT_VERSION.to_string(),
            machine_fields: Vec::new(),
            order_fields: Vec::new(),
            run_fields: Vec::new(),
            sample_fields: Vec::new(),
            jsonschema: None,
        }
    }

    /// Parse a YAML schema document.
    pub fn from_yaml_str(text: &str) -> DomainResult<Self> {
        let value: Value = serde_yaml::from_str(text)
            .map_err(|e| DomainError::invalid_schema(format!("Malformed YAML: {}", e)))?;
        Self::from_json(value)
    }

    /// Build a suite from a decoded schema document, validating every rule.
    pub fn from_json(value: Value) -> DomainResult<Self> {
        if !value.is_object() {
            return Err(DomainError::invalid_schema(
                "Schema document must be a mapping",
            ));
        }

        let doc: SchemaDocument = serde_json::from_value(value.clone())
            .map_err(|e| DomainError::invalid_schema(e.to_string()))?;

        let version_ok = match &doc.format_version {
            Some(Value::String(s)) => s == SCHEMA_FORMAT_VERSION,
            Some(Value::Number(n)) => n.to_string() == SCHEMA_FORMAT_VERSION,
            _ => false,
        };
        if !version_ok {
            return Err(DomainError::invalid_schema(format!(
                "Expected \"format_version\": \"{}\"",
                SCHEMA_FORMAT_VERSION
            )));
        }

        let name = doc
            .name
            .ok_or_else(|| DomainError::invalid_schema("Missing test-suite \"name\""))?;
        validate_identifier("test-suite", &name)?;

        let mut suite = TestSuite::new(name);

        for field in doc.machine_fields {
            validate_field_name(&suite.machine_fields_names(), MACHINE_RESERVED_COLUMNS, "machine", &field.name)?;
            suite.machine_fields.push(MachineField {
                name: field.name,
                info_key: None,
            });
        }

        for field in doc.run_fields {
            let taken = suite.run_and_order_names();
            if field.order {
                validate_field_name(&taken, ORDER_RESERVED_COLUMNS, "order", &field.name)?;
                let ordinal = suite.order_fields.len() as i32;
                suite.order_fields.push(OrderField {
                    name: field.name,
                    info_key: None,
                    ordinal,
                });
            } else {
                validate_field_name(&taken, RUN_RESERVED_COLUMNS, "run", &field.name)?;
                suite.run_fields.push(RunField {
                    name: field.name,
                    info_key: None,
                });
            }
        }
        if suite.order_fields.is_empty() {
            return Err(DomainError::invalid_schema(format!(
                "Test-suite '{}' declares no order field (a run field with \"order: true\")",
                suite.name
            )));
        }

        let metrics = doc
            .metrics
            .ok_or_else(|| DomainError::invalid_schema("Missing \"metrics\" list"))?;
        for metric in metrics {
            let taken: Vec<&str> = suite.sample_fields.iter().map(|f| f.name.as_str()).collect();
            validate_field_name(&taken, SAMPLE_RESERVED_COLUMNS, "metric", &metric.name)?;

            let type_name = metric.metric_type.as_deref().unwrap_or(DEFAULT_METRIC_TYPE);
            if !is_known_sample_type(type_name) {
                return Err(DomainError::invalid_schema(format!(
                    "Unknown metric type '{}'",
                    type_name
                )));
            }
            suite.sample_fields.push(SampleField {
                name: metric.name,
                sample_type: type_name.parse()?,
                info_key: None,
                status_field: metric.status_field,
                bigger_is_better: metric.bigger_is_better,
                display_name: metric.display_name,
                unit: metric.unit,
                unit_abbrev: metric.unit_abbrev,
            });
        }
        suite.validate_status_links()?;

        suite.jsonschema = Some(value);
        Ok(suite)
    }

    /// Schema document as canonical JSON text (keys sorted).
    pub fn canonical_schema(&self) -> Option<String> {
        self.jsonschema.as_ref().map(Value::to_string)
    }

    /// Total number of fields across all kinds
    pub fn field_count(&self) -> usize {
        self.machine_fields.len()
            + self.order_fields.len()
            + self.run_fields.len()
            + self.sample_fields.len()
    }

    /// Look up a metric by name
    pub fn find_sample_field(&self, name: &str) -> Option<&SampleField> {
        self.sample_fields.iter().find(|f| f.name == name)
    }

    fn machine_fields_names(&self) -> Vec<&str> {
        self.machine_fields.iter().map(|f| f.name.as_str()).collect()
    }

    fn run_and_order_names(&self) -> Vec<&str> {
        self.order_fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.run_fields.iter().map(|f| f.name.as_str()))
            .collect()
    }

    fn validate_status_links(&self) -> DomainResult<()> {
        for field in &self.sample_fields {
            let Some(status) = &field.status_field else {
                continue;
            };
            match self.find_sample_field(status) {
                Some(target) if target.sample_type == SampleType::Status => {}
                Some(_) => {
                    return Err(DomainError::invalid_schema(format!(
                        "Metric '{}' uses '{}' as status field, but it is not a Status metric",
                        field.name, status
                    )))
                }
                None => {
                    return Err(DomainError::invalid_schema(format!(
                        "Metric '{}' references unknown status field '{}'",
                        field.name, status
                    )))
                }
            }
        }
        Ok(())
    }
}

fn validate_identifier(kind: &str, name: &str) -> DomainResult<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(DomainError::invalid_schema(format!(
            "Invalid {} name '{}'",
            kind, name
        )))
    }
}

fn validate_field_name(
    taken: &[&str],
    reserved: &[&str],
    kind: &str,
    name: &str,
) -> DomainResult<()> {
    validate_identifier(kind, name)?;
    // Column names are case-insensitive in SQLite
    if taken.iter().any(|t| t.eq_ignore_ascii_case(name)) {
        return Err(DomainError::invalid_schema(format!(
            "Duplicate {} field '{}'",
            kind, name
        )));
    }
    if is_reserved_column(reserved, name) {
        return Err(DomainError::invalid_schema(format!(
            "The {} field name '{}' is reserved",
            kind, name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NTS: &str = r#"
format_version: '2'
name: nts
metrics:
  - name: compile_time
    type: Real
    display_name: Compile Time
    unit: seconds
    unit_abbrev: s
  - name: compile_status
    type: Status
  - name: score
    bigger_is_better: true
  - name: hash
    type: Hash
run_fields:
  - name: llvm_project_revision
    order: true
  - name: build_mode
machine_fields:
  - name: hardware
  - name: os
"#;

    #[test]
    fn test_parse_full_document() {
        let suite = TestSuite::from_yaml_str(NTS).unwrap();

        assert_eq!(suite.name, "nts");
        assert_eq!(suite.db_key_name, "nts");
        assert_eq!(suite.machine_fields.len(), 2);
        assert_eq!(suite.order_fields.len(), 1);
        assert_eq!(suite.order_fields[0].name, "llvm_project_revision");
        assert_eq!(suite.run_fields.len(), 1);
        assert_eq!(suite.sample_fields.len(), 4);
        assert_eq!(suite.field_count(), 8);
        assert!(suite.jsonschema.is_some());
    }

    #[test]
    fn test_metric_defaults() {
        let suite = TestSuite::from_yaml_str(NTS).unwrap();

        let score = suite.find_sample_field("score").unwrap();
        assert_eq!(score.sample_type, SampleType::Real);
        assert!(score.bigger_is_better);

        let time = suite.find_sample_field("compile_time").unwrap();
        assert!(!time.bigger_is_better);
        assert_eq!(time.unit_abbrev.as_deref(), Some("s"));
        assert_eq!(
            suite.find_sample_field("hash").unwrap().sample_type,
            SampleType::Hash
        );
    }

    #[test]
    fn test_integer_format_version_accepted() {
        let doc = "format_version: 2\nname: x\nmetrics: []\nrun_fields:\n  - name: rev\n    order: true\n";
        assert!(TestSuite::from_yaml_str(doc).is_ok());
    }

    #[test]
    fn test_wrong_format_version() {
        let doc = "format_version: '1'\nname: x\nmetrics: []\nrun_fields:\n  - name: rev\n    order: true\n";
        let err = TestSuite::from_yaml_str(doc).unwrap_err();
        assert!(matches!(err, DomainError::InvalidSchema(_)));
    }

    #[test]
    fn test_missing_order_field() {
        let doc = "format_version: '2'\nname: x\nmetrics: []\nrun_fields:\n  - name: rev\n";
        assert!(TestSuite::from_yaml_str(doc).is_err());
    }

    #[test]
    fn test_missing_metrics() {
        let doc = "format_version: '2'\nname: x\nrun_fields:\n  - name: rev\n    order: true\n";
        assert!(TestSuite::from_yaml_str(doc).is_err());
    }

    #[test]
    fn test_unknown_metric_type() {
        let doc = "format_version: '2'\nname: x\nmetrics:\n  - name: m\n    type: Complex\nrun_fields:\n  - name: rev\n    order: true\n";
        let err = TestSuite::from_yaml_str(doc).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidSchema("Unknown metric type 'Complex'".to_string())
        );
    }

    #[test]
    fn test_invalid_suite_name() {
        let doc = "format_version: '2'\nname: 'bad name;'\nmetrics: []\nrun_fields:\n  - name: rev\n    order: true\n";
        assert!(TestSuite::from_yaml_str(doc).is_err());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let doc = "format_version: '2'\nname: x\nmetrics: []\nrun_fields:\n  - name: rev\n    order: true\n  - name: rev\n";
        let err = TestSuite::from_yaml_str(doc).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_duplicate_differing_in_case_rejected() {
        let doc = "format_version: '2'\nname: x\nmetrics:\n  - name: Time\n  - name: time\nrun_fields:\n  - name: rev\n    order: true\n";
        let err = TestSuite::from_yaml_str(doc).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidSchema("Duplicate metric field 'time'".to_string())
        );

        let doc = "format_version: '2'\nname: x\nmetrics: []\nrun_fields:\n  - name: Rev\n    order: true\n  - name: REV\n";
        assert!(TestSuite::from_yaml_str(doc).is_err());
    }

    #[test]
    fn test_order_ordinals_follow_declaration() {
        let doc = "format_version: '2'\nname: x\nmetrics: []\nrun_fields:\n  - name: major\n    order: true\n  - name: mode\n  - name: minor\n    order: true\n  - name: patch\n    order: true\n";
        let suite = TestSuite::from_yaml_str(doc).unwrap();

        let order: Vec<(&str, i32)> = suite
            .order_fields
            .iter()
            .map(|f| (f.name.as_str(), f.ordinal))
            .collect();
        assert_eq!(order, vec![("major", 0), ("minor", 1), ("patch", 2)]);
        assert_eq!(suite.run_fields[0].name, "mode");
    }

    #[test]
    fn test_reserved_column_rejected() {
        let doc = "format_version: '2'\nname: x\nmetrics:\n  - name: RUN_ID\nrun_fields:\n  - name: rev\n    order: true\n";
        let err = TestSuite::from_yaml_str(doc).unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_status_link_must_be_status_metric() {
        let doc = "format_version: '2'\nname: x\nmetrics:\n  - name: t\n    status_field: u\n  - name: u\nrun_fields:\n  - name: rev\n    order: true\n";
        assert!(TestSuite::from_yaml_str(doc).is_err());

        let doc = "format_version: '2'\nname: x\nmetrics:\n  - name: t\n    status_field: u\n  - name: u\n    type: Status\nrun_fields:\n  - name: rev\n    order: true\n";
        let suite = TestSuite::from_yaml_str(doc).unwrap();
        assert_eq!(suite.sample_fields[0].status_field.as_deref(), Some("u"));
    }

    #[test]
    fn test_status_link_to_unknown_metric() {
        let doc = "format_version: '2'\nname: x\nmetrics:\n  - name: t\n    status_field: missing\nrun_fields:\n  - name: rev\n    order: true\n";
        let err = TestSuite::from_yaml_str(doc).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidSchema(
                "Metric 't' references unknown status field 'missing'".to_string()
            )
        );
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(TestSuite::from_yaml_str("name: [unclosed").is_err());
        assert!(TestSuite::from_yaml_str("- just\n- a list\n").is_err());
    }

    #[test]
    fn test_canonical_schema_is_key_order_independent() {
        let a = TestSuite::from_yaml_str(NTS).unwrap();
        let reordered = "name: x\nrun_fields:\n  - order: true\n    name: rev\nmetrics: []\nformat_version: '2'\n";
        let plain = "format_version: '2'\nname: x\nmetrics: []\nrun_fields:\n  - name: rev\n    order: true\n";
        let b = TestSuite::from_yaml_str(reordered).unwrap();
        let c = TestSuite::from_yaml_str(plain).unwrap();

        assert_eq!(b.canonical_schema(), c.canonical_schema());
        assert_ne!(a.canonical_schema(), c.canonical_schema());
    }
}
