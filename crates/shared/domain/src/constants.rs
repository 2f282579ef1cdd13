//! Domain-level constants.
//!
//! These constants define the schema document format and naming rules.

// =============================================================================
// Schema documents
// =============================================================================

/// The only schema document format version accepted
pub const SCHEMA_FORMAT_VERSION: &str = "2";

/// File extension of schema documents inside the schemas directory
pub const SCHEMA_FILE_EXTENSION: &str = "yaml";

/// Metric type used when a metric omits `type`
pub const DEFAULT_METRIC_TYPE: &str = SAMPLE_TYPE_REAL;

/// Pattern every suite and field name must match
pub const IDENTIFIER_PATTERN: &str = "^[A-Za-z_][A-Za-z0-9_]*$";

// =============================================================================
// Sample types
// =============================================================================

/// Floating point measurement
pub const SAMPLE_TYPE_REAL: &str = "Real";

/// Test status code (pass, fail, ...)
pub const SAMPLE_TYPE_STATUS: &str = "Status";

/// Opaque hash string (binary hashes and similar)
pub const SAMPLE_TYPE_HASH: &str = "Hash";

/// All known sample type names
pub const KNOWN_SAMPLE_TYPES: &[&str] = &[SAMPLE_TYPE_REAL, SAMPLE_TYPE_STATUS, SAMPLE_TYPE_HASH];

/// Check if a metric type name is known
pub fn is_known_sample_type(name: &str) -> bool {
    KNOWN_SAMPLE_TYPES.contains(&name)
}

// =============================================================================
// Reserved columns
// =============================================================================

/// Fixed columns of a suite's machine table
pub const MACHINE_RESERVED_COLUMNS: &[&str] = &["id", "name", "parameters"];

/// Fixed columns of a suite's order table
pub const ORDER_RESERVED_COLUMNS: &[&str] = &["id", "next_order_id", "previous_order_id"];

/// Fixed columns of a suite's run table
pub const RUN_RESERVED_COLUMNS: &[&str] = &[
    "id",
    "machine_id",
    "order_id",
    "imported_from",
    "start_time",
    "end_time",
    "simple_run_id",
    "parameters",
];

/// Fixed columns of a suite's sample table
pub const SAMPLE_RESERVED_COLUMNS: &[&str] = &["id", "run_id", "test_id"];

/// Check if a field name collides with a fixed column (case-insensitive)
pub fn is_reserved_column(reserved: &[&str], name: &str) -> bool {
    reserved.iter().any(|col| col.eq_ignore_ascii_case(name))
}
