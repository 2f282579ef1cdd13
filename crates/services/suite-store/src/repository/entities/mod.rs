//! SeaORM entities for the suite metatables.

pub mod json_schema;
pub mod machine_field;
pub mod order_field;
pub mod run_field;
pub mod sample_field;
pub mod sample_type;
pub mod testsuite;
