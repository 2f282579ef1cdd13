//! Domain layer - Test-suite schema entities and rules.
//!
//! This crate contains pure schema logic with no infrastructure dependencies.
//! Schema documents are parsed and validated here; the suite store persists
//! the resulting [`TestSuite`] values and builds tables from them.

pub mod constants;
pub mod error;
pub mod schema_check;
pub mod testsuite;

pub use constants::*;
pub use error::{DomainError, DomainResult};
pub use schema_check::check_schema_changes;
pub use testsuite::{MachineField, OrderField, RunField, SampleField, SampleType, TestSuite};
