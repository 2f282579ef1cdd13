//! Compatibility rules between a stored schema and a newly loaded one.
//!
//! Suite tables can grow new columns, so adding machine, run or sample
//! fields is allowed. Removing a field, changing a metric's type or touching
//! the order fields would orphan or reinterpret existing data.

use crate::error::{DomainError, DomainResult};
use crate::testsuite::TestSuite;

/// Check that `next` only extends `previous`.
pub fn check_schema_changes(previous: &TestSuite, next: &TestSuite) -> DomainResult<()> {
    if let (Some(old), Some(new)) = (previous.canonical_schema(), next.canonical_schema()) {
        if old == new {
            return Ok(());
        }
    }

    let suite = &next.name;

    let old_order: Vec<&str> = previous.order_fields.iter().map(|f| f.name.as_str()).collect();
    let new_order: Vec<&str> = next.order_fields.iter().map(|f| f.name.as_str()).collect();
    if old_order != new_order {
        return Err(DomainError::schema_change(format!(
            "Order fields of test-suite '{}' changed from [{}] to [{}]",
            suite,
            old_order.join(", "),
            new_order.join(", ")
        )));
    }

    check_not_removed(
        suite,
        "machine",
        previous.machine_fields.iter().map(|f| f.name.as_str()),
        next.machine_fields.iter().map(|f| f.name.as_str()),
    )?;
    check_not_removed(
        suite,
        "run",
        previous.run_fields.iter().map(|f| f.name.as_str()),
        next.run_fields.iter().map(|f| f.name.as_str()),
    )?;
    check_not_removed(
        suite,
        "metric",
        previous.sample_fields.iter().map(|f| f.name.as_str()),
        next.sample_fields.iter().map(|f| f.name.as_str()),
    )?;

    for old in &previous.sample_fields {
        if let Some(new) = next.find_sample_field(&old.name) {
            if new.sample_type != old.sample_type {
                return Err(DomainError::schema_change(format!(
                    "Type of metric '{}' in test-suite '{}' changed from {} to {}",
                    old.name, suite, old.sample_type, new.sample_type
                )));
            }
        }
    }

    Ok(())
}

fn check_not_removed<'a>(
    suite: &str,
    kind: &str,
    old: impl Iterator<Item = &'a str>,
    new: impl Iterator<Item = &'a str> + Clone,
) -> DomainResult<()> {
    for name in old {
        if !new.clone().any(|n| n == name) {
            return Err(DomainError::schema_change(format!(
                "The {} field '{}' was removed from test-suite '{}'",
                kind, name, suite
            )));
        }
    }
    Ok(())
}
