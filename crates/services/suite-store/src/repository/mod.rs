//! Repository layer for the suite metatables.

pub mod entities;
mod suite_repository;

pub use suite_repository::{SuiteRepository, SuiteStore};

#[cfg(any(test, feature = "test-utils"))]
pub use suite_repository::MockSuiteRepository;
