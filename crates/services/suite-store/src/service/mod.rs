//! Service layer - startup use cases over the repositories.

mod schema_loader;

pub use schema_loader::{LoadedSuite, SchemaLoader, SuiteOrigin};
