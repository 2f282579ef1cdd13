//! Database migrations for the suite metatables.
//!
//! Each migration is a separate module following SeaORM conventions.
//! Migration names follow the pattern: m{YYYYMMDD}_{NNNNNN}_{description}

use sea_orm_migration::prelude::*;

mod m20240101_000001_create_testsuite_metatables;
mod m20240101_000002_seed_sample_types;
mod m20240102_000001_create_testsuite_json_schemas;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_testsuite_metatables::Migration),
            Box::new(m20240101_000002_seed_sample_types::Migration),
            Box::new(m20240102_000001_create_testsuite_json_schemas::Migration),
        ]
    }
}
