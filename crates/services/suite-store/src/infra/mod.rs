//! Infrastructure layer - database lifecycle and migrations.

mod db;
pub mod engines;
pub mod migrations;

pub use db::{
    database_url, path_has_no_database_type, Database, DatabaseSettings,
    DEFAULT_BASELINE_REVISION,
};
pub use migrations::Migrator;
