//! Per-suite database handle and table management.
//!
//! Every suite owns five tables prefixed with its `db_key_name`. The fixed
//! columns are the same for all suites; each schema field adds one nullable
//! column to the table of its kind.

use sea_orm::DbErr;
use sea_orm_migration::prelude::*;
use sea_orm_migration::IntoSchemaManagerConnection;

use common::AppResult;
use domain::{SampleType, TestSuite};

use crate::service::{LoadedSuite, SuiteOrigin};

/// The tables owned by one suite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteTable {
    Machine,
    Order,
    Test,
    Run,
    Sample,
}

impl SuiteTable {
    /// Creation order; referenced tables come first
    pub const ALL: [SuiteTable; 5] = [
        SuiteTable::Machine,
        SuiteTable::Order,
        SuiteTable::Test,
        SuiteTable::Run,
        SuiteTable::Sample,
    ];

    fn suffix(&self) -> &'static str {
        match self {
            SuiteTable::Machine => "machine",
            SuiteTable::Order => "order",
            SuiteTable::Test => "test",
            SuiteTable::Run => "run",
            SuiteTable::Sample => "sample",
        }
    }
}

/// Handle for one test-suite: its schema and the tables built from it.
#[derive(Debug, Clone)]
pub struct TestSuiteDb {
    suite: TestSuite,
    origin: SuiteOrigin,
}

impl TestSuiteDb {
    pub fn new(suite: TestSuite, origin: SuiteOrigin) -> Self {
        Self { suite, origin }
    }

    pub fn name(&self) -> &str {
        &self.suite.name
    }

    pub fn suite(&self) -> &TestSuite {
        &self.suite
    }

    pub fn origin(&self) -> &SuiteOrigin {
        &self.origin
    }

    /// Whether the suite came from a schema file
    pub fn is_file_backed(&self) -> bool {
        matches!(self.origin, SuiteOrigin::File(_))
    }

    /// Full name of one of the suite's tables, e.g. `nts_sample`
    pub fn table_name(&self, table: SuiteTable) -> String {
        SuiteTables::new(&self.suite).table_name(table)
    }

    /// Create missing tables and add columns for fields added since.
    pub async fn create_tables<'c, C>(&self, conn: C) -> AppResult<()>
    where
        C: IntoSchemaManagerConnection<'c>,
    {
        SuiteTables::new(&self.suite).create(conn).await?;
        Ok(())
    }

    /// Whether every table of the suite exists
    pub async fn tables_exist<'c, C>(&self, conn: C) -> AppResult<bool>
    where
        C: IntoSchemaManagerConnection<'c>,
    {
        let manager = SchemaManager::new(conn);
        for table in SuiteTable::ALL {
            if !manager.has_table(self.table_name(table)).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// DDL for the tables of one suite.
///
/// Runs on a plain connection or inside the transaction that registers the
/// suite, so a failed build leaves no trace of the suite behind.
pub(crate) struct SuiteTables<'a> {
    suite: &'a TestSuite,
}

impl<'a> SuiteTables<'a> {
    pub(crate) fn new(suite: &'a TestSuite) -> Self {
        Self { suite }
    }

    fn table_name(&self, table: SuiteTable) -> String {
        format!("{}_{}", self.suite.db_key_name, table.suffix())
    }

    /// Create missing tables, then add columns for fields new since.
    pub(crate) async fn create<'c, C>(&self, conn: C) -> Result<(), DbErr>
    where
        C: IntoSchemaManagerConnection<'c>,
    {
        let manager = SchemaManager::new(conn);

        for table in SuiteTable::ALL {
            let name = self.table_name(table);
            if !manager.has_table(&name).await? {
                manager.create_table(self.create_statement(table)).await?;
                tracing::debug!(suite = %self.suite.name, table = %name, "Created table");
                continue;
            }

            for (column, def) in self.field_columns(table) {
                if manager.has_column(&name, &column).await? {
                    continue;
                }
                manager
                    .alter_table(
                        Table::alter()
                            .table(Alias::new(name.as_str()))
                            .add_column(def)
                            .to_owned(),
                    )
                    .await?;
                tracing::info!(suite = %self.suite.name, table = %name, column = %column, "Added column");
            }
        }
        Ok(())
    }

    fn create_statement(&self, table: SuiteTable) -> TableCreateStatement {
        let name = self.table_name(table);
        let mut stmt = Table::create();
        stmt.table(Alias::new(name.as_str()))
            .col(
                ColumnDef::new(Alias::new("id"))
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            );

        match table {
            SuiteTable::Machine => {
                stmt.col(ColumnDef::new(Alias::new("name")).string().not_null())
                    .col(ColumnDef::new(Alias::new("parameters")).text().null());
            }
            SuiteTable::Order => {
                stmt.col(ColumnDef::new(Alias::new("next_order_id")).integer().null())
                    .col(ColumnDef::new(Alias::new("previous_order_id")).integer().null());
            }
            SuiteTable::Test => {
                stmt.col(ColumnDef::new(Alias::new("name")).string().not_null().unique_key());
            }
            SuiteTable::Run => {
                stmt.col(ColumnDef::new(Alias::new("machine_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("order_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("imported_from")).string().null())
                    .col(ColumnDef::new(Alias::new("start_time")).date_time().null())
                    .col(ColumnDef::new(Alias::new("end_time")).date_time().null())
                    .col(ColumnDef::new(Alias::new("simple_run_id")).integer().null())
                    .col(ColumnDef::new(Alias::new("parameters")).text().null())
                    .foreign_key(&mut self.foreign_key(table, "machine_id", SuiteTable::Machine))
                    .foreign_key(&mut self.foreign_key(table, "order_id", SuiteTable::Order));
            }
            SuiteTable::Sample => {
                stmt.col(ColumnDef::new(Alias::new("run_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("test_id")).integer().not_null())
                    .foreign_key(&mut self.foreign_key(table, "run_id", SuiteTable::Run))
                    .foreign_key(&mut self.foreign_key(table, "test_id", SuiteTable::Test));
            }
        }

        for (_, def) in self.field_columns(table) {
            stmt.col(def);
        }
        stmt
    }

    fn foreign_key(
        &self,
        table: SuiteTable,
        column: &str,
        target: SuiteTable,
    ) -> ForeignKeyCreateStatement {
        let from = self.table_name(table);
        ForeignKey::create()
            .name(format!("fk_{}_{}", from, column))
            .from(Alias::new(from.as_str()), Alias::new(column))
            .to(Alias::new(self.table_name(target).as_str()), Alias::new("id"))
            .on_delete(ForeignKeyAction::Cascade)
            .to_owned()
    }

    /// Nullable columns contributed by the schema fields of one table
    fn field_columns(&self, table: SuiteTable) -> Vec<(String, ColumnDef)> {
        let string_column = |name: &str| {
            let mut def = ColumnDef::new(Alias::new(name));
            def.string().null();
            (name.to_string(), def)
        };

        match table {
            SuiteTable::Machine => self
                .suite
                .machine_fields
                .iter()
                .map(|f| string_column(&f.name))
                .collect(),
            SuiteTable::Order => self
                .suite
                .order_fields
                .iter()
                .map(|f| string_column(&f.name))
                .collect(),
            SuiteTable::Run => self
                .suite
                .run_fields
                .iter()
                .map(|f| string_column(&f.name))
                .collect(),
            SuiteTable::Test => Vec::new(),
            SuiteTable::Sample => self
                .suite
                .sample_fields
                .iter()
                .map(|f| {
                    let mut def = ColumnDef::new(Alias::new(f.name.as_str()));
                    match f.sample_type {
                        SampleType::Real => def.double(),
                        SampleType::Status => def.integer(),
                        SampleType::Hash => def.string(),
                    };
                    def.null();
                    (f.name.clone(), def)
                })
                .collect(),
        }
    }
}

impl From<LoadedSuite> for TestSuiteDb {
    fn from(loaded: LoadedSuite) -> Self {
        TestSuiteDb::new(loaded.suite, loaded.origin)
    }
}
