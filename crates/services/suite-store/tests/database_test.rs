//! Database lifecycle tests against SQLite files.

use std::fs;
use std::path::PathBuf;

use sea_orm::{ConnectionTrait, Statement};
use sea_orm_migration::SchemaManager;
use tempfile::TempDir;

use common::{AppError, InstanceConfig};
use domain::SampleType;
use suite_store_lib::infra::{engines, Database, DatabaseSettings};
use suite_store_lib::repository::SuiteRepository;
use suite_store_lib::service::SuiteOrigin;
use suite_store_lib::SuiteTable;

const NTS: &str = r#"
format_version: '2'
name: nts
machine_fields:
  - name: hardware
  - name: os
run_fields:
  - name: llvm_project_revision
    order: true
metrics:
  - name: compile_time
    unit: seconds
    unit_abbrev: s
  - name: execution_time
"#;

const COMPILE: &str = r#"
format_version: '2'
name: compile
run_fields:
  - name: revision
    order: true
  - name: build_mode
metrics:
  - name: time
    status_field: time_status
  - name: time_status
    type: Status
  - name: binary_hash
    type: Hash
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("schemas")).unwrap();
        Self { dir }
    }

    fn db_path(&self) -> String {
        self.dir.path().join("lnt.db").to_str().unwrap().to_string()
    }

    fn schemas_dir(&self) -> PathBuf {
        self.dir.path().join("schemas")
    }

    fn write_schema(&self, file: &str, text: &str) {
        fs::write(self.schemas_dir().join(file), text).unwrap();
    }

    fn remove_schema(&self, file: &str) {
        fs::remove_file(self.schemas_dir().join(file)).unwrap();
    }

    fn config(&self) -> InstanceConfig {
        InstanceConfig::with_schemas_dir(self.schemas_dir())
    }

    async fn open(&self) -> Result<Database, AppError> {
        Database::open(&self.db_path(), self.config(), 0).await
    }
}

async fn count_rows(db: &Database, table: &str) -> i64 {
    let backend = db.connection().get_database_backend();
    let row = db
        .connection()
        .query_one(Statement::from_string(
            backend,
            format!("SELECT COUNT(*) AS n FROM \"{}\"", table),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

#[tokio::test]
async fn test_open_loads_file_suites_and_creates_tables() {
    let fx = Fixture::new();
    fx.write_schema("nts.yaml", NTS);

    let db = fx.open().await.unwrap();

    assert_eq!(db.suite_names(), vec!["nts"]);
    let nts = db.testsuite("nts").unwrap();
    assert!(nts.is_file_backed());
    assert_eq!(nts.suite().machine_fields.len(), 2);
    assert!(nts.tables_exist(db.connection()).await.unwrap());
    assert_eq!(count_rows(&db, &nts.table_name(SuiteTable::Sample)).await, 0);

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_plain_path_becomes_sqlite_url() {
    let fx = Fixture::new();
    let db = fx.open().await.unwrap();

    let settings = db.settings();
    assert!(settings.path.starts_with("sqlite://"));
    assert!(settings.path.contains("lnt.db"));
    assert_eq!(settings.baseline_revision, 0);
    assert!(db.testsuites().is_empty());
    assert!(fx.dir.path().join("lnt.db").exists());

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_migrations_run_once_per_path() {
    let fx = Fixture::new();
    let db = fx.open().await.unwrap();
    let path = db.settings().path;

    assert!(engines::is_migrated(&path).await);
    assert!(!engines::migrate_once(&path, db.connection()).await.unwrap());

    let status = db.migration_status().await.unwrap();
    assert_eq!(status.len(), 3);
    assert!(status.iter().all(|(_, applied)| *applied));

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_suite_without_file_is_loaded_from_database() {
    let fx = Fixture::new();
    fx.write_schema("compile.yaml", COMPILE);
    fx.open().await.unwrap().close().await.unwrap();

    fx.remove_schema("compile.yaml");
    let db = fx.open().await.unwrap();

    let compile = db.testsuite("compile").unwrap();
    assert_eq!(compile.origin(), &SuiteOrigin::Database);
    let suite = compile.suite();
    assert!(suite.jsonschema.is_none());
    assert_eq!(suite.order_fields[0].name, "revision");
    assert_eq!(suite.run_fields[0].name, "build_mode");

    let time = suite.find_sample_field("time").unwrap();
    assert_eq!(time.sample_type, SampleType::Real);
    assert_eq!(time.status_field.as_deref(), Some("time_status"));
    assert_eq!(
        suite.find_sample_field("binary_hash").unwrap().sample_type,
        SampleType::Hash
    );

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_suite_keeps_first_definition() {
    let fx = Fixture::new();
    fx.write_schema("a_nts.yaml", NTS);
    fx.write_schema(
        "b_nts.yaml",
        "format_version: '2'\nname: nts\nrun_fields:\n  - name: rev\n    order: true\nmetrics:\n  - name: other\n",
    );

    let db = fx.open().await.unwrap();
    let nts = db.testsuite("nts").unwrap();
    assert!(nts.suite().find_sample_field("compile_time").is_some());
    assert!(nts.suite().find_sample_field("other").is_none());

    let stored = db.make_session().suites().list_suites().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].find_sample_field("other").is_none());

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_malformed_schema_fails_open() {
    let fx = Fixture::new();
    fx.write_schema("broken.yaml", "format_version: '2'\nname: broken\nmetrics: [\n");

    let err = fx.open().await.unwrap_err();
    match err {
        AppError::SchemaFile { path, .. } => assert!(path.ends_with("broken.yaml")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_removed_metric_fails_reopen() {
    let fx = Fixture::new();
    fx.write_schema("nts.yaml", NTS);
    fx.open().await.unwrap().close().await.unwrap();

    fx.write_schema(
        "nts.yaml",
        &NTS.replace("  - name: execution_time\n", ""),
    );
    let err = fx.open().await.unwrap_err();

    assert_eq!(err.code(), "SCHEMA_FILE_ERROR");
    assert!(err.to_string().contains("'execution_time' was removed"));
}

#[tokio::test]
async fn test_added_metric_adds_column() {
    let fx = Fixture::new();
    fx.write_schema("nts.yaml", NTS);
    fx.open().await.unwrap().close().await.unwrap();

    fx.write_schema(
        "nts.yaml",
        &format!("{}  - name: code_size\n    type: Real\n", NTS),
    );
    let db = fx.open().await.unwrap();

    let nts = db.testsuite("nts").unwrap();
    assert!(nts.suite().find_sample_field("code_size").is_some());

    let manager = SchemaManager::new(db.connection());
    assert!(manager
        .has_column(nts.table_name(SuiteTable::Sample), "code_size")
        .await
        .unwrap());

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_table_build_stores_nothing() {
    let fx = Fixture::new();
    let db = fx.open().await.unwrap();
    // Occupies the name of the suite's first table
    db.connection()
        .execute_unprepared("CREATE VIEW nts_machine AS SELECT 1 AS id")
        .await
        .unwrap();
    db.close().await.unwrap();

    fx.write_schema(
        "nts.yaml",
        &format!("{}  - name: code_size\n", NTS),
    );
    let err = fx.open().await.unwrap_err();
    assert_eq!(err.code(), "SCHEMA_FILE_ERROR");

    let db = Database::connect_without_migrations(&fx.db_path(), fx.config())
        .await
        .unwrap();
    assert_eq!(count_rows(&db, "testsuites").await, 0);
    assert_eq!(count_rows(&db, "testsuite_sample_fields").await, 0);
    assert_eq!(count_rows(&db, "testsuite_json_schemas").await, 0);
    db.connection()
        .execute_unprepared("DROP VIEW nts_machine")
        .await
        .unwrap();
    db.close().await.unwrap();

    // Dropping the metric is not a schema change: nothing was stored
    fx.write_schema("nts.yaml", NTS);
    let db = fx.open().await.unwrap();
    let nts = db.testsuite("nts").unwrap();
    assert!(nts.tables_exist(db.connection()).await.unwrap());

    let stored = db.make_session().suites().list_suites().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].find_sample_field("code_size").is_none());

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_metrics_differing_in_case_are_rejected_before_storing() {
    let fx = Fixture::new();
    fx.write_schema(
        "nts.yaml",
        &format!("{}  - name: Execution_Time\n", NTS),
    );

    let err = fx.open().await.unwrap_err();
    assert!(err.to_string().contains("Duplicate metric field 'Execution_Time'"));

    fx.write_schema("nts.yaml", NTS);
    let db = fx.open().await.unwrap();
    assert!(db.testsuite("nts").is_some());
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_stored_suite_tables_can_be_rebuilt() {
    let fx = Fixture::new();
    fx.write_schema("compile.yaml", COMPILE);
    fx.open().await.unwrap().close().await.unwrap();

    fx.remove_schema("compile.yaml");
    let db = fx.open().await.unwrap();
    let compile = db.testsuite("compile").unwrap();
    assert!(!compile.is_file_backed());

    db.connection()
        .execute_unprepared("DROP TABLE compile_sample")
        .await
        .unwrap();
    assert!(!compile.tables_exist(db.connection()).await.unwrap());

    compile.create_tables(db.connection()).await.unwrap();
    assert!(compile.tables_exist(db.connection()).await.unwrap());

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_reopen_from_settings() {
    let fx = Fixture::new();
    fx.write_schema("nts.yaml", NTS);
    fx.write_schema("compile.yaml", COMPILE);
    let db = fx.open().await.unwrap();

    let text = serde_json::to_string(&db.settings()).unwrap();
    let settings: DatabaseSettings = serde_json::from_str(&text).unwrap();
    assert_eq!(settings, db.settings());

    let other = Database::open_with_settings(settings).await.unwrap();
    assert_eq!(other.suite_names(), vec!["compile", "nts"]);

    other.close().await.unwrap();
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_session_transaction_commits_and_rolls_back() {
    let fx = Fixture::new();
    fx.write_schema("nts.yaml", NTS);
    let db = fx.open().await.unwrap();
    let session = db.make_session();
    session.ping().await.unwrap();

    let failed: Result<(), AppError> = session
        .transaction(|txn| {
            Box::pin(async move {
                txn.execute_unprepared("INSERT INTO \"nts_test\" (\"name\") VALUES ('a')")
                    .await?;
                Err(AppError::internal("abort"))
            })
        })
        .await;
    assert!(failed.is_err());
    assert_eq!(count_rows(&db, "nts_test").await, 0);

    session
        .transaction(|txn| {
            Box::pin(async move {
                txn.execute_unprepared("INSERT INTO \"nts_test\" (\"name\") VALUES ('b')")
                    .await?;
                Ok::<_, AppError>(())
            })
        })
        .await
        .unwrap();
    assert_eq!(count_rows(&db, "nts_test").await, 1);

    db.close().await.unwrap();
}
