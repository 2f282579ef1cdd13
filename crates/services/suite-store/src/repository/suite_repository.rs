//! Test-suite metatable repository.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use super::entities::{
    json_schema, machine_field, order_field, run_field, sample_field, sample_type, testsuite,
};
use crate::testsuite_db::SuiteTables;
use common::{AppError, AppResult, OptionExt};
use domain::{MachineField, OrderField, RunField, SampleField, SampleType, TestSuite};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Suite repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait SuiteRepository: Send + Sync {
    /// Schema document stored the last time the suite was loaded from a file
    async fn find_json_schema(&self, name: &str) -> AppResult<Option<TestSuite>>;

    /// Every suite in the metatables, with all field kinds resolved
    async fn list_suites(&self) -> AppResult<Vec<TestSuite>>;

    /// Insert or update the suite's metatable rows, create or extend its
    /// tables and store its document, all in one transaction.
    ///
    /// Returns the suite as stored, which may carry fields the given
    /// definition does not mention.
    async fn sync_suite(&self, suite: &TestSuite) -> AppResult<TestSuite>;
}

/// Concrete implementation of SuiteRepository
pub struct SuiteStore {
    db: DatabaseConnection,
}

impl SuiteStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SuiteRepository for SuiteStore {
    async fn find_json_schema(&self, name: &str) -> AppResult<Option<TestSuite>> {
        let Some(row) = json_schema::Entity::find_by_id(name.to_string())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let value: serde_json::Value = serde_json::from_str(&row.jsonschema).map_err(|e| {
            AppError::internal(format!("Stored schema of test-suite '{}' is corrupt: {}", name, e))
        })?;
        Ok(Some(TestSuite::from_json(value)?))
    }

    async fn list_suites(&self) -> AppResult<Vec<TestSuite>> {
        load_suites(&self.db, None).await
    }

    async fn sync_suite(&self, suite: &TestSuite) -> AppResult<TestSuite> {
        let txn = self.db.begin().await?;

        let existing = testsuite::Entity::find()
            .filter(testsuite::Column::Name.eq(suite.name.as_str()))
            .one(&txn)
            .await?;
        let row = match existing {
            Some(row) if row.version == suite.version => row,
            Some(row) => {
                let mut active: testsuite::ActiveModel = row.into();
                active.version = Set(suite.version.clone());
                active.update(&txn).await?
            }
            None => {
                tracing::info!(suite = %suite.name, "Registering new test-suite");
                testsuite::ActiveModel {
                    name: Set(suite.name.clone()),
                    db_key_name: Set(suite.db_key_name.clone()),
                    version: Set(suite.version.clone()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
            }
        };

        sync_machine_fields(&txn, row.id, &suite.machine_fields).await?;
        sync_order_fields(&txn, row.id, &suite.order_fields).await?;
        sync_run_fields(&txn, row.id, &suite.run_fields).await?;
        sync_sample_fields(&txn, row.id, &suite.sample_fields).await?;

        let stored = load_suites(&txn, Some(row.id))
            .await?
            .pop()
            .ok_or_not_found(format!("test-suite '{}'", suite.name))?;

        // The document is only stored once the tables match it
        SuiteTables::new(&stored).create(&txn).await?;

        if let Some(text) = suite.canonical_schema() {
            match json_schema::Entity::find_by_id(suite.name.clone()).one(&txn).await? {
                Some(doc) if doc.jsonschema == text => {}
                Some(doc) => {
                    let mut active: json_schema::ActiveModel = doc.into();
                    active.jsonschema = Set(text);
                    active.update(&txn).await?;
                }
                None => {
                    json_schema::ActiveModel {
                        testsuite_name: Set(suite.name.clone()),
                        jsonschema: Set(text),
                    }
                    .insert(&txn)
                    .await?;
                }
            }
        }

        txn.commit().await?;

        Ok(TestSuite {
            jsonschema: suite.jsonschema.clone(),
            ..stored
        })
    }
}

/// Load suites (all, or the one with `only_id`) with their fields.
async fn load_suites<C>(conn: &C, only_id: Option<i32>) -> AppResult<Vec<TestSuite>>
where
    C: ConnectionTrait,
{
    let mut query = testsuite::Entity::find().order_by_asc(testsuite::Column::Id);
    if let Some(id) = only_id {
        query = query.filter(testsuite::Column::Id.eq(id));
    }
    let rows = query.all(conn).await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();

    let type_names: HashMap<i32, String> = sample_type::Entity::find()
        .all(conn)
        .await?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();

    let mut machine = group_by_suite(
        machine_field::Entity::find()
            .filter(machine_field::Column::TestsuiteId.is_in(ids.clone()))
            .order_by_asc(machine_field::Column::Id)
            .all(conn)
            .await?,
        |m| m.testsuite_id,
    );
    let mut order = group_by_suite(
        order_field::Entity::find()
            .filter(order_field::Column::TestsuiteId.is_in(ids.clone()))
            .order_by_asc(order_field::Column::Ordinal)
            .order_by_asc(order_field::Column::Id)
            .all(conn)
            .await?,
        |m| m.testsuite_id,
    );
    let mut run = group_by_suite(
        run_field::Entity::find()
            .filter(run_field::Column::TestsuiteId.is_in(ids.clone()))
            .order_by_asc(run_field::Column::Id)
            .all(conn)
            .await?,
        |m| m.testsuite_id,
    );
    let mut sample = group_by_suite(
        sample_field::Entity::find()
            .filter(sample_field::Column::TestsuiteId.is_in(ids))
            .order_by_asc(sample_field::Column::Id)
            .all(conn)
            .await?,
        |m| m.testsuite_id,
    );

    let mut suites = Vec::with_capacity(rows.len());
    for row in rows {
        let sample_rows = sample.remove(&row.id).unwrap_or_default();
        let sample_names: HashMap<i32, String> =
            sample_rows.iter().map(|s| (s.id, s.name.clone())).collect();

        let mut sample_fields = Vec::with_capacity(sample_rows.len());
        for s in sample_rows {
            let type_name = type_names.get(&s.type_id).ok_or_else(|| {
                AppError::internal(format!(
                    "Metric '{}' of test-suite '{}' references unknown sample type {}",
                    s.name, row.name, s.type_id
                ))
            })?;
            sample_fields.push(SampleField {
                sample_type: type_name.parse::<SampleType>()?,
                status_field: s.status_field_id.and_then(|id| sample_names.get(&id).cloned()),
                name: s.name,
                info_key: s.info_key,
                bigger_is_better: s.bigger_is_better,
                display_name: s.display_name,
                unit: s.unit,
                unit_abbrev: s.unit_abbrev,
            });
        }

        suites.push(TestSuite {
            machine_fields: machine
                .remove(&row.id)
                .unwrap_or_default()
                .into_iter()
                .map(MachineField::from)
                .collect(),
            order_fields: order
                .remove(&row.id)
                .unwrap_or_default()
                .into_iter()
                .map(OrderField::from)
                .collect(),
            run_fields: run
                .remove(&row.id)
                .unwrap_or_default()
                .into_iter()
                .map(RunField::from)
                .collect(),
            sample_fields,
            name: row.name,
            db_key_name: row.db_key_name,
            version: row.version,
            jsonschema: None,
        });
    }

    Ok(suites)
}

fn group_by_suite<M>(rows: Vec<M>, key: impl Fn(&M) -> i32) -> HashMap<i32, Vec<M>> {
    let mut grouped: HashMap<i32, Vec<M>> = HashMap::new();
    for row in rows {
        grouped.entry(key(&row)).or_default().push(row);
    }
    grouped
}

async fn sync_machine_fields<C>(conn: &C, suite_id: i32, fields: &[MachineField]) -> AppResult<()>
where
    C: ConnectionTrait,
{
    let existing: HashMap<String, machine_field::Model> = machine_field::Entity::find()
        .filter(machine_field::Column::TestsuiteId.eq(suite_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|m| (m.name.clone(), m))
        .collect();

    for field in fields {
        match existing.get(&field.name) {
            Some(row) if row.info_key == field.info_key => {}
            Some(row) => {
                let mut active: machine_field::ActiveModel = row.clone().into();
                active.info_key = Set(field.info_key.clone());
                active.update(conn).await?;
            }
            None => {
                machine_field::ActiveModel {
                    testsuite_id: Set(suite_id),
                    name: Set(field.name.clone()),
                    info_key: Set(field.info_key.clone()),
                    ..Default::default()
                }
                .insert(conn)
                .await?;
            }
        }
    }
    Ok(())
}

async fn sync_run_fields<C>(conn: &C, suite_id: i32, fields: &[RunField]) -> AppResult<()>
where
    C: ConnectionTrait,
{
    let existing: HashMap<String, run_field::Model> = run_field::Entity::find()
        .filter(run_field::Column::TestsuiteId.eq(suite_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|m| (m.name.clone(), m))
        .collect();

    for field in fields {
        match existing.get(&field.name) {
            Some(row) if row.info_key == field.info_key => {}
            Some(row) => {
                let mut active: run_field::ActiveModel = row.clone().into();
                active.info_key = Set(field.info_key.clone());
                active.update(conn).await?;
            }
            None => {
                run_field::ActiveModel {
                    testsuite_id: Set(suite_id),
                    name: Set(field.name.clone()),
                    info_key: Set(field.info_key.clone()),
                    ..Default::default()
                }
                .insert(conn)
                .await?;
            }
        }
    }
    Ok(())
}

async fn sync_order_fields<C>(conn: &C, suite_id: i32, fields: &[OrderField]) -> AppResult<()>
where
    C: ConnectionTrait,
{
    let existing: HashMap<String, order_field::Model> = order_field::Entity::find()
        .filter(order_field::Column::TestsuiteId.eq(suite_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|m| (m.name.clone(), m))
        .collect();

    for field in fields {
        match existing.get(&field.name) {
            Some(row) if row.info_key == field.info_key && row.ordinal == field.ordinal => {}
            Some(row) => {
                let mut active: order_field::ActiveModel = row.clone().into();
                active.info_key = Set(field.info_key.clone());
                active.ordinal = Set(field.ordinal);
                active.update(conn).await?;
            }
            None => {
                order_field::ActiveModel {
                    testsuite_id: Set(suite_id),
                    name: Set(field.name.clone()),
                    info_key: Set(field.info_key.clone()),
                    ordinal: Set(field.ordinal),
                    ..Default::default()
                }
                .insert(conn)
                .await?;
            }
        }
    }
    Ok(())
}

async fn sync_sample_fields<C>(conn: &C, suite_id: i32, fields: &[SampleField]) -> AppResult<()>
where
    C: ConnectionTrait,
{
    let mut type_ids: HashMap<String, i32> = sample_type::Entity::find()
        .all(conn)
        .await?
        .into_iter()
        .map(|t| (t.name, t.id))
        .collect();

    let existing: HashMap<String, sample_field::Model> = sample_field::Entity::find()
        .filter(sample_field::Column::TestsuiteId.eq(suite_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|m| (m.name.clone(), m))
        .collect();

    let mut ids: HashMap<String, i32> = HashMap::with_capacity(fields.len());
    for field in fields {
        let type_name = field.sample_type.as_str();
        let type_id = match type_ids.get(type_name) {
            Some(id) => *id,
            None => {
                let inserted = sample_type::ActiveModel {
                    name: Set(type_name.to_string()),
                    ..Default::default()
                }
                .insert(conn)
                .await?;
                type_ids.insert(inserted.name, inserted.id);
                inserted.id
            }
        };

        let model = match existing.get(&field.name) {
            Some(row)
                if row.type_id == type_id
                    && row.info_key == field.info_key
                    && row.bigger_is_better == field.bigger_is_better
                    && row.display_name == field.display_name
                    && row.unit == field.unit
                    && row.unit_abbrev == field.unit_abbrev =>
            {
                row.clone()
            }
            Some(row) => {
                let mut active: sample_field::ActiveModel = row.clone().into();
                active.type_id = Set(type_id);
                active.info_key = Set(field.info_key.clone());
                active.bigger_is_better = Set(field.bigger_is_better);
                active.display_name = Set(field.display_name.clone());
                active.unit = Set(field.unit.clone());
                active.unit_abbrev = Set(field.unit_abbrev.clone());
                active.update(conn).await?
            }
            None => {
                sample_field::ActiveModel {
                    testsuite_id: Set(suite_id),
                    name: Set(field.name.clone()),
                    type_id: Set(type_id),
                    info_key: Set(field.info_key.clone()),
                    status_field_id: Set(None),
                    bigger_is_better: Set(field.bigger_is_better),
                    display_name: Set(field.display_name.clone()),
                    unit: Set(field.unit.clone()),
                    unit_abbrev: Set(field.unit_abbrev.clone()),
                    ..Default::default()
                }
                .insert(conn)
                .await?
            }
        };
        ids.insert(model.name.clone(), model.id);
    }

    // Status links can point forward, so resolve them once every row exists
    let rows = sample_field::Entity::find()
        .filter(sample_field::Column::TestsuiteId.eq(suite_id))
        .all(conn)
        .await?;
    for row in rows {
        let Some(field) = fields.iter().find(|f| f.name == row.name) else {
            continue;
        };
        let wanted = field
            .status_field
            .as_ref()
            .and_then(|name| ids.get(name).copied());
        if row.status_field_id != wanted {
            let mut active: sample_field::ActiveModel = row.into();
            active.status_field_id = Set(wanted);
            active.update(conn).await?;
        }
    }
    Ok(())
}
