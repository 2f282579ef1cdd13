//! Migration: Create the metatables describing test-suite schemas.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SampleTypes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SampleTypes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SampleTypes::Name).string().not_null().unique_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Testsuites::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Testsuites::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    // Suite names are unique; the loader relies on this
                    .col(ColumnDef::new(Testsuites::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Testsuites::DbKeyName).string().not_null())
                    .col(ColumnDef::new(Testsuites::Version).string().not_null())
                    .to_owned(),
            )
            .await?;

        create_field_table(manager, TestsuiteMachineFields::Table, "machine").await?;
        create_field_table(manager, TestsuiteRunFields::Table, "run").await?;

        manager
            .create_table(
                Table::create()
                    .table(TestsuiteOrderFields::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Field::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Field::TestsuiteId).integer().not_null())
                    .col(ColumnDef::new(Field::Name).string().not_null())
                    .col(ColumnDef::new(Field::InfoKey).string().null())
                    .col(ColumnDef::new(TestsuiteOrderFields::Ordinal).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_fields_testsuite")
                            .from(TestsuiteOrderFields::Table, Field::TestsuiteId)
                            .to(Testsuites::Table, Testsuites::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        create_unique_name_index(manager, TestsuiteOrderFields::Table, "order").await?;

        manager
            .create_table(
                Table::create()
                    .table(TestsuiteSampleFields::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Field::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Field::TestsuiteId).integer().not_null())
                    .col(ColumnDef::new(Field::Name).string().not_null())
                    .col(ColumnDef::new(TestsuiteSampleFields::TypeId).integer().not_null())
                    .col(ColumnDef::new(Field::InfoKey).string().null())
                    .col(ColumnDef::new(TestsuiteSampleFields::StatusFieldId).integer().null())
                    .col(
                        ColumnDef::new(TestsuiteSampleFields::BiggerIsBetter)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(TestsuiteSampleFields::DisplayName).string().null())
                    .col(ColumnDef::new(TestsuiteSampleFields::Unit).string().null())
                    .col(ColumnDef::new(TestsuiteSampleFields::UnitAbbrev).string().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sample_fields_testsuite")
                            .from(TestsuiteSampleFields::Table, Field::TestsuiteId)
                            .to(Testsuites::Table, Testsuites::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sample_fields_type")
                            .from(TestsuiteSampleFields::Table, TestsuiteSampleFields::TypeId)
                            .to(SampleTypes::Table, SampleTypes::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sample_fields_status_field")
                            .from(TestsuiteSampleFields::Table, TestsuiteSampleFields::StatusFieldId)
                            .to(TestsuiteSampleFields::Table, Field::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;
        create_unique_name_index(manager, TestsuiteSampleFields::Table, "sample").await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop dependents before the tables they reference
        manager
            .drop_table(Table::drop().table(TestsuiteSampleFields::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TestsuiteOrderFields::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TestsuiteRunFields::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TestsuiteMachineFields::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Testsuites::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SampleTypes::Table).to_owned())
            .await
    }
}

/// Machine and run field tables share one layout.
async fn create_field_table<T>(manager: &SchemaManager<'_>, table: T, kind: &str) -> Result<(), DbErr>
where
    T: IntoIden + Copy + 'static,
{
    manager
        .create_table(
            Table::create()
                .table(table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Field::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(Field::TestsuiteId).integer().not_null())
                .col(ColumnDef::new(Field::Name).string().not_null())
                .col(ColumnDef::new(Field::InfoKey).string().null())
                .foreign_key(
                    ForeignKey::create()
                        .name(format!("fk_{}_fields_testsuite", kind))
                        .from(table, Field::TestsuiteId)
                        .to(Testsuites::Table, Testsuites::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        )
        .await?;
    create_unique_name_index(manager, table, kind).await
}

/// Field names are unique within one suite.
async fn create_unique_name_index<T>(
    manager: &SchemaManager<'_>,
    table: T,
    kind: &str,
) -> Result<(), DbErr>
where
    T: IntoIden + 'static,
{
    manager
        .create_index(
            Index::create()
                .name(format!("idx_{}_fields_testsuite_name", kind))
                .table(table)
                .col(Field::TestsuiteId)
                .col(Field::Name)
                .unique()
                .to_owned(),
        )
        .await
}

#[derive(DeriveIden)]
enum SampleTypes {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum Testsuites {
    Table,
    Id,
    Name,
    DbKeyName,
    Version,
}

#[derive(DeriveIden, Clone, Copy)]
enum TestsuiteMachineFields {
    Table,
}

#[derive(DeriveIden, Clone, Copy)]
enum TestsuiteRunFields {
    Table,
}

#[derive(DeriveIden)]
enum TestsuiteOrderFields {
    Table,
    Ordinal,
}

#[derive(DeriveIden)]
enum TestsuiteSampleFields {
    Table,
    TypeId,
    StatusFieldId,
    BiggerIsBetter,
    DisplayName,
    Unit,
    UnitAbbrev,
}

/// Columns shared by every field table
#[derive(DeriveIden)]
enum Field {
    Id,
    TestsuiteId,
    Name,
    InfoKey,
}
