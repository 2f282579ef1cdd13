//! Migration: Keep the schema document each suite was last loaded from.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TestsuiteJsonSchemas::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TestsuiteJsonSchemas::TestsuiteName)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TestsuiteJsonSchemas::Jsonschema).text().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TestsuiteJsonSchemas::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TestsuiteJsonSchemas {
    Table,
    TestsuiteName,
    Jsonschema,
}
