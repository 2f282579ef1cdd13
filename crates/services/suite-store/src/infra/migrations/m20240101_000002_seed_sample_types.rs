//! Migration: Seed the known sample types.

use domain::KNOWN_SAMPLE_TYPES;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut insert = Query::insert();
        insert
            .into_table(SampleTypes::Table)
            .columns([SampleTypes::Name]);
        for name in KNOWN_SAMPLE_TYPES {
            insert.values_panic([(*name).into()]);
        }

        manager.exec_stmt(insert).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let delete = Query::delete()
            .from_table(SampleTypes::Table)
            .and_where(Expr::col(SampleTypes::Name).is_in(KNOWN_SAMPLE_TYPES.iter().copied()))
            .to_owned();

        manager.exec_stmt(delete).await
    }
}

#[derive(DeriveIden)]
enum SampleTypes {
    Table,
    Name,
}
