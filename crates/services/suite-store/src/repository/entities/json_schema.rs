//! Stored schema document of a suite loaded from a file.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "testsuite_json_schemas")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub testsuite_name: String,
    #[sea_orm(column_type = "Text")]
    pub jsonschema: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
