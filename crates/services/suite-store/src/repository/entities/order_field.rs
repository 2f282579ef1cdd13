//! Order field metatable entity.

use sea_orm::entity::prelude::*;

use domain::OrderField;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "testsuite_order_fields")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub testsuite_id: i32,
    pub name: String,
    pub info_key: Option<String>,
    /// Position of the field when comparing orders
    pub ordinal: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for OrderField {
    fn from(model: Model) -> Self {
        OrderField {
            name: model.name,
            info_key: model.info_key,
            ordinal: model.ordinal,
        }
    }
}
