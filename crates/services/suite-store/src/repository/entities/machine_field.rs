//! Machine field metatable entity.

use sea_orm::entity::prelude::*;

use domain::MachineField;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "testsuite_machine_fields")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub testsuite_id: i32,
    pub name: String,
    pub info_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for MachineField {
    fn from(model: Model) -> Self {
        MachineField {
            name: model.name,
            info_key: model.info_key,
        }
    }
}
