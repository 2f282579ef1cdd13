//! Sample field (metric) metatable entity.
//!
//! The sample type and status field are stored as ids; the repository
//! resolves them to names when building a [`domain::SampleField`].

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "testsuite_sample_fields")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub testsuite_id: i32,
    pub name: String,
    pub type_id: i32,
    pub info_key: Option<String>,
    pub status_field_id: Option<i32>,
    pub bigger_is_better: bool,
    pub display_name: Option<String>,
    pub unit: Option<String>,
    pub unit_abbrev: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
