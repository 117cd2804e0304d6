//! Groups owning activities.
//!
//! Group administration is an external concern; the engine keeps the table
//! for referential integrity and the manager lookup used by finance
//! visibility checks.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::group_managers::Entity")]
    GroupManagers,
}

impl Related<super::group_managers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GroupManagers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
