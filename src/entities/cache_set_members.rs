use sea_orm::entity::prelude::*;

/// One row per (set key, member) pair
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cache_set_members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub set_key: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub member: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
