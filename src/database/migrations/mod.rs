//! SeaORM migrations for the durable cache tables

use sea_orm_migration::prelude::*;

pub mod m20261019_000001_create_cache_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20261019_000001_create_cache_tables::Migration)]
    }
}
