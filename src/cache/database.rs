//! SeaORM-backed cache store
//!
//! Keeps the cache in two tables so several service instances can share one
//! generation and the guard flag survives restarts. Writes are upserts, so a
//! repeated or concurrent load rewrites identical rows instead of failing.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::trace;

use super::CacheStore;
use crate::database::Database;
use crate::entities::prelude::{CacheEntries, CacheSetMembers};
use crate::entities::{cache_entries, cache_set_members};
use crate::errors::{StoreError, StoreResult};

#[derive(Clone)]
pub struct SeaOrmCacheStore {
    connection: Arc<DatabaseConnection>,
}

impl SeaOrmCacheStore {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub fn from_database(database: &Database) -> Self {
        Self::new(database.connection())
    }

    fn entry(key: &str, value: &str) -> cache_entries::ActiveModel {
        cache_entries::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(Utc::now().to_rfc3339()),
        }
    }
}

/// Rows affected by an insert that may have been skipped by `ON CONFLICT DO NOTHING`
fn inserted_rows(result: Result<u64, DbErr>) -> Result<u64, DbErr> {
    match result {
        Ok(rows) => Ok(rows),
        Err(DbErr::RecordNotInserted) => Ok(0),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl CacheStore for SeaOrmCacheStore {
    async fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
        trace!("SET {}", key);
        CacheEntries::insert(Self::entry(key, value))
            .on_conflict(
                OnConflict::column(cache_entries::Column::Key)
                    .update_columns([
                        cache_entries::Column::Value,
                        cache_entries::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.connection)
            .await
            .map_err(|e| StoreError::write_failed(key, e.to_string()))?;
        Ok(())
    }

    async fn get_string(&self, key: &str) -> StoreResult<Option<String>> {
        let model = CacheEntries::find_by_id(key.to_string())
            .one(&*self.connection)
            .await
            .map_err(|e| StoreError::read_failed(key, e.to_string()))?;
        Ok(model.map(|m| m.value))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        if self.get_string(key).await?.is_some() {
            return Ok(true);
        }

        let member = CacheSetMembers::find()
            .filter(cache_set_members::Column::SetKey.eq(key))
            .one(&*self.connection)
            .await
            .map_err(|e| StoreError::read_failed(key, e.to_string()))?;
        Ok(member.is_some())
    }

    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()> {
        trace!("SADD {} {}", key, member);
        let row = cache_set_members::ActiveModel {
            set_key: Set(key.to_string()),
            member: Set(member.to_string()),
        };

        let result = CacheSetMembers::insert(row)
            .on_conflict(
                OnConflict::columns([
                    cache_set_members::Column::SetKey,
                    cache_set_members::Column::Member,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&*self.connection)
            .await;

        inserted_rows(result).map_err(|e| StoreError::write_failed(key, e.to_string()))?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> StoreResult<BTreeSet<String>> {
        let rows = CacheSetMembers::find()
            .filter(cache_set_members::Column::SetKey.eq(key))
            .all(&*self.connection)
            .await
            .map_err(|e| StoreError::read_failed(key, e.to_string()))?;
        Ok(rows.into_iter().map(|row| row.member).collect())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
        let result = CacheEntries::insert(Self::entry(key, value))
            .on_conflict(
                OnConflict::column(cache_entries::Column::Key)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&*self.connection)
            .await;

        let rows =
            inserted_rows(result).map_err(|e| StoreError::write_failed(key, e.to_string()))?;
        Ok(rows == 1)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let result = CacheEntries::delete_many()
            .filter(cache_entries::Column::Key.eq(key))
            .filter(cache_entries::Column::Value.eq(expected))
            .exec(&*self.connection)
            .await
            .map_err(|e| StoreError::write_failed(key, e.to_string()))?;
        Ok(result.rows_affected > 0)
    }
}
