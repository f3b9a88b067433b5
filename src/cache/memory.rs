//! In-memory cache store
//!
//! String values and sets live in `HashMap`s guarded by `tokio::sync::RwLock`.
//! Not durable and not shared between processes; used for single-instance
//! deployments, local development and tests.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::CacheStore;
use crate::errors::StoreResult;

#[derive(Clone, Default)]
pub struct InMemoryCacheStore {
    strings: Arc<RwLock<HashMap<String, String>>>,
    sets: Arc<RwLock<HashMap<String, BTreeSet<String>>>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of string keys currently stored
    pub async fn string_count(&self) -> usize {
        self.strings.read().await.len()
    }

    /// Number of sets currently stored
    pub async fn set_count(&self) -> usize {
        self.sets.read().await.len()
    }

    /// Drop everything, as a cache flush would
    pub async fn clear(&self) {
        self.strings.write().await.clear();
        self.sets.write().await.clear();
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
        self.strings
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.strings.read().await.get(key).cloned())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        if self.strings.read().await.contains_key(key) {
            return Ok(true);
        }
        Ok(self
            .sets
            .read()
            .await
            .get(key)
            .is_some_and(|members| !members.is_empty()))
    }

    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()> {
        self.sets
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_members(&self, key: &str) -> StoreResult<BTreeSet<String>> {
        Ok(self.sets.read().await.get(key).cloned().unwrap_or_default())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
        let mut strings = self.strings.write().await;
        if strings.contains_key(key) {
            return Ok(false);
        }
        strings.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let mut strings = self.strings.write().await;
        if strings.get(key).is_some_and(|value| value == expected) {
            strings.remove(key);
            return Ok(true);
        }
        Ok(false)
    }
}
