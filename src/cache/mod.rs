//! Key-value cache store boundary
//!
//! The loader only needs a handful of capabilities from the cache: plain
//! string values, existence checks and set membership. A conditional write
//! (`set_if_absent`) and a compare-and-delete (`delete_if_equals`) back the
//! cross-process load lock, and the
//! reads back the lookup API.
//!
//! Implementations must be safe for concurrent writers; no transactional
//! guarantees are required across calls.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::errors::StoreResult;

pub mod database;
pub mod keys;
pub mod memory;

pub use database::SeaOrmCacheStore;
pub use keys::CacheKey;
pub use memory::InMemoryCacheStore;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value
    async fn set_string(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Read the string stored under `key`
    async fn get_string(&self, key: &str) -> StoreResult<Option<String>>;

    /// Whether `key` holds a string value or a non-empty set
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Add `member` to the set at `key`; adding an existing member is a no-op
    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()>;

    /// Members of the set at `key`, empty when the set does not exist
    async fn set_members(&self, key: &str) -> StoreResult<BTreeSet<String>>;

    /// Store `value` only if `key` holds no value; returns whether it was stored
    async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool>;

    /// Remove the string value at `key` only while it still equals
    /// `expected`, as one atomic step; returns whether it was removed
    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool>;
}
