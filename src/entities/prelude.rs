pub use super::cache_entries::Entity as CacheEntries;
pub use super::cache_set_members::Entity as CacheSetMembers;
