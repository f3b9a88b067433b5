//! SeaORM entities for the durable cache tables

pub mod prelude;

pub mod cache_entries;
pub mod cache_set_members;
