pub mod cache;
pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod observability;
pub mod services;
pub mod sources;
pub mod utils;
pub mod web;
