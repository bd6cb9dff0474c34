//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod attempts;
pub mod audit;
pub mod dlq;
pub mod orders;
pub mod outbox;
pub mod products;
pub mod rules;

const SQLITE_DB_URL: &str = "sqlite://data/wms_sync.db";

pub fn db_url() -> String {
    let result = wms_common::env_or_default("WMS_DATABASE_URL", SQLITE_DB_URL.to_string());
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
