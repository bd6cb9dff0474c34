//! SQLite backend for the sync pipeline.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
