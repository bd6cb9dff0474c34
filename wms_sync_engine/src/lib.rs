//! WMS Sync Engine
//!
//! The sync engine keeps the warehouse management system's local order and stock state in step with a third-party
//! carrier platform. This library contains the core logic and is provider-agnostic.
//!
//! The library is divided into these main sections:
//! 1. Backend contracts ([`mod@traits`]). Storage backends and carrier adapters implement these. SQLite is the
//!    supported storage backend ([`SqliteDatabase`]). The data types stored by backends live in [`mod@db_types`], and
//!    the provider-neutral carrier types in [`mod@carrier_types`].
//! 2. Rule evaluation ([`mod@rules`]). The deterministic condition evaluator and parcel maths that derive carrier, tag
//!    and sender assignments from order attributes.
//! 3. The public sync API ([`mod@sync_api`]). Order sync and import, rule application, status polling, the outbox and
//!    DLQ workers and stock reconciliation.
pub mod carrier_types;
pub mod db_types;
pub mod rules;
pub mod sync_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, SqliteDatabase};
pub use sync_api::{
    DlqApi,
    ImportApi,
    OrderSyncApi,
    OutboxApi,
    ReconciliationApi,
    RetryPolicy,
    RulesApi,
    StatusPollerApi,
    SyncApiError,
};
pub use traits::{CarrierError, CarrierPlatform, SyncDatabase, SyncDatabaseError};
