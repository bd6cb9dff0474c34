//! # Backend contracts
//!
//! The sync pipeline is storage- and provider-agnostic. This module defines the behaviour a backend needs to expose.
//!
//! ## Storage
//! * [`OrderStore`] owns orders, lines, external links and the product catalogue.
//! * [`RuleStore`] provides read access to the tag, transport and expediteur rule tables and their side tables.
//! * [`OutboxStore`] and [`DlqStore`] are the two durable retry queues. Due rows are *claimed* atomically before any
//!   external I/O, so overlapping workers never process the same row twice.
//! * [`DeliveryLog`] is the append-only history of queue delivery attempts.
//! * [`AuditLog`] records sync runs and stock discrepancies.
//! * [`SyncDatabase`] ties all of the above together for backends that implement everything.
//!
//! ## Carrier platform
//! [`CarrierPlatform`] is the outbound side: order pages, shipments, stock and event delivery.
mod audit_log;
mod carrier_platform;
mod data_objects;
mod order_store;
mod retry_queues;
mod rule_store;
mod sync_database;

pub use audit_log::AuditLog;
pub use carrier_platform::{CarrierError, CarrierPlatform};
pub use data_objects::{ClaimRequest, Settlement};
pub use order_store::OrderStore;
pub use retry_queues::{DeliveryLog, DlqStore, OutboxStore};
pub use rule_store::RuleStore;
pub use sync_database::{SyncDatabase, SyncDatabaseError};
