//! The public API of the sync engine.
//!
//! Each service is a stateless unit of work that can be triggered on demand or on a schedule:
//! * [`OrderSyncApi`] pages through carrier orders for a window and hands them to the [`ImportApi`].
//! * [`RulesApi`] derives tags, carrier, parcel metrics and sender address for an order.
//! * [`StatusPollerApi`] refreshes open orders from their carrier shipment status.
//! * [`OutboxApi`] and [`DlqApi`] drain the two durable retry queues.
//! * [`ReconciliationApi`] reports stock drift between the local catalogue and the carrier.
//!
//! All services are generic over their storage backend and the carrier platform, so that either can be swapped or
//! mocked.
mod errors;
mod retry_policy;

pub mod dlq_api;
pub mod import_api;
pub mod order_sync_api;
pub mod outbox_api;
pub mod queue_objects;
pub mod reconciliation_api;
pub mod rules_api;
pub mod status_api;
pub mod sync_objects;

pub use dlq_api::DlqApi;
pub use errors::SyncApiError;
pub use import_api::ImportApi;
pub use order_sync_api::OrderSyncApi;
pub use outbox_api::OutboxApi;
pub use reconciliation_api::{percent_difference, ReconciliationApi};
pub use retry_policy::{RetryPolicy, DEFAULT_BASE_DELAY_MINS, DEFAULT_MAX_RETRIES, MAX_RETRIES_MARKER, NON_RETRYABLE_MARKER};
pub use rules_api::RulesApi;
pub use status_api::StatusPollerApi;
