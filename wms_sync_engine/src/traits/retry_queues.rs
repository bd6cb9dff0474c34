use crate::{
    db_types::{
        DeliveryAttempt,
        DlqMessage,
        NewDeliveryAttempt,
        NewDlqMessage,
        NewOutboxEntry,
        OutboxEntry,
        QueueKind,
    },
    traits::{ClaimRequest, Settlement, SyncDatabaseError},
};

/// The outbound event queue.
#[allow(async_fn_in_trait)]
pub trait OutboxStore {
    async fn enqueue_outbox_entry(&self, entry: NewOutboxEntry) -> Result<OutboxEntry, SyncDatabaseError>;

    /// Atomically claims up to `claim.limit` due pending entries. Two overlapping callers never receive the same row.
    async fn claim_due_outbox_entries(&self, claim: &ClaimRequest) -> Result<Vec<OutboxEntry>, SyncDatabaseError>;

    /// Extends the lease on a pending entry to `lease.leased_until()`, provided `lease.worker_id` still holds an
    /// unexpired lease on it at `lease.now`. Returns `false`, and changes nothing, otherwise.
    async fn renew_outbox_lease(&self, id: i64, lease: &ClaimRequest) -> Result<bool, SyncDatabaseError>;

    /// Records the outcome of an attempt on an entry claimed by `worker_id`, and releases the lease.
    ///
    /// Fails with [`SyncDatabaseError::LeaseLost`] if the entry is no longer claimed by `worker_id`.
    async fn settle_outbox_entry(
        &self,
        id: i64,
        worker_id: &str,
        settlement: &Settlement,
    ) -> Result<OutboxEntry, SyncDatabaseError>;

    async fn fetch_outbox_entry(&self, id: i64) -> Result<Option<OutboxEntry>, SyncDatabaseError>;
}

/// The inbound job retry queue.
#[allow(async_fn_in_trait)]
pub trait DlqStore {
    async fn enqueue_dlq_message(&self, message: NewDlqMessage) -> Result<DlqMessage, SyncDatabaseError>;

    /// Atomically claims up to `claim.limit` due messages and moves them to `retrying` in the same statement.
    /// Messages left in `retrying` by a worker whose lease has expired are due again.
    async fn claim_due_dlq_messages(&self, claim: &ClaimRequest) -> Result<Vec<DlqMessage>, SyncDatabaseError>;

    /// Extends the lease on a `retrying` message still held by `lease.worker_id`. See
    /// [`OutboxStore::renew_outbox_lease`].
    async fn renew_dlq_lease(&self, id: i64, lease: &ClaimRequest) -> Result<bool, SyncDatabaseError>;

    async fn settle_dlq_message(
        &self,
        id: i64,
        worker_id: &str,
        settlement: &Settlement,
    ) -> Result<DlqMessage, SyncDatabaseError>;

    async fn fetch_dlq_message(&self, id: i64) -> Result<Option<DlqMessage>, SyncDatabaseError>;
}

/// Append-only history of every delivery attempt made by either queue worker.
#[allow(async_fn_in_trait)]
pub trait DeliveryLog {
    async fn record_delivery_attempt(&self, attempt: NewDeliveryAttempt) -> Result<DeliveryAttempt, SyncDatabaseError>;

    async fn fetch_delivery_attempts(
        &self,
        queue: QueueKind,
        entry_id: i64,
    ) -> Result<Vec<DeliveryAttempt>, SyncDatabaseError>;
}
