use crate::{
    db_types::{NewReconciliationRecord, NewSyncRun, ReconciliationRecord, SyncRun},
    traits::SyncDatabaseError,
};

/// Write-once audit rows: one per order sync run, and one per detected stock discrepancy.
#[allow(async_fn_in_trait)]
pub trait AuditLog {
    async fn record_sync_run(&self, run: NewSyncRun) -> Result<SyncRun, SyncDatabaseError>;

    /// The most recent runs, newest first.
    async fn fetch_sync_runs(&self, limit: i64) -> Result<Vec<SyncRun>, SyncDatabaseError>;

    async fn insert_reconciliation_record(
        &self,
        record: NewReconciliationRecord,
    ) -> Result<ReconciliationRecord, SyncDatabaseError>;

    async fn fetch_reconciliation_records(
        &self,
        unresolved_only: bool,
    ) -> Result<Vec<ReconciliationRecord>, SyncDatabaseError>;
}
