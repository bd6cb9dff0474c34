use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewReconciliationRecord, NewSyncRun, ReconciliationRecord, SyncRun},
    traits::SyncDatabaseError,
};

pub async fn insert_sync_run(run: NewSyncRun, conn: &mut SqliteConnection) -> Result<SyncRun, SyncDatabaseError> {
    let run: SyncRun = sqlx::query_as(
        r#"
            INSERT INTO sync_runs (
                mode,
                window_start,
                window_end,
                pages_fetched,
                fetched_count,
                created_count,
                skipped_count,
                failed_count,
                status,
                truncated,
                error_message,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(run.mode)
    .bind(run.window_start)
    .bind(run.window_end)
    .bind(run.pages_fetched)
    .bind(run.fetched_count)
    .bind(run.created_count)
    .bind(run.skipped_count)
    .bind(run.failed_count)
    .bind(run.status)
    .bind(run.truncated)
    .bind(run.error_message)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🧾️ Sync run #{} recorded ({:?})", run.id, run.status);
    Ok(run)
}

pub async fn fetch_sync_runs(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<SyncRun>, SyncDatabaseError> {
    let runs = sqlx::query_as("SELECT * FROM sync_runs ORDER BY id DESC LIMIT $1").bind(limit).fetch_all(conn).await?;
    Ok(runs)
}

pub async fn insert_reconciliation_record(
    record: NewReconciliationRecord,
    conn: &mut SqliteConnection,
) -> Result<ReconciliationRecord, SyncDatabaseError> {
    let record = sqlx::query_as(
        r#"
            INSERT INTO reconciliation_records (product_ref, stock_local, stock_external, delta, delta_percent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(record.product_ref)
    .bind(record.stock_local)
    .bind(record.stock_external)
    .bind(record.delta)
    .bind(record.delta_percent)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(record)
}

pub async fn fetch_reconciliation_records(
    unresolved_only: bool,
    conn: &mut SqliteConnection,
) -> Result<Vec<ReconciliationRecord>, SyncDatabaseError> {
    let sql = if unresolved_only {
        "SELECT * FROM reconciliation_records WHERE resolved = 0 ORDER BY id"
    } else {
        "SELECT * FROM reconciliation_records ORDER BY id"
    };
    let records = sqlx::query_as(sql).fetch_all(conn).await?;
    Ok(records)
}
