use chrono::Utc;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOutboxEntry, OutboxEntry},
    traits::{ClaimRequest, Settlement, SyncDatabaseError},
};

pub async fn insert_outbox_entry(
    entry: NewOutboxEntry,
    conn: &mut SqliteConnection,
) -> Result<OutboxEntry, SyncDatabaseError> {
    let payload = serde_json::to_string(&entry.payload)?;
    let entry: OutboxEntry = sqlx::query_as(
        r#"
            INSERT INTO outbox_entries (event_type, entity_type, entity_id, payload, max_retries, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(entry.event_type)
    .bind(entry.entity_type)
    .bind(entry.entity_id)
    .bind(payload)
    .bind(entry.max_retries)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    trace!("📤️ Outbox entry #{} ({} for {} {}) queued", entry.id, entry.event_type, entry.entity_type, entry.entity_id);
    Ok(entry)
}

/// Claims due entries with a single conditional update, so that the selection and the lease are atomic.
pub async fn claim_due_entries(
    claim: &ClaimRequest,
    conn: &mut SqliteConnection,
) -> Result<Vec<OutboxEntry>, SyncDatabaseError> {
    let mut entries: Vec<OutboxEntry> = sqlx::query_as(
        r#"
            UPDATE outbox_entries SET claimed_by = $1, leased_until = $2, updated_at = $3
            WHERE id IN (
                SELECT id FROM outbox_entries
                WHERE status = 'pending'
                  AND (next_retry_at IS NULL OR next_retry_at <= $3)
                  AND (leased_until IS NULL OR leased_until <= $3)
                ORDER BY COALESCE(next_retry_at, created_at) ASC, id ASC
                LIMIT $4
            )
            RETURNING *;
        "#,
    )
    .bind(&claim.worker_id)
    .bind(claim.leased_until())
    .bind(claim.now)
    .bind(claim.limit)
    .fetch_all(conn)
    .await?;
    entries.sort_by_key(|e| e.id);
    trace!("📤️ {} claimed {} outbox entries", claim.worker_id, entries.len());
    Ok(entries)
}

/// Pushes the lease forward before an external call. Nothing changes if the lease has run out or been taken over.
pub async fn renew_lease(
    id: i64,
    lease: &ClaimRequest,
    conn: &mut SqliteConnection,
) -> Result<bool, SyncDatabaseError> {
    let renewed: Option<i64> = sqlx::query_scalar(
        r#"
            UPDATE outbox_entries SET leased_until = $1, updated_at = $2
            WHERE id = $3 AND claimed_by = $4 AND status = 'pending' AND leased_until > $2
            RETURNING id;
        "#,
    )
    .bind(lease.leased_until())
    .bind(lease.now)
    .bind(id)
    .bind(&lease.worker_id)
    .fetch_optional(conn)
    .await?;
    trace!("📤️ {} renewed its lease on entry #{id}: {}", lease.worker_id, renewed.is_some());
    Ok(renewed.is_some())
}

pub async fn settle_entry(
    id: i64,
    worker_id: &str,
    settlement: &Settlement,
    conn: &mut SqliteConnection,
) -> Result<OutboxEntry, SyncDatabaseError> {
    let now = Utc::now();
    let entry = match settlement {
        Settlement::Delivered { response } => {
            sqlx::query_as(
                r#"
                UPDATE outbox_entries SET
                    status = 'sent',
                    external_response = $1,
                    error_message = NULL,
                    next_retry_at = NULL,
                    claimed_by = NULL,
                    leased_until = NULL,
                    updated_at = $2
                WHERE id = $3 AND claimed_by = $4
                RETURNING *;
                "#,
            )
            .bind(response.clone())
            .bind(now)
            .bind(id)
            .bind(worker_id)
            .fetch_optional(conn)
            .await?
        },
        Settlement::Retry { retry_count, next_retry_at, error } => {
            sqlx::query_as(
                r#"
                UPDATE outbox_entries SET
                    status = 'pending',
                    retry_count = $1,
                    next_retry_at = $2,
                    error_message = $3,
                    claimed_by = NULL,
                    leased_until = NULL,
                    updated_at = $4
                WHERE id = $5 AND claimed_by = $6
                RETURNING *;
                "#,
            )
            .bind(retry_count)
            .bind(next_retry_at)
            .bind(error)
            .bind(now)
            .bind(id)
            .bind(worker_id)
            .fetch_optional(conn)
            .await?
        },
        Settlement::Failed { retry_count, error } => {
            sqlx::query_as(
                r#"
                UPDATE outbox_entries SET
                    status = 'failed',
                    retry_count = $1,
                    next_retry_at = NULL,
                    error_message = $2,
                    claimed_by = NULL,
                    leased_until = NULL,
                    updated_at = $3
                WHERE id = $4 AND claimed_by = $5
                RETURNING *;
                "#,
            )
            .bind(retry_count)
            .bind(error)
            .bind(now)
            .bind(id)
            .bind(worker_id)
            .fetch_optional(conn)
            .await?
        },
    };
    entry.ok_or(SyncDatabaseError::LeaseLost(id))
}

pub async fn fetch_entry(id: i64, conn: &mut SqliteConnection) -> Result<Option<OutboxEntry>, SyncDatabaseError> {
    let entry = sqlx::query_as("SELECT * FROM outbox_entries WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(entry)
}
