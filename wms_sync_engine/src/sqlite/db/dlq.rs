use chrono::Utc;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{DlqMessage, NewDlqMessage},
    traits::{ClaimRequest, Settlement, SyncDatabaseError},
};

pub async fn insert_message(message: NewDlqMessage, conn: &mut SqliteConnection) -> Result<DlqMessage, SyncDatabaseError> {
    let payload = serde_json::to_string(&message.payload)?;
    let message: DlqMessage = sqlx::query_as(
        r#"
            INSERT INTO dlq_messages (event_type, payload, max_retries, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *;
        "#,
    )
    .bind(message.event_type)
    .bind(payload)
    .bind(message.max_retries)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    trace!("📥️ DLQ message #{} ({}) queued", message.id, message.event_type);
    Ok(message)
}

/// Claims due messages and marks them `retrying` in the same statement.
///
/// A message is due when it is pending and its retry time has passed, or when it was left in `retrying` by a worker
/// whose lease has since expired.
pub async fn claim_due_messages(
    claim: &ClaimRequest,
    conn: &mut SqliteConnection,
) -> Result<Vec<DlqMessage>, SyncDatabaseError> {
    let mut messages: Vec<DlqMessage> = sqlx::query_as(
        r#"
            UPDATE dlq_messages SET status = 'retrying', claimed_by = $1, leased_until = $2, updated_at = $3
            WHERE id IN (
                SELECT id FROM dlq_messages
                WHERE status IN ('pending', 'retrying')
                  AND (leased_until IS NULL OR leased_until <= $3)
                  AND (status = 'retrying' OR next_retry_at IS NULL OR next_retry_at <= $3)
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
    messages.sort_by_key(|m| m.id);
    trace!("📥️ {} claimed {} DLQ messages", claim.worker_id, messages.len());
    Ok(messages)
}

pub async fn renew_lease(
    id: i64,
    lease: &ClaimRequest,
    conn: &mut SqliteConnection,
) -> Result<bool, SyncDatabaseError> {
    let renewed: Option<i64> = sqlx::query_scalar(
        r#"
            UPDATE dlq_messages SET leased_until = $1, updated_at = $2
            WHERE id = $3 AND claimed_by = $4 AND status = 'retrying' AND leased_until > $2
            RETURNING id;
        "#,
    )
    .bind(lease.leased_until())
    .bind(lease.now)
    .bind(id)
    .bind(&lease.worker_id)
    .fetch_optional(conn)
    .await?;
    trace!("📥️ {} renewed its lease on DLQ message #{id}: {}", lease.worker_id, renewed.is_some());
    Ok(renewed.is_some())
}

pub async fn settle_message(
    id: i64,
    worker_id: &str,
    settlement: &Settlement,
    conn: &mut SqliteConnection,
) -> Result<DlqMessage, SyncDatabaseError> {
    let now = Utc::now();
    let message = match settlement {
        Settlement::Delivered { .. } => {
            sqlx::query_as(
                r#"
                UPDATE dlq_messages SET
                    status = 'success',
                    error_message = NULL,
                    next_retry_at = NULL,
                    claimed_by = NULL,
                    leased_until = NULL,
                    updated_at = $1
                WHERE id = $2 AND claimed_by = $3
                RETURNING *;
                "#,
            )
            .bind(now)
            .bind(id)
            .bind(worker_id)
            .fetch_optional(conn)
            .await?
        },
        Settlement::Retry { retry_count, next_retry_at, error } => {
            sqlx::query_as(
                r#"
                UPDATE dlq_messages SET
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
                UPDATE dlq_messages SET
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
    message.ok_or(SyncDatabaseError::LeaseLost(id))
}

pub async fn fetch_message(id: i64, conn: &mut SqliteConnection) -> Result<Option<DlqMessage>, SyncDatabaseError> {
    let message = sqlx::query_as("SELECT * FROM dlq_messages WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(message)
}
