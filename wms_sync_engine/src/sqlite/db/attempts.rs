use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{DeliveryAttempt, NewDeliveryAttempt, QueueKind},
    traits::SyncDatabaseError,
};

pub async fn insert_attempt(
    attempt: NewDeliveryAttempt,
    conn: &mut SqliteConnection,
) -> Result<DeliveryAttempt, SyncDatabaseError> {
    let attempt = sqlx::query_as(
        r#"
            INSERT INTO delivery_attempts (
                queue,
                entry_id,
                attempt,
                success,
                latency_ms,
                http_status,
                error_message,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(attempt.queue)
    .bind(attempt.entry_id)
    .bind(attempt.attempt)
    .bind(attempt.success)
    .bind(attempt.latency_ms)
    .bind(attempt.http_status)
    .bind(attempt.error_message)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(attempt)
}

pub async fn fetch_attempts(
    queue: QueueKind,
    entry_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<DeliveryAttempt>, SyncDatabaseError> {
    let attempts = sqlx::query_as("SELECT * FROM delivery_attempts WHERE queue = $1 AND entry_id = $2 ORDER BY id")
        .bind(queue)
        .bind(entry_id)
        .fetch_all(conn)
        .await?;
    Ok(attempts)
}
