use std::{fmt::Debug, time::Instant};

use chrono::{DateTime, Duration, Utc};
use log::*;
use serde_json::Value;

use crate::{
    db_types::{NewDeliveryAttempt, NewOutboxEntry, OutboxEntityType, OutboxEntry, QueueKind},
    sync_api::{
        queue_objects::{OutboxSettings, QueueRunReport},
        SyncApiError,
    },
    traits::{CarrierPlatform, ClaimRequest, DeliveryLog, OutboxStore, Settlement, SyncDatabaseError},
};

/// `OutboxApi` delivers queued outbound events to the carrier platform, with backoff and a retry cap.
///
/// Several workers may process the outbox at the same time. Each claims its entries under a lease, and renews the lease
/// on an entry just before calling the carrier, so an entry is only ever delivered by the worker that holds it. An
/// entry whose lease ran out while earlier entries of the batch were being delivered is left for whoever claimed it.
pub struct OutboxApi<B, P> {
    db: B,
    platform: P,
    settings: OutboxSettings,
    worker_id: String,
}

impl<B, P> Debug for OutboxApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OutboxApi({})", self.worker_id)
    }
}

impl<B, P> OutboxApi<B, P> {
    pub fn new(db: B, platform: P, settings: OutboxSettings) -> Self {
        let worker_id = format!("outbox-{:08x}", rand::random::<u32>());
        Self { db, platform, settings, worker_id }
    }

    pub fn with_worker_id<S: Into<String>>(mut self, worker_id: S) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }
}

impl<B, P> OutboxApi<B, P>
where B: OutboxStore
{
    /// Queues an event for delivery. The retry cap comes from the configured retry policy.
    pub async fn enqueue(
        &self,
        event_type: &str,
        entity_type: OutboxEntityType,
        entity_id: &str,
        payload: Value,
    ) -> Result<OutboxEntry, SyncApiError> {
        let entry = NewOutboxEntry {
            event_type: event_type.to_string(),
            entity_type,
            entity_id: entity_id.to_string(),
            payload,
            max_retries: self.settings.retry.max_retries,
        };
        let entry = self.db.enqueue_outbox_entry(entry).await?;
        debug!("📤️ Queued {} event for {} {} as entry #{}", entry.event_type, entity_type, entry.entity_id, entry.id);
        Ok(entry)
    }
}

impl<B, P> OutboxApi<B, P>
where
    B: OutboxStore + DeliveryLog,
    P: CarrierPlatform,
{
    pub async fn process_due(&self, limit: Option<i64>) -> Result<QueueRunReport, SyncApiError> {
        self.process_due_at(Utc::now(), limit).await
    }

    /// Claims and delivers the entries that are due at `now`.
    pub async fn process_due_at(&self, now: DateTime<Utc>, limit: Option<i64>) -> Result<QueueRunReport, SyncApiError> {
        self.platform.check_credentials().map_err(SyncApiError::from_credentials)?;
        let claim = ClaimRequest {
            worker_id: self.worker_id.clone(),
            now,
            lease: self.settings.lease,
            limit: limit.unwrap_or(self.settings.batch_size),
        };
        let entries = self.db.claim_due_outbox_entries(&claim).await?;
        let mut report = QueueRunReport { claimed: entries.len(), ..Default::default() };
        if entries.is_empty() {
            trace!("📤️ No outbox entries are due");
            return Ok(report);
        }
        debug!("📤️ {} claimed {} outbox entries", self.worker_id, entries.len());
        let started = Instant::now();
        for entry in entries {
            if self.hold_lease(entry.id, clock_since(now, started), &mut report).await {
                self.deliver(entry, now, &mut report).await;
            }
        }
        info!(
            "📤️ Outbox run complete. {} sent, {} rescheduled, {} failed",
            report.succeeded, report.rescheduled, report.failed
        );
        Ok(report)
    }

    async fn hold_lease(&self, id: i64, at: DateTime<Utc>, report: &mut QueueRunReport) -> bool {
        let lease = ClaimRequest { worker_id: self.worker_id.clone(), now: at, lease: self.settings.lease, limit: 1 };
        match self.db.renew_outbox_lease(id, &lease).await {
            Ok(true) => true,
            Ok(false) => {
                warn!("📤️ {} no longer holds entry #{id}. Skipping it.", self.worker_id);
                report.errors.push(format!("Lease lost on entry #{id} before delivery"));
                false
            },
            Err(e) => {
                error!("📤️ Could not renew the lease on entry #{id}. {e}");
                report.errors.push(format!("Entry #{id}: {e}"));
                false
            },
        }
    }

    async fn deliver(&self, entry: OutboxEntry, now: DateTime<Utc>, report: &mut QueueRunReport) {
        let attempt = entry.retry_count + 1;
        let timer = Instant::now();
        let result = self.platform.deliver_event(&entry).await;
        let latency_ms = timer.elapsed().as_millis() as i64;
        let (settlement, http_status) = match result {
            Ok(receipt) => {
                debug!("📤️ Entry #{} delivered with HTTP {}", entry.id, receipt.http_status);
                let response = (!receipt.body.is_empty()).then_some(receipt.body);
                (Settlement::Delivered { response }, Some(i64::from(receipt.http_status)))
            },
            Err(e) => {
                warn!("📤️ Delivery of entry #{} (attempt {attempt}) failed. {e}", entry.id);
                let permanent = self.settings.retry.classify_client_errors && e.is_client_error();
                let settlement =
                    self.settings.retry.settle_failure(attempt, entry.max_retries, &e.to_string(), permanent, now);
                (settlement, e.http_status().map(i64::from))
            },
        };
        let log = NewDeliveryAttempt {
            queue: QueueKind::Outbox,
            entry_id: entry.id,
            attempt,
            success: matches!(settlement, Settlement::Delivered { .. }),
            latency_ms,
            http_status,
            error_message: settlement_error(&settlement),
        };
        if let Err(e) = self.db.record_delivery_attempt(log).await {
            warn!("📤️ Could not record the delivery attempt for entry #{}. {e}", entry.id);
        }
        match self.db.settle_outbox_entry(entry.id, &self.worker_id, &settlement).await {
            Ok(_) => match settlement {
                Settlement::Delivered { .. } => report.succeeded += 1,
                Settlement::Retry { next_retry_at, .. } => {
                    debug!("📤️ Entry #{} will be retried at {next_retry_at}", entry.id);
                    report.rescheduled += 1;
                },
                Settlement::Failed { error, .. } => {
                    error!("📤️ Entry #{} has failed permanently. {error}", entry.id);
                    report.failed += 1;
                },
            },
            Err(SyncDatabaseError::LeaseLost(id)) => {
                warn!("📤️ {} lost its lease on entry #{id} before settling it", self.worker_id);
                report.errors.push(format!("Lease lost on entry #{id}"));
            },
            Err(e) => {
                error!("📤️ Could not settle entry #{}. {e}", entry.id);
                report.errors.push(format!("Entry #{}: {e}", entry.id));
            },
        }
    }
}

/// The batch clock `now`, moved forward by the time spent since `started`.
pub(crate) fn clock_since(now: DateTime<Utc>, started: Instant) -> DateTime<Utc> {
    now + Duration::from_std(started.elapsed()).unwrap_or_else(|_| Duration::zero())
}

pub(crate) fn settlement_error(settlement: &Settlement) -> Option<String> {
    match settlement {
        Settlement::Delivered { .. } => None,
        Settlement::Retry { error, .. } | Settlement::Failed { error, .. } => Some(error.clone()),
    }
}
