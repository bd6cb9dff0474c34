use std::{fmt::Debug, time::Instant};

use chrono::{DateTime, Utc};
use log::*;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    db_types::{DlqMessage, NewDeliveryAttempt, NewDlqMessage, ProductUpsert, QueueKind},
    sync_api::{
        outbox_api::{clock_since, settlement_error},
        queue_objects::{
            DlqEventType,
            DlqSettings,
            OrderSyncPayload,
            ProductSyncPayload,
            QueueRunReport,
            UnknownEventPolicy,
        },
        ImportApi,
        SyncApiError,
    },
    traits::{
        CarrierError,
        CarrierPlatform,
        ClaimRequest,
        DeliveryLog,
        DlqStore,
        OrderStore,
        RuleStore,
        Settlement,
        SyncDatabaseError,
    },
};

/// `DlqApi` retries inbound sync jobs that failed the first time round.
///
/// Jobs are dispatched on their event type. `order_sync` re-imports one order from the carrier platform and
/// `product_sync` refreshes one product's catalogue data.
pub struct DlqApi<B, P> {
    db: B,
    platform: P,
    importer: ImportApi<B>,
    settings: DlqSettings,
    worker_id: String,
}

impl<B, P> Debug for DlqApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DlqApi({})", self.worker_id)
    }
}

/// Why a handler could not complete a job.
#[derive(Debug, Clone)]
struct JobFailure {
    message: String,
    permanent: bool,
    http_status: Option<u16>,
}

impl JobFailure {
    fn new<S: Into<String>>(message: S) -> Self {
        Self { message: message.into(), permanent: false, http_status: None }
    }

    fn permanent<S: Into<String>>(message: S) -> Self {
        Self { message: message.into(), permanent: true, http_status: None }
    }
}

impl From<SyncDatabaseError> for JobFailure {
    fn from(e: SyncDatabaseError) -> Self {
        Self::new(e.to_string())
    }
}

impl<B: Clone, P> DlqApi<B, P> {
    pub fn new(db: B, platform: P, settings: DlqSettings) -> Self {
        let importer = ImportApi::new(db.clone(), settings.client_id);
        let worker_id = format!("dlq-{:08x}", rand::random::<u32>());
        Self { db, platform, importer, settings, worker_id }
    }
}

impl<B, P> DlqApi<B, P> {
    pub fn with_worker_id<S: Into<String>>(mut self, worker_id: S) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }
}

impl<B, P> DlqApi<B, P>
where B: DlqStore
{
    /// Parks a failed job on the queue. It becomes due immediately.
    pub async fn enqueue(&self, event_type: &str, payload: Value) -> Result<DlqMessage, SyncApiError> {
        let message =
            NewDlqMessage { event_type: event_type.to_string(), payload, max_retries: self.settings.retry.max_retries };
        let message = self.db.enqueue_dlq_message(message).await?;
        debug!("📥️ Queued {} job as DLQ message #{}", message.event_type, message.id);
        Ok(message)
    }
}

impl<B, P> DlqApi<B, P>
where
    B: OrderStore + RuleStore + DlqStore + DeliveryLog,
    P: CarrierPlatform,
{
    pub async fn process_due(&self, limit: Option<i64>) -> Result<QueueRunReport, SyncApiError> {
        self.process_due_at(Utc::now(), limit).await
    }

    /// Claims and retries the messages that are due at `now`.
    pub async fn process_due_at(&self, now: DateTime<Utc>, limit: Option<i64>) -> Result<QueueRunReport, SyncApiError> {
        self.platform.check_credentials().map_err(SyncApiError::from_credentials)?;
        let claim = ClaimRequest {
            worker_id: self.worker_id.clone(),
            now,
            lease: self.settings.lease,
            limit: limit.unwrap_or(self.settings.batch_size),
        };
        let messages = self.db.claim_due_dlq_messages(&claim).await?;
        let mut report = QueueRunReport { claimed: messages.len(), ..Default::default() };
        if messages.is_empty() {
            trace!("📥️ No DLQ messages are due");
            return Ok(report);
        }
        debug!("📥️ {} claimed {} DLQ messages", self.worker_id, messages.len());
        let started = Instant::now();
        for message in messages {
            if self.hold_lease(message.id, clock_since(now, started), &mut report).await {
                self.retry(message, now, &mut report).await;
            }
        }
        info!(
            "📥️ DLQ run complete. {} succeeded, {} rescheduled, {} failed",
            report.succeeded, report.rescheduled, report.failed
        );
        Ok(report)
    }

    async fn hold_lease(&self, id: i64, at: DateTime<Utc>, report: &mut QueueRunReport) -> bool {
        let lease = ClaimRequest { worker_id: self.worker_id.clone(), now: at, lease: self.settings.lease, limit: 1 };
        match self.db.renew_dlq_lease(id, &lease).await {
            Ok(true) => true,
            Ok(false) => {
                warn!("📥️ {} no longer holds DLQ message #{id}. Skipping it.", self.worker_id);
                report.errors.push(format!("Lease lost on DLQ message #{id} before retrying it"));
                false
            },
            Err(e) => {
                error!("📥️ Could not renew the lease on DLQ message #{id}. {e}");
                report.errors.push(format!("DLQ message #{id}: {e}"));
                false
            },
        }
    }

    async fn retry(&self, message: DlqMessage, now: DateTime<Utc>, report: &mut QueueRunReport) {
        let attempt = message.retry_count + 1;
        let timer = Instant::now();
        let result = self.dispatch(&message).await;
        let latency_ms = timer.elapsed().as_millis() as i64;
        let (settlement, http_status) = match result {
            Ok(()) => (Settlement::Delivered { response: None }, None),
            Err(failure) => {
                warn!(
                    "📥️ Retry of {} message #{} (attempt {attempt}) failed. {}",
                    message.event_type, message.id, failure.message
                );
                let settlement = self.settings.retry.settle_failure(
                    attempt,
                    message.max_retries,
                    &failure.message,
                    failure.permanent,
                    now,
                );
                (settlement, failure.http_status.map(i64::from))
            },
        };
        let log = NewDeliveryAttempt {
            queue: QueueKind::Dlq,
            entry_id: message.id,
            attempt,
            success: matches!(settlement, Settlement::Delivered { .. }),
            latency_ms,
            http_status,
            error_message: settlement_error(&settlement),
        };
        if let Err(e) = self.db.record_delivery_attempt(log).await {
            warn!("📥️ Could not record the attempt for DLQ message #{}. {e}", message.id);
        }
        match self.db.settle_dlq_message(message.id, &self.worker_id, &settlement).await {
            Ok(_) => match settlement {
                Settlement::Delivered { .. } => report.succeeded += 1,
                Settlement::Retry { next_retry_at, .. } => {
                    debug!("📥️ DLQ message #{} will be retried at {next_retry_at}", message.id);
                    report.rescheduled += 1;
                },
                Settlement::Failed { error, .. } => {
                    error!("📥️ DLQ message #{} has failed permanently. {error}", message.id);
                    report.failed += 1;
                },
            },
            Err(SyncDatabaseError::LeaseLost(id)) => {
                warn!("📥️ {} lost its lease on DLQ message #{id} before settling it", self.worker_id);
                report.errors.push(format!("Lease lost on DLQ message #{id}"));
            },
            Err(e) => {
                error!("📥️ Could not settle DLQ message #{}. {e}", message.id);
                report.errors.push(format!("DLQ message #{}: {e}", message.id));
            },
        }
    }

    async fn dispatch(&self, message: &DlqMessage) -> Result<(), JobFailure> {
        match DlqEventType::parse(&message.event_type) {
            DlqEventType::OrderSync => {
                let payload = parse_payload::<OrderSyncPayload>(message)?;
                self.retry_order_sync(&payload.external_id).await
            },
            DlqEventType::ProductSync => {
                let payload = parse_payload::<ProductSyncPayload>(message)?;
                self.retry_product_sync(&payload.sku).await
            },
            DlqEventType::Unknown(event_type) => {
                let msg = format!("No handler for event type '{event_type}'");
                match self.settings.unknown_event_policy {
                    UnknownEventPolicy::Retry => Err(JobFailure::new(msg)),
                    UnknownEventPolicy::FailImmediately => Err(JobFailure::permanent(msg)),
                }
            },
        }
    }

    async fn retry_order_sync(&self, external_id: &str) -> Result<(), JobFailure> {
        let order = self.platform.fetch_order(external_id).await.map_err(|e| self.carrier_failure(e))?;
        let result = self.importer.import_batch(vec![order]).await;
        if result.failed_orders() > 0 {
            let messages = result.errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>().join("; ");
            return Err(JobFailure::new(messages));
        }
        debug!(
            "📥️ Order {external_id} re-synced. {} created, {} skipped",
            result.success_count, result.skipped_count
        );
        Ok(())
    }

    async fn retry_product_sync(&self, sku: &str) -> Result<(), JobFailure> {
        let product = self.platform.fetch_product(sku).await.map_err(|e| self.carrier_failure(e))?;
        let upsert = ProductUpsert {
            client_id: self.settings.client_id,
            sku: product.sku,
            name: product.name,
            unit_weight_kg: product.weight_kg,
            volume_m3: product.volume_m3,
            external_id: Some(product.external_id),
        };
        let product = self.db.upsert_product(upsert).await?;
        debug!("📦️ Product {} refreshed from the carrier platform", product.sku);
        Ok(())
    }

    fn carrier_failure(&self, e: CarrierError) -> JobFailure {
        JobFailure {
            message: e.to_string(),
            permanent: self.settings.retry.classify_client_errors && e.is_client_error(),
            http_status: e.http_status(),
        }
    }
}

fn parse_payload<T: DeserializeOwned>(message: &DlqMessage) -> Result<T, JobFailure> {
    serde_json::from_str(&message.payload)
        .map_err(|e| JobFailure::new(format!("Invalid {} payload: {e}", message.event_type)))
}
