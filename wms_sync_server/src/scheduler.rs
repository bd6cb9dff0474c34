use std::{future::Future, sync::Arc, time::Duration};

use log::*;
use tokio::task::JoinHandle;
use wms_sync_engine::{
    sync_api::sync_objects::{StatusMap, SyncRequest},
    DlqApi,
    OrderSyncApi,
    OutboxApi,
    ReconciliationApi,
    SqliteDatabase,
    StatusPollerApi,
};

use crate::{config::ServerConfig, integrations::carrier::CarrierGateway};

/// Starts one periodic job per pipeline worker. Do not await the returned JoinHandles, as they run indefinitely.
///
/// Every job claims its work through the database, so it is safe for the scheduler and the HTTP triggers (or several
/// server instances) to overlap.
pub fn start_scheduler(db: SqliteDatabase, gateway: CarrierGateway, config: &ServerConfig) -> Vec<JoinHandle<()>> {
    let periods = &config.scheduler;
    let orders = Arc::new(OrderSyncApi::new(db.clone(), gateway.clone(), config.sync.clone()));
    let poller = Arc::new(StatusPollerApi::new(db.clone(), gateway.clone(), StatusMap::default()));
    let poll_limit = config.status_poll_limit;
    let outbox = Arc::new(OutboxApi::new(db.clone(), gateway.clone(), config.outbox.clone()));
    let dlq = Arc::new(DlqApi::new(db.clone(), gateway.clone(), config.dlq.clone()));
    let reconciler = Arc::new(ReconciliationApi::new(db, gateway, config.reconciliation.clone()));
    vec![
        spawn_job("order sync", periods.sync_orders, move || {
            let api = Arc::clone(&orders);
            async move {
                match api.sync_orders(SyncRequest::incremental()).await {
                    Ok(r) => info!("🕰️ Order sync run #{} {}: {} imported", r.run_id, r.status, r.import.success_count),
                    Err(e) => error!("🕰️ Error running the order sync job: {e}"),
                }
            }
        }),
        spawn_job("status poll", periods.poll_statuses, move || {
            let api = Arc::clone(&poller);
            async move {
                match api.poll_statuses(poll_limit).await {
                    Ok(r) => info!("🕰️ {} of {} polled orders changed status", r.updated, r.checked),
                    Err(e) => error!("🕰️ Error running the status poll job: {e}"),
                }
            }
        }),
        spawn_job("outbox", periods.process_outbox, move || {
            let api = Arc::clone(&outbox);
            async move {
                match api.process_due(None).await {
                    Ok(r) if r.claimed == 0 => trace!("🕰️ Outbox is empty"),
                    Ok(r) => {
                        info!("🕰️ Outbox: {} sent, {} rescheduled, {} failed", r.succeeded, r.rescheduled, r.failed)
                    },
                    Err(e) => error!("🕰️ Error running the outbox job: {e}"),
                }
            }
        }),
        spawn_job("dlq", periods.process_dlq, move || {
            let api = Arc::clone(&dlq);
            async move {
                match api.process_due(None).await {
                    Ok(r) if r.claimed == 0 => trace!("🕰️ DLQ is empty"),
                    Ok(r) => {
                        info!("🕰️ DLQ: {} resolved, {} rescheduled, {} failed", r.succeeded, r.rescheduled, r.failed)
                    },
                    Err(e) => error!("🕰️ Error running the DLQ job: {e}"),
                }
            }
        }),
        spawn_job("stock reconciliation", periods.reconcile_stock, move || {
            let api = Arc::clone(&reconciler);
            async move {
                match api.reconcile_stock(None).await {
                    Ok(r) => info!("🕰️ {} stock discrepancies in {} products", r.discrepancies, r.checked),
                    Err(e) => error!("🕰️ Error running the stock reconciliation job: {e}"),
                }
            }
        }),
    ]
}

fn spawn_job<F, Fut>(name: &'static str, period: Duration, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        info!("🕰️ {name} job started. Running every {}s", period.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running {name} job");
            job().await;
        }
    })
}
