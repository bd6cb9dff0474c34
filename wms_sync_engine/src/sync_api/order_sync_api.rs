use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    carrier_types::{ExternalOrder, PageCursor, SyncWindow},
    db_types::{NewSyncRun, SyncRunStatus},
    sync_api::{
        sync_objects::{SyncRequest, SyncRunReport, SyncSettings},
        ImportApi,
        SyncApiError,
    },
    traits::{AuditLog, CarrierError, CarrierPlatform, OrderStore, RuleStore},
};

/// `OrderSyncApi` pulls orders from the carrier platform for a date window and imports them.
///
/// Every run is recorded in the sync run log, including runs that fail on the first page.
pub struct OrderSyncApi<B, P> {
    db: B,
    platform: P,
    importer: ImportApi<B>,
    settings: SyncSettings,
}

impl<B, P> Debug for OrderSyncApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderSyncApi({:?})", self.settings)
    }
}

impl<B: Clone, P> OrderSyncApi<B, P> {
    pub fn new(db: B, platform: P, settings: SyncSettings) -> Self {
        let importer = ImportApi::new(db.clone(), settings.client_id);
        Self { db, platform, importer, settings }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }
}

struct FetchOutcome {
    orders: Vec<ExternalOrder>,
    pages: u32,
    truncated: bool,
    error: Option<CarrierError>,
}

impl<B, P> OrderSyncApi<B, P>
where
    B: OrderStore + RuleStore + AuditLog,
    P: CarrierPlatform,
{
    pub async fn sync_orders(&self, request: SyncRequest) -> Result<SyncRunReport, SyncApiError> {
        self.sync_orders_at(Utc::now(), request).await
    }

    /// Runs a sync with the window resolved against `now`.
    pub async fn sync_orders_at(&self, now: DateTime<Utc>, request: SyncRequest) -> Result<SyncRunReport, SyncApiError> {
        self.platform.check_credentials().map_err(SyncApiError::from_credentials)?;
        let window = request.window(&self.settings, now)?;
        info!("🔄️ Starting {} order sync for {} to {}", request.mode, window.start, window.end);
        let fetched = self.fetch_window(&window).await;

        if fetched.pages == 0 {
            let error = fetched.error.unwrap_or_else(|| CarrierError::Transport("No pages were fetched".to_string()));
            error!("🔄️ Order sync failed on the first page. {error}");
            let run = NewSyncRun {
                mode: request.mode,
                window_start: window.start,
                window_end: window.end,
                pages_fetched: 0,
                fetched_count: 0,
                created_count: 0,
                skipped_count: 0,
                failed_count: 0,
                status: SyncRunStatus::Failed,
                truncated: false,
                error_message: Some(error.to_string()),
            };
            if let Err(e) = self.db.record_sync_run(run).await {
                error!("🧾️ Could not record the failed sync run. {e}");
            }
            return Err(SyncApiError::Carrier(error));
        }

        let fetched_count = fetched.orders.len();
        let import = self.importer.import_batch(fetched.orders).await;
        let page_error = fetched.error.map(|e| e.to_string());
        let status = if page_error.is_some() || !import.is_clean() {
            SyncRunStatus::Partial
        } else {
            SyncRunStatus::Success
        };
        let run = NewSyncRun {
            mode: request.mode,
            window_start: window.start,
            window_end: window.end,
            pages_fetched: i64::from(fetched.pages),
            fetched_count: fetched_count as i64,
            created_count: import.success_count as i64,
            skipped_count: import.skipped_count as i64,
            failed_count: import.failed_orders() as i64,
            status,
            truncated: fetched.truncated,
            error_message: page_error.clone(),
        };
        let run = self.db.record_sync_run(run).await?;
        info!(
            "🔄️ Order sync #{} finished with status {status}. {fetched_count} fetched over {} pages, {} created, {} \
             skipped, {} errors",
            run.id, fetched.pages, import.success_count, import.skipped_count, import.error_count
        );
        Ok(SyncRunReport {
            run_id: run.id,
            mode: request.mode,
            window,
            status,
            pages_fetched: fetched.pages,
            fetched: fetched_count,
            truncated: fetched.truncated,
            import,
            page_error,
        })
    }

    /// Reads pages until the listing is exhausted, a page fails, or the page ceiling is hit.
    async fn fetch_window(&self, window: &SyncWindow) -> FetchOutcome {
        let mut outcome = FetchOutcome { orders: vec![], pages: 0, truncated: false, error: None };
        let mut cursor = PageCursor::First;
        loop {
            if outcome.pages >= self.settings.max_pages {
                warn!(
                    "🔄️ Reached the limit of {} pages with more orders remaining. The run is truncated.",
                    self.settings.max_pages
                );
                outcome.truncated = true;
                break;
            }
            match self.platform.fetch_orders_page(window, &cursor, self.settings.page_size).await {
                Ok(page) => {
                    outcome.pages += 1;
                    trace!("🔄️ Page {} holds {} orders", outcome.pages, page.orders.len());
                    outcome.orders.extend(page.orders);
                    match page.next {
                        Some(next) => cursor = PageCursor::Next(next),
                        None => break,
                    }
                },
                Err(e) => {
                    warn!("🔄️ Fetching page {} failed. {e}", outcome.pages + 1);
                    outcome.error = Some(e);
                    break;
                },
            }
        }
        outcome
    }
}
