use chrono::{DateTime, Utc};
use cucumber::World;
use log::*;
use wms_sync_engine::{
    db_types::OutboxEntry,
    sync_api::{
        queue_objects::{OutboxSettings, QueueRunReport},
        sync_objects::SyncRunReport,
    },
    test_utils::{fake_carrier::FakeCarrier, prepare_env::fresh_database},
    OutboxApi,
    SqliteDatabase,
    SyncApiError,
};

#[derive(Default, Debug, World)]
pub struct SyncWorld {
    pub system: Option<SyncSystem>,
}

/// Everything a scenario touches: a throwaway database, a scripted carrier and a controllable clock.
#[derive(Debug)]
pub struct SyncSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub carrier: FakeCarrier,
    pub outbox: OutboxApi<SqliteDatabase, FakeCarrier>,
    pub now: DateTime<Utc>,
    pub next_order: u32,
    pub last_sync: Option<Result<SyncRunReport, SyncApiError>>,
    pub last_outbox_run: Option<QueueRunReport>,
    pub events: Vec<(String, OutboxEntry)>,
}

impl SyncWorld {
    pub fn system(&mut self) -> &mut SyncSystem {
        self.system.as_mut().expect("The scenario has no database. Start with 'Given a fresh warehouse database'")
    }
}

impl SyncSystem {
    pub async fn new() -> Self {
        let (db_path, db) = fresh_database().await;
        debug!("🚀️ Created database: {db_path}");
        let carrier = FakeCarrier::new();
        let outbox = OutboxApi::new(db.clone(), carrier.clone(), OutboxSettings::default());
        Self {
            db_path,
            db,
            carrier,
            outbox,
            now: Utc::now(),
            next_order: 1,
            last_sync: None,
            last_outbox_run: None,
            events: vec![],
        }
    }

    pub fn sync_report(&self) -> &SyncRunReport {
        match &self.last_sync {
            Some(Ok(report)) => report,
            Some(Err(e)) => panic!("The last sync failed: {e}"),
            None => panic!("No sync has been run"),
        }
    }

    pub fn event_for(&self, order: &str) -> &OutboxEntry {
        self.events
            .iter()
            .find(|(id, _)| id == order)
            .map(|(_, e)| e)
            .unwrap_or_else(|| panic!("No outbox event was queued for order {order}"))
    }
}
