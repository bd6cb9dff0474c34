//! `SqliteDatabase` is a concrete implementation of a sync pipeline backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sqlx::SqlitePool;

use super::db::{attempts, audit, db_url, dlq, new_pool, orders, outbox, products, rules};
use crate::{
    db_types::{
        CartonType,
        DeliveryAttempt,
        DerivedFieldsUpdate,
        DlqMessage,
        ExternalOrderRef,
        KnownExternalOrder,
        LinkedOrder,
        NewDeliveryAttempt,
        NewDlqMessage,
        NewOrder,
        NewOrderLine,
        NewOutboxEntry,
        NewReconciliationRecord,
        NewSyncRun,
        Order,
        OrderLine,
        OrderStatus,
        OutboxEntry,
        Product,
        ProductUpsert,
        QueueKind,
        ReconciliationRecord,
        SenderAddress,
        SyncRun,
        TrackingUpdate,
    },
    rules::{ExpediteurRule, TagRule, TransportRule},
    traits::{
        AuditLog,
        ClaimRequest,
        DeliveryLog,
        DlqStore,
        OrderStore,
        OutboxStore,
        RuleStore,
        Settlement,
        SyncDatabase,
        SyncDatabaseError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SyncDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl OrderStore for SqliteDatabase {
    async fn fetch_known_external_orders(
        &self,
        external_ids: &[String],
    ) -> Result<Vec<KnownExternalOrder>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_known_external_orders(external_ids, &mut conn).await
    }

    /// Takes a new order, and in a single atomic transaction,
    /// * inserts the order with status `pending`,
    /// * inserts every matched line,
    /// * links the order to `external_id`.
    ///
    /// If any step fails, nothing is written.
    async fn create_linked_order(
        &self,
        order: NewOrder,
        lines: Vec<NewOrderLine>,
        external_id: &str,
    ) -> Result<Order, SyncDatabaseError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, now, &mut tx).await?;
        let line_count = lines.len();
        for line in lines {
            orders::insert_order_line(order.id, line, now, &mut tx).await?;
        }
        orders::insert_external_ref(order.id, external_id, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order} created with {line_count} lines, linked to external order {external_id}");
        Ok(order)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_lines(order_id, &mut conn).await
    }

    async fn fetch_external_ref(&self, order_id: i64) -> Result<Option<ExternalOrderRef>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_external_ref(order_id, &mut conn).await
    }

    async fn update_derived_fields(
        &self,
        order_id: i64,
        update: &DerivedFieldsUpdate,
    ) -> Result<Order, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_derived_fields(order_id, update, &mut conn).await
    }

    async fn fetch_pollable_orders(&self, limit: i64) -> Result<Vec<LinkedOrder>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_pollable_orders(limit, &mut conn).await
    }

    async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> Result<Order, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_status(order_id, status, &mut conn).await
    }

    async fn update_tracking(
        &self,
        order_id: i64,
        update: &TrackingUpdate,
    ) -> Result<ExternalOrderRef, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_tracking(order_id, update, &mut conn).await
    }

    async fn fetch_products_by_sku(&self, client_id: i64, skus: &[String]) -> Result<Vec<Product>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_products_by_sku(client_id, skus, &mut conn).await
    }

    async fn upsert_product(&self, product: ProductUpsert) -> Result<Product, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        products::upsert_product(product, &mut conn).await
    }
}

impl RuleStore for SqliteDatabase {
    async fn fetch_tag_rules(&self) -> Result<Vec<TagRule>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        rules::fetch_tag_rules(&mut conn).await
    }

    async fn fetch_transport_rules(&self) -> Result<Vec<TransportRule>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        rules::fetch_transport_rules(&mut conn).await
    }

    async fn fetch_expediteur_rules(&self, client_id: i64) -> Result<Vec<ExpediteurRule>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        rules::fetch_expediteur_rules(client_id, &mut conn).await
    }

    async fn fetch_carton_types(&self) -> Result<Vec<CartonType>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        rules::fetch_carton_types(&mut conn).await
    }

    async fn fetch_sender_address(&self, id: i64) -> Result<Option<SenderAddress>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        rules::fetch_sender_address(id, &mut conn).await
    }
}

impl OutboxStore for SqliteDatabase {
    async fn enqueue_outbox_entry(&self, entry: NewOutboxEntry) -> Result<OutboxEntry, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        outbox::insert_outbox_entry(entry, &mut conn).await
    }

    async fn claim_due_outbox_entries(&self, claim: &ClaimRequest) -> Result<Vec<OutboxEntry>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        outbox::claim_due_entries(claim, &mut conn).await
    }

    async fn renew_outbox_lease(&self, id: i64, lease: &ClaimRequest) -> Result<bool, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        outbox::renew_lease(id, lease, &mut conn).await
    }

    async fn settle_outbox_entry(
        &self,
        id: i64,
        worker_id: &str,
        settlement: &Settlement,
    ) -> Result<OutboxEntry, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        outbox::settle_entry(id, worker_id, settlement, &mut conn).await
    }

    async fn fetch_outbox_entry(&self, id: i64) -> Result<Option<OutboxEntry>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        outbox::fetch_entry(id, &mut conn).await
    }
}

impl DlqStore for SqliteDatabase {
    async fn enqueue_dlq_message(&self, message: NewDlqMessage) -> Result<DlqMessage, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        dlq::insert_message(message, &mut conn).await
    }

    async fn claim_due_dlq_messages(&self, claim: &ClaimRequest) -> Result<Vec<DlqMessage>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        dlq::claim_due_messages(claim, &mut conn).await
    }

    async fn renew_dlq_lease(&self, id: i64, lease: &ClaimRequest) -> Result<bool, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        dlq::renew_lease(id, lease, &mut conn).await
    }

    async fn settle_dlq_message(
        &self,
        id: i64,
        worker_id: &str,
        settlement: &Settlement,
    ) -> Result<DlqMessage, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        dlq::settle_message(id, worker_id, settlement, &mut conn).await
    }

    async fn fetch_dlq_message(&self, id: i64) -> Result<Option<DlqMessage>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        dlq::fetch_message(id, &mut conn).await
    }
}

impl DeliveryLog for SqliteDatabase {
    async fn record_delivery_attempt(&self, attempt: NewDeliveryAttempt) -> Result<DeliveryAttempt, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        attempts::insert_attempt(attempt, &mut conn).await
    }

    async fn fetch_delivery_attempts(
        &self,
        queue: QueueKind,
        entry_id: i64,
    ) -> Result<Vec<DeliveryAttempt>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        attempts::fetch_attempts(queue, entry_id, &mut conn).await
    }
}

impl AuditLog for SqliteDatabase {
    async fn record_sync_run(&self, run: NewSyncRun) -> Result<SyncRun, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        audit::insert_sync_run(run, &mut conn).await
    }

    async fn fetch_sync_runs(&self, limit: i64) -> Result<Vec<SyncRun>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        audit::fetch_sync_runs(limit, &mut conn).await
    }

    async fn insert_reconciliation_record(
        &self,
        record: NewReconciliationRecord,
    ) -> Result<ReconciliationRecord, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        audit::insert_reconciliation_record(record, &mut conn).await
    }

    async fn fetch_reconciliation_records(
        &self,
        unresolved_only: bool,
    ) -> Result<Vec<ReconciliationRecord>, SyncDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        audit::fetch_reconciliation_records(unresolved_only, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs the embedded migrations against this database.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }
}
