use chrono::{DateTime, Duration, Utc};
use wms_sync_engine::{
    carrier_types::{ExternalOrder, ShipmentStatus},
    db_types::{OrderStatus, SyncMode, SyncRunStatus},
    rules::{Condition, ExpediteurMatch, Operator},
    sync_api::sync_objects::{
        ErrorLevel,
        ReconciliationSettings,
        StatusMap,
        SyncRequest,
        SyncSettings,
        DEFAULT_POLL_LIMIT,
    },
    test_utils::{
        fake_carrier::FakeCarrier,
        fixtures::{
            external_order,
            seed_carton,
            seed_expediteur,
            seed_product,
            seed_tag_rule,
            seed_transport_rule,
            with_line,
            CLIENT_ID,
        },
        prepare_env::{drop_database, fresh_database},
    },
    traits::{AuditLog, OrderStore},
    ImportApi,
    OrderSyncApi,
    ReconciliationApi,
    SqliteDatabase,
    StatusPollerApi,
    SyncApiError,
};

async fn order_id_for(db: &SqliteDatabase, external_id: &str) -> i64 {
    let known = db.fetch_known_external_orders(&[external_id.to_string()]).await.expect("Error fetching links");
    known.first().map(|k| k.order_id).unwrap_or_else(|| panic!("Order {external_id} was not imported"))
}

/// `count` single-line mug orders with ids `{prefix}1`, `{prefix}2`, …
fn mug_orders<F>(prefix: &str, count: i64, created_at: F) -> Vec<ExternalOrder>
where F: Fn(i64) -> DateTime<Utc> {
    (1..=count)
        .map(|i| with_line(external_order(&format!("{prefix}{i}"), created_at(i)), "MUG-01", 1, 9.0))
        .collect()
}

#[tokio::test]
async fn importing_the_same_batch_twice_creates_each_order_once() {
    let (url, db) = fresh_database().await;
    seed_product(&db, "MUG-01", 0.4, 0.001, 10).await;
    let created = Utc::now() - Duration::days(1);
    let batch = vec![
        with_line(external_order("1001", created), "MUG-01", 2, 12.5),
        with_line(external_order("1002", created), "MUG-01", 1, 12.5),
    ];
    let api = ImportApi::new(db.clone(), CLIENT_ID);

    let first = api.import_batch(batch.clone()).await;
    assert_eq!(first.success_count, 2);
    assert_eq!(first.skipped_count, 0);
    assert!(first.is_clean());

    let second = api.import_batch(batch).await;
    assert_eq!(second.success_count, 0);
    assert_eq!(second.skipped_count, 2);

    let id = order_id_for(&db, "1001").await;
    let order = db.fetch_order(id).await.unwrap().expect("Order should exist");
    assert_eq!(order.status, OrderStatus::Pending);
    assert!((order.total_weight_kg - 0.8).abs() < 1e-9);
    assert_eq!(db.fetch_order_lines(id).await.unwrap().len(), 1);
    let link = db.fetch_external_ref(id).await.unwrap().expect("Order should be linked");
    assert_eq!(link.external_id, "1001");
    drop_database(&url, db).await;
}

#[tokio::test]
async fn one_bad_order_does_not_stop_the_batch() {
    let (url, db) = fresh_database().await;
    seed_product(&db, "MUG-01", 0.4, 0.001, 10).await;
    let created = Utc::now() - Duration::days(1);
    let mut unknown = with_line(external_order("2002", created), "NOPE-99", 1, 3.0);
    unknown = with_line(unknown, "MUG-01", 1, 12.5);
    let batch = vec![
        with_line(external_order("2001", created), "MUG-01", 1, 12.5),
        unknown,
        with_line(external_order("2001", created), "MUG-01", 5, 12.5),
    ];
    let result = ImportApi::new(db.clone(), CLIENT_ID).import_batch(batch).await;
    assert_eq!(result.success_count, 2);
    assert_eq!(result.skipped_count, 1, "the repeated external id is skipped");
    assert_eq!(result.error_count, 1);
    assert_eq!(result.errors[0].level, ErrorLevel::Line);
    assert_eq!(result.errors[0].external_id, "2002");

    let id = order_id_for(&db, "2002").await;
    let lines = db.fetch_order_lines(id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].sku, "MUG-01");
    let first = db.fetch_order_lines(order_id_for(&db, "2001").await).await.unwrap();
    assert_eq!(first[0].quantity, 1, "the first occurrence wins");
    drop_database(&url, db).await;
}

#[tokio::test]
async fn orders_in_a_terminal_state_are_never_reimported() {
    let (url, db) = fresh_database().await;
    seed_product(&db, "MUG-01", 0.4, 0.001, 10).await;
    let order = with_line(external_order("3001", Utc::now()), "MUG-01", 1, 12.5);
    let api = ImportApi::new(db.clone(), CLIENT_ID);
    assert_eq!(api.import_batch(vec![order.clone()]).await.success_count, 1);
    let id = order_id_for(&db, "3001").await;
    let before = db.update_order_status(id, OrderStatus::Delivered).await.unwrap();
    let lines_before = db.fetch_order_lines(id).await.unwrap();
    assert_eq!(lines_before.len(), 1);

    // The carrier now reports the order with an extra line and a different total
    let changed = with_line(order, "MUG-01", 3, 12.5);
    let again = api.import_batch(vec![changed]).await;
    assert_eq!(again.success_count, 0);
    assert_eq!(again.skipped_count, 1);
    assert_eq!(again.error_count, 0);
    let after = db.fetch_order(id).await.unwrap().unwrap();
    assert_eq!(after, before, "the stored order is left exactly as it was");
    assert_eq!(after.status, OrderStatus::Delivered);
    assert_eq!(db.fetch_order_lines(id).await.unwrap(), lines_before);
    drop_database(&url, db).await;
}

#[tokio::test]
async fn rules_are_applied_to_new_orders() {
    let (url, db) = fresh_database().await;
    seed_product(&db, "LAMP-XL", 3.0, 0.01, 4).await;
    seed_tag_rule(&db, 1, vec![Condition::new("country_code", Operator::Equals, "FR")], "domestic").await;
    seed_tag_rule(&db, 2, vec![Condition::new("total_weight", Operator::GreaterThan, 10.0)], "heavy").await;
    seed_transport_rule(&db, 1, vec![Condition::new("total_weight", Operator::GreaterThan, 50.0)], "freight", false)
        .await;
    seed_transport_rule(&db, 2, vec![Condition::new("country_code", Operator::Equals, "FR")], "colissimo", true).await;
    seed_carton(&db, "S", 5_000.0).await;
    seed_carton(&db, "L", 30_000.0).await;
    seed_expediteur(&db, 1, ExpediteurMatch::NameContains("lumière".into()), "Entrepôt Lyon").await;

    let order = with_line(external_order("4001", Utc::now()), "LAMP-XL", 2, 80.0);
    let result = ImportApi::new(db.clone(), CLIENT_ID).import_batch(vec![order]).await;
    assert_eq!(result.success_count, 1);

    let stored = db.fetch_order(order_id_for(&db, "4001").await).await.unwrap().unwrap();
    let tags = stored.tag_set();
    assert!(tags.contains("domestic"));
    assert!(!tags.contains("heavy"));
    assert_eq!(stored.carrier.as_deref(), Some("colissimo"));
    // 0.02 m³ = 20 000 cm³ / 5000 = 4 kg volumetric, 6 kg real
    assert_eq!(stored.volumetric_weight, Some(4.0));
    assert_eq!(stored.billable_weight, Some(6.0));
    assert_eq!(stored.carton_type.as_deref(), Some("L"));
    assert_eq!(stored.expediteur_name.as_deref(), Some("Entrepôt Lyon"));
    assert_eq!(stored.expediteur_city.as_deref(), Some("Lyon"));
    drop_database(&url, db).await;
}

#[tokio::test]
async fn conjunctive_rules_use_the_rule_table_field_names() {
    let (url, db) = fresh_database().await;
    seed_product(&db, "LAMP-XL", 3.0, 0.01, 10).await;
    let conditions = vec![
        Condition::new("poids_total", Operator::GreaterThan, 10.0),
        Condition::new("pays_code", Operator::Equals, "FR"),
    ];
    seed_tag_rule(&db, 1, conditions, "heavy-domestic").await;

    let french = with_line(external_order("4101", Utc::now()), "LAMP-XL", 4, 80.0);
    let mut german = with_line(external_order("4102", Utc::now()), "LAMP-XL", 4, 80.0);
    german.country_code = Some("DE".into());
    let light = with_line(external_order("4103", Utc::now()), "LAMP-XL", 1, 80.0);
    let result = ImportApi::new(db.clone(), CLIENT_ID).import_batch(vec![french, german, light]).await;
    assert_eq!(result.success_count, 3);

    let tagged = |id: &'static str| {
        let db = db.clone();
        async move {
            let stored = db.fetch_order(order_id_for(&db, id).await).await.unwrap().unwrap();
            stored.tag_set().contains("heavy-domestic")
        }
    };
    assert!(tagged("4101").await, "12 kg to FR satisfies both conditions");
    assert!(!tagged("4102").await, "12 kg to DE fails the country condition");
    assert!(!tagged("4103").await, "3 kg to FR fails the weight condition");
    drop_database(&url, db).await;
}

#[tokio::test]
async fn incremental_sync_records_a_successful_run() {
    let (url, db) = fresh_database().await;
    seed_product(&db, "MUG-01", 0.4, 0.001, 10).await;
    let now = Utc::now();
    let carrier = FakeCarrier::new();
    carrier.add_orders(mug_orders("50", 3, |_| now - Duration::days(2)));
    carrier.add_orders([with_line(external_order("old", now - Duration::days(30)), "MUG-01", 1, 9.0)]);
    let api = OrderSyncApi::new(db.clone(), carrier.clone(), SyncSettings { page_size: 2, ..Default::default() });

    let report = api.sync_orders_at(now, SyncRequest::incremental()).await.expect("Sync should succeed");
    assert_eq!(report.status, SyncRunStatus::Success);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.fetched, 3, "orders outside the window are not fetched");
    assert!(!report.truncated);
    assert_eq!(report.import.success_count, 3);

    let runs = db.fetch_sync_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, report.run_id);
    assert_eq!(runs[0].mode, SyncMode::Incremental);
    assert_eq!(runs[0].created_count, 3);
    assert_eq!(runs[0].status, SyncRunStatus::Success);

    let rerun = api.sync_orders_at(now, SyncRequest::incremental()).await.unwrap();
    assert_eq!(rerun.import.success_count, 0);
    assert_eq!(rerun.import.skipped_count, 3);
    drop_database(&url, db).await;
}

#[tokio::test]
async fn sync_stops_at_the_page_ceiling() {
    let (url, db) = fresh_database().await;
    seed_product(&db, "MUG-01", 0.4, 0.001, 10).await;
    let now = Utc::now();
    let carrier = FakeCarrier::new();
    carrier.add_orders(mug_orders("60", 5, |i| now - Duration::hours(i)));
    let settings = SyncSettings { page_size: 2, max_pages: 2, ..Default::default() };
    let api = OrderSyncApi::new(db.clone(), carrier.clone(), settings);

    let report = api.sync_orders_at(now, SyncRequest::full()).await.unwrap();
    assert!(report.truncated);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.fetched, 4);
    assert_eq!(carrier.page_requests(), 2);
    let runs = db.fetch_sync_runs(1).await.unwrap();
    assert!(runs[0].truncated);
    drop_database(&url, db).await;
}

#[tokio::test]
async fn a_failed_page_keeps_the_pages_already_fetched() {
    let (url, db) = fresh_database().await;
    seed_product(&db, "MUG-01", 0.4, 0.001, 10).await;
    let now = Utc::now();
    let carrier = FakeCarrier::new();
    carrier.add_orders(mug_orders("70", 5, |i| now - Duration::hours(i)));
    carrier.fail_page(2);
    let api = OrderSyncApi::new(db.clone(), carrier, SyncSettings { page_size: 2, ..Default::default() });

    let report = api.sync_orders_at(now, SyncRequest::incremental()).await.unwrap();
    assert_eq!(report.status, SyncRunStatus::Partial);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.import.success_count, 2);
    assert!(report.page_error.is_some());
    let runs = db.fetch_sync_runs(1).await.unwrap();
    assert_eq!(runs[0].status, SyncRunStatus::Partial);
    assert!(runs[0].error_message.is_some());
    drop_database(&url, db).await;
}

#[tokio::test]
async fn a_failed_first_page_fails_the_run() {
    let (url, db) = fresh_database().await;
    let carrier = FakeCarrier::new();
    carrier.fail_page(1);
    let api = OrderSyncApi::new(db.clone(), carrier, SyncSettings::default());

    let err = api.sync_orders(SyncRequest::full()).await.expect_err("Sync should fail");
    assert!(matches!(err, SyncApiError::Carrier(_)));
    let runs = db.fetch_sync_runs(1).await.unwrap();
    assert_eq!(runs[0].status, SyncRunStatus::Failed);
    assert_eq!(runs[0].pages_fetched, 0);
    drop_database(&url, db).await;
}

#[tokio::test]
async fn missing_credentials_abort_before_any_work() {
    let (url, db) = fresh_database().await;
    let carrier = FakeCarrier::new().without_credentials();
    let sync = OrderSyncApi::new(db.clone(), carrier.clone(), SyncSettings::default());
    let err = sync.sync_orders(SyncRequest::incremental()).await.expect_err("Sync should not run");
    assert!(matches!(err, SyncApiError::Configuration(_)));
    assert_eq!(carrier.page_requests(), 0);
    assert!(db.fetch_sync_runs(10).await.unwrap().is_empty());

    let poller = StatusPollerApi::new(db.clone(), carrier.clone(), StatusMap::default());
    assert!(matches!(poller.poll_statuses(DEFAULT_POLL_LIMIT).await, Err(SyncApiError::Configuration(_))));
    let reconciler = ReconciliationApi::new(db.clone(), carrier, ReconciliationSettings::default());
    assert!(matches!(reconciler.reconcile_stock(None).await, Err(SyncApiError::Configuration(_))));
    drop_database(&url, db).await;
}

#[tokio::test]
async fn status_poll_moves_orders_forward_and_refreshes_tracking() {
    let (url, db) = fresh_database().await;
    seed_product(&db, "MUG-01", 0.4, 0.001, 10).await;
    let orders = ["8001", "8002", "8003"].map(|id| with_line(external_order(id, Utc::now()), "MUG-01", 1, 9.0));
    ImportApi::new(db.clone(), CLIENT_ID).import_batch(orders.to_vec()).await;
    let carrier = FakeCarrier::new();
    carrier.set_shipment("8001", ShipmentStatus {
        code: 2500,
        tracking_number: Some("6A123".into()),
        tracking_url: Some("https://track.example.com/6A123".into()),
    });
    carrier.set_shipment("8002", ShipmentStatus { code: 3100, tracking_number: None, tracking_url: None });
    let poller = StatusPollerApi::new(db.clone(), carrier.clone(), StatusMap::default());

    let report = poller.poll_statuses(DEFAULT_POLL_LIMIT).await.unwrap();
    assert_eq!(report.checked, 3);
    assert_eq!(report.updated, 2);
    assert_eq!(report.errors.len(), 1, "8003 has no shipment yet");

    let in_transit = order_id_for(&db, "8001").await;
    assert_eq!(db.fetch_order(in_transit).await.unwrap().unwrap().status, OrderStatus::InTransit);
    let link = db.fetch_external_ref(in_transit).await.unwrap().unwrap();
    assert_eq!(link.tracking_number.as_deref(), Some("6A123"));
    assert_eq!(link.external_status_code, Some(2500));
    let delivered = order_id_for(&db, "8002").await;
    assert_eq!(db.fetch_order(delivered).await.unwrap().unwrap().status, OrderStatus::Delivered);

    let again = poller.poll_statuses(DEFAULT_POLL_LIMIT).await.unwrap();
    assert_eq!(again.checked, 2, "delivered orders are no longer polled");
    assert_eq!(again.updated, 0);
    assert_eq!(again.unchanged, 1);
    drop_database(&url, db).await;
}

#[tokio::test]
async fn reconciliation_reports_drift_above_the_threshold() {
    let (url, db) = fresh_database().await;
    seed_product(&db, "MUG-01", 0.4, 0.001, 100).await;
    seed_product(&db, "LAMP-XL", 3.0, 0.01, 40).await;
    let carrier = FakeCarrier::new();
    carrier.set_stock("MUG-01", 85);
    carrier.set_stock("LAMP-XL", 40);
    carrier.set_stock("GHOST", 3);
    let api = ReconciliationApi::new(db.clone(), carrier, ReconciliationSettings::default());

    let lenient = api.reconcile_stock(Some(20.0)).await.unwrap();
    assert_eq!(lenient.checked, 2);
    assert_eq!(lenient.skipped, 1);
    assert_eq!(lenient.discrepancies, 0);

    let strict = api.reconcile_stock(None).await.unwrap();
    assert_eq!(strict.discrepancies, 1);
    let record = &strict.records[0];
    assert_eq!(record.product_ref, "MUG-01");
    assert_eq!(record.stock_local, 100);
    assert_eq!(record.stock_external, 85);
    assert_eq!(record.delta, -15);
    assert!((record.delta_percent - 15.0).abs() < 1e-9);
    assert!(!record.resolved);

    let stored = db.fetch_reconciliation_records(true).await.unwrap();
    assert_eq!(stored.len(), 1);
    let products = db.fetch_products_by_sku(CLIENT_ID, &["MUG-01".to_string()]).await.unwrap();
    assert_eq!(products[0].stock_quantity, 100, "reconciliation never changes stock");
    drop_database(&url, db).await;
}
