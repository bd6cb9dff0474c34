use actix_web::{http::StatusCode, web};
use chrono::{Duration, Utc};
use serde_json::json;
use wms_sync_engine::{
    carrier_types::{ExternalStock, OrderPage, PageCursor},
    sync_api::sync_objects::{ReconciliationSettings, StatusMap, SyncSettings},
    test_utils::{
        fixtures::{external_order, seed_product, with_line, CLIENT_ID},
        prepare_env::{drop_database, fresh_database},
    },
    traits::OrderStore,
    CarrierError,
    OrderSyncApi,
    ReconciliationApi,
    SqliteDatabase,
    StatusPollerApi,
};

use super::{
    helpers::post_request,
    mocks::{configured_carrier, unconfigured_carrier, MockCarrier},
};
use crate::{
    config::ServerOptions,
    routes::{PollStatusesRoute, ReconcileStockRoute, SyncOrdersRoute},
};

fn sync_orders_app(db: SqliteDatabase, carrier: MockCarrier) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let api = OrderSyncApi::new(db, carrier, SyncSettings::default());
        cfg.app_data(web::Data::new(api)).service(SyncOrdersRoute::<SqliteDatabase, MockCarrier>::new());
    }
}

#[actix_web::test]
async fn sync_orders_imports_a_page() {
    let (url, db) = fresh_database().await;
    seed_product(&db, "MUG-01", 0.4, 0.001, 20).await;
    let created = Utc::now() - Duration::days(1);
    let orders = vec![
        with_line(external_order("7001", created), "MUG-01", 2, 12.0),
        with_line(external_order("7002", created), "MUG-01", 1, 12.0),
    ];
    let mut carrier = configured_carrier();
    carrier.expect_fetch_orders_page().times(1).returning(move |_, cursor, _| {
        assert_eq!(cursor, &PageCursor::First);
        Ok(OrderPage { orders: orders.clone(), next: None })
    });
    let (status, body) = post_request("/sync/orders", "", sync_orders_app(db.clone(), carrier)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "success");
    assert_eq!(body["mode"], "incremental");
    assert_eq!(body["pages_fetched"], 1);
    assert_eq!(body["imported"], 2);
    assert_eq!(body["skipped"], 0);
    assert_eq!(body["errors"], json!([]));
    let known = db.fetch_known_external_orders(&["7001".to_string(), "7002".to_string()]).await.unwrap();
    assert_eq!(known.len(), 2);
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn sync_orders_without_credentials() {
    let (url, db) = fresh_database().await;
    let app = sync_orders_app(db.clone(), unconfigured_carrier());
    let (status, body) = post_request("/sync/orders", r#"{"mode": "full"}"#, app).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("WMS_CARRIER_USERNAME"));
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn sync_orders_rejects_unknown_mode() {
    let (url, db) = fresh_database().await;
    // No expectations: the request must be rejected before the carrier is touched
    let carrier = MockCarrier::new();
    let (status, body) =
        post_request("/sync/orders", r#"{"mode": "weekly"}"#, sync_orders_app(db.clone(), carrier)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn sync_orders_rejects_backwards_window() {
    let (url, db) = fresh_database().await;
    let body = r#"{"mode": "custom", "startDate": "2024-06-01", "endDate": "2024-05-01"}"#;
    let (status, body) = post_request("/sync/orders", body, sync_orders_app(db.clone(), configured_carrier())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("after end date"));
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn sync_orders_first_page_failure_is_fatal() {
    let (url, db) = fresh_database().await;
    let mut carrier = configured_carrier();
    carrier
        .expect_fetch_orders_page()
        .times(1)
        .returning(|_, _, _| Err(CarrierError::Transport("connection refused".into())));
    let body = r#"{"startDate": "2024-05-01", "endDate": "2024-05-31"}"#;
    let (status, body) = post_request("/sync/orders", body, sync_orders_app(db.clone(), carrier)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
    drop_database(&url, db).await;
}

fn status_app(db: SqliteDatabase, carrier: MockCarrier) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let api = StatusPollerApi::new(db, carrier, StatusMap::default());
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(ServerOptions { status_poll_limit: 25 }))
            .service(PollStatusesRoute::<SqliteDatabase, MockCarrier>::new());
    }
}

#[actix_web::test]
async fn poll_statuses_with_nothing_to_poll() {
    let (url, db) = fresh_database().await;
    let (status, body) = post_request("/sync/status", "", status_app(db.clone(), configured_carrier())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["checked"], 0);
    assert_eq!(body["updated"], 0);
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn poll_statuses_rejects_zero_limit() {
    let (url, db) = fresh_database().await;
    let app = status_app(db.clone(), MockCarrier::new());
    let (status, _) = post_request("/sync/status", r#"{"limit": 0}"#, app).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    drop_database(&url, db).await;
}

fn reconcile_app(db: SqliteDatabase, carrier: MockCarrier) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let api = ReconciliationApi::new(db, carrier, ReconciliationSettings::default());
        cfg.app_data(web::Data::new(api)).service(ReconcileStockRoute::<SqliteDatabase, MockCarrier>::new());
    }
}

#[actix_web::test]
async fn reconcile_stock_records_discrepancies_without_touching_stock() {
    let (url, db) = fresh_database().await;
    seed_product(&db, "MUG-01", 0.4, 0.001, 100).await;
    seed_product(&db, "TEA-01", 0.1, 0.0005, 40).await;
    let mut carrier = configured_carrier();
    carrier.expect_fetch_stock_levels().times(1).returning(|| {
        Ok(vec![
            ExternalStock { sku: "MUG-01".into(), external_product_id: None, quantity: 80 },
            ExternalStock { sku: "TEA-01".into(), external_product_id: None, quantity: 38 },
            ExternalStock { sku: "NOT-OURS".into(), external_product_id: None, quantity: 5 },
        ])
    });
    let (status, body) = post_request("/reconcile/stock", "", reconcile_app(db.clone(), carrier)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["checked"], 2);
    assert_eq!(body["discrepancies"], 1);
    assert_eq!(body["skipped"], 1);
    assert_eq!(body["records"][0]["product_ref"], "MUG-01");
    let products = db.fetch_products_by_sku(CLIENT_ID, &["MUG-01".to_string()]).await.unwrap();
    assert_eq!(products[0].stock_quantity, 100);
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn reconcile_stock_rejects_negative_threshold() {
    let (url, db) = fresh_database().await;
    let (status, body) = post_request(
        "/reconcile/stock",
        r#"{"threshold_percent": -5}"#,
        reconcile_app(db.clone(), configured_carrier()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("threshold"));
    drop_database(&url, db).await;
}
