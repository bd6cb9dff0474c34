use actix_web::{http::StatusCode, web};
use chrono::Utc;
use serde_json::json;
use wms_sync_engine::{
    carrier_types::DeliveryReceipt,
    db_types::{DlqStatus, NewDlqMessage, NewOutboxEntry, OutboxEntityType, OutboxStatus},
    sync_api::queue_objects::{DlqSettings, OutboxSettings},
    test_utils::{
        fixtures::{external_order, seed_product, with_line},
        prepare_env::{drop_database, fresh_database},
    },
    traits::{DlqStore, OrderStore, OutboxStore},
    CarrierError,
    DlqApi,
    OutboxApi,
    SqliteDatabase,
};

use super::{
    helpers::post_request,
    mocks::{configured_carrier, unconfigured_carrier, MockCarrier},
};
use crate::routes::{ProcessDlqRoute, ProcessOutboxRoute};

fn outbox_app(db: SqliteDatabase, carrier: MockCarrier) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let api = OutboxApi::new(db, carrier, OutboxSettings::default());
        cfg.app_data(web::Data::new(api)).service(ProcessOutboxRoute::<SqliteDatabase, MockCarrier>::new());
    }
}

fn dlq_app(db: SqliteDatabase, carrier: MockCarrier) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let api = DlqApi::new(db, carrier, DlqSettings::default());
        cfg.app_data(web::Data::new(api)).service(ProcessDlqRoute::<SqliteDatabase, MockCarrier>::new());
    }
}

async fn stock_event(db: &SqliteDatabase) -> i64 {
    let entry = NewOutboxEntry {
        event_type: "stock_updated".into(),
        entity_type: OutboxEntityType::Stock,
        entity_id: "MUG-01".into(),
        payload: json!({"sku": "MUG-01", "quantity": 18}),
        max_retries: 5,
    };
    db.enqueue_outbox_entry(entry).await.unwrap().id
}

#[actix_web::test]
async fn outbox_delivers_due_entries() {
    let (url, db) = fresh_database().await;
    let id = stock_event(&db).await;
    let mut carrier = configured_carrier();
    carrier.expect_deliver_event().times(1).returning(|entry| {
        assert_eq!(entry.entity_id, "MUG-01");
        Ok(DeliveryReceipt { http_status: 201, body: r#"{"id":"evt_1"}"#.into() })
    });
    let (status, body) = post_request("/outbox/process", "", outbox_app(db.clone(), carrier)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["claimed"], 1);
    assert_eq!(body["succeeded"], 1);
    assert_eq!(body["rescheduled"], 0);
    let entry = db.fetch_outbox_entry(id).await.unwrap().unwrap();
    assert_eq!(entry.status, OutboxStatus::Sent);
    assert!(entry.claimed_by.is_none());
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn outbox_failure_is_rescheduled() {
    let (url, db) = fresh_database().await;
    let id = stock_event(&db).await;
    let mut carrier = configured_carrier();
    carrier
        .expect_deliver_event()
        .times(1)
        .returning(|_| Err(CarrierError::Http { status: 503, message: "maintenance".into() }));
    let (status, body) = post_request("/outbox/process", r#"{"limit": 10}"#, outbox_app(db.clone(), carrier)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["claimed"], 1);
    assert_eq!(body["succeeded"], 0);
    assert_eq!(body["rescheduled"], 1);
    let entry = db.fetch_outbox_entry(id).await.unwrap().unwrap();
    assert_eq!(entry.status, OutboxStatus::Pending);
    assert_eq!(entry.retry_count, 1);
    assert!(entry.next_retry_at.unwrap() > Utc::now());
    assert!(entry.error_message.unwrap().contains("503"));
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn outbox_without_credentials() {
    let (url, db) = fresh_database().await;
    let id = stock_event(&db).await;
    let (status, body) = post_request("/outbox/process", "", outbox_app(db.clone(), unconfigured_carrier())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    // Nothing was claimed, so the entry is still waiting for a worker
    let entry = db.fetch_outbox_entry(id).await.unwrap().unwrap();
    assert_eq!(entry.status, OutboxStatus::Pending);
    assert_eq!(entry.retry_count, 0);
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn outbox_rejects_bad_body() {
    let (url, db) = fresh_database().await;
    let (status, body) = post_request("/outbox/process", "{limit", outbox_app(db.clone(), MockCarrier::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn dlq_resyncs_an_order() {
    let (url, db) = fresh_database().await;
    seed_product(&db, "MUG-01", 0.4, 0.001, 20).await;
    let message = NewDlqMessage {
        event_type: "order_sync".into(),
        payload: json!({"external_id": "8123"}),
        max_retries: 3,
    };
    let id = db.enqueue_dlq_message(message).await.unwrap().id;
    let mut carrier = configured_carrier();
    carrier.expect_fetch_order().times(1).returning(|external_id| {
        assert_eq!(external_id, "8123");
        Ok(with_line(external_order("8123", Utc::now()), "MUG-01", 1, 12.0))
    });
    let (status, body) = post_request("/dlq/process", "", dlq_app(db.clone(), carrier)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["claimed"], 1);
    assert_eq!(body["succeeded"], 1);
    let message = db.fetch_dlq_message(id).await.unwrap().unwrap();
    assert_eq!(message.status, DlqStatus::Success);
    let known = db.fetch_known_external_orders(&["8123".to_string()]).await.unwrap();
    assert_eq!(known.len(), 1);
    drop_database(&url, db).await;
}

#[actix_web::test]
async fn dlq_unknown_event_is_retried() {
    let (url, db) = fresh_database().await;
    let message =
        NewDlqMessage { event_type: "invoice_sync".into(), payload: json!({"invoice": 1}), max_retries: 3 };
    let id = db.enqueue_dlq_message(message).await.unwrap().id;
    let (status, body) = post_request("/dlq/process", "", dlq_app(db.clone(), configured_carrier())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rescheduled"], 1);
    assert_eq!(body["failed"], 0);
    let message = db.fetch_dlq_message(id).await.unwrap().unwrap();
    assert_eq!(message.status, DlqStatus::Pending);
    assert_eq!(message.retry_count, 1);
    assert!(message.error_message.unwrap().contains("invoice_sync"));
    drop_database(&url, db).await;
}
