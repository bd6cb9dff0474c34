use chrono::Duration;
use cucumber::{then, when};
use wms_sync_engine::{
    db_types::{OutboxStatus, SyncRunStatus},
    sync_api::sync_objects::{SyncRequest, SyncSettings},
    traits::{AuditLog, OrderStore, OutboxStore},
    OrderSyncApi,
    SyncApiError,
};

use crate::cucumber::SyncWorld;

async fn run_sync(world: &mut SyncWorld, settings: SyncSettings) {
    let system = world.system();
    let api = OrderSyncApi::new(system.db.clone(), system.carrier.clone(), settings);
    system.last_sync = Some(api.sync_orders_at(system.now, SyncRequest::incremental()).await);
}

#[when(expr = "I run an incremental sync with page size {int}")]
async fn incremental_sync(world: &mut SyncWorld, page_size: u32) {
    run_sync(world, SyncSettings { page_size, ..Default::default() }).await;
}

#[when(expr = "I run an incremental sync with page size {int} and at most {int} pages")]
async fn capped_sync(world: &mut SyncWorld, page_size: u32, max_pages: u32) {
    run_sync(world, SyncSettings { page_size, max_pages, ..Default::default() }).await;
}

#[then(expr = "the sync run is {word}")]
async fn sync_status(world: &mut SyncWorld, status: String) {
    let system = world.system();
    let expected = match status.as_str() {
        "successful" => SyncRunStatus::Success,
        "partial" => SyncRunStatus::Partial,
        "failed" => SyncRunStatus::Failed,
        other => panic!("Unknown sync status '{other}'"),
    };
    let runs = system.db.fetch_sync_runs(1).await.expect("Error fetching sync runs");
    let run = runs.first().expect("No sync run was recorded");
    assert_eq!(run.status, expected);
}

#[then(expr = "the sync is rejected as misconfigured")]
async fn misconfigured(world: &mut SyncWorld) {
    let system = world.system();
    assert!(matches!(system.last_sync, Some(Err(SyncApiError::Configuration(_)))));
    let runs = system.db.fetch_sync_runs(1).await.expect("Error fetching sync runs");
    assert!(runs.is_empty(), "no run is recorded when nothing was attempted");
}

#[then(expr = "{int} orders were created and {int} skipped")]
async fn import_counts(world: &mut SyncWorld, created: usize, skipped: usize) {
    let report = world.system().sync_report();
    assert_eq!(report.import.success_count, created);
    assert_eq!(report.import.skipped_count, skipped);
}

#[then(expr = "the sync read {int} pages and was truncated")]
async fn truncated(world: &mut SyncWorld, pages: u32) {
    let report = world.system().sync_report();
    assert_eq!(report.pages_fetched, pages);
    assert!(report.truncated);
}

#[then(expr = "order {word} is tagged {string}")]
async fn order_tagged(world: &mut SyncWorld, external_id: String, tag: String) {
    let db = &world.system().db;
    let known = db.fetch_known_external_orders(&[external_id.clone()]).await.expect("Error fetching links");
    let link = known.first().unwrap_or_else(|| panic!("Order {external_id} was not imported"));
    let order = db.fetch_order(link.order_id).await.expect("Error fetching order").expect("Order is missing");
    assert!(order.tag_set().contains(&tag), "{external_id} has tags '{}'", order.tags);
}

#[when(expr = "the outbox worker runs")]
async fn outbox_runs(world: &mut SyncWorld) {
    let system = world.system();
    let report = system.outbox.process_due_at(system.now, None).await.expect("Outbox run failed");
    system.last_outbox_run = Some(report);
}

#[when(expr = "the outbox worker runs {int} minutes later")]
async fn outbox_runs_later(world: &mut SyncWorld, minutes: i64) {
    world.system().now += Duration::minutes(minutes);
    outbox_runs(world).await;
}

#[then(expr = "the outbox worker claimed {int} entries")]
async fn claimed(world: &mut SyncWorld, count: usize) {
    let report = world.system().last_outbox_run.as_ref().expect("The outbox worker has not run");
    assert_eq!(report.claimed, count);
}

#[then(expr = "the event for order {word} is {word} after {int} attempts")]
async fn event_state(world: &mut SyncWorld, order: String, status: String, attempts: i64) {
    let system = world.system();
    let id = system.event_for(&order).id;
    let entry = system.db.fetch_outbox_entry(id).await.expect("Error fetching entry").expect("Entry is missing");
    let expected = match status.as_str() {
        "pending" => OutboxStatus::Pending,
        "sent" => OutboxStatus::Sent,
        "failed" => OutboxStatus::Failed,
        other => panic!("Unknown outbox status '{other}'"),
    };
    assert_eq!(entry.status, expected);
    let attempts_made = if expected == OutboxStatus::Sent { entry.retry_count + 1 } else { entry.retry_count };
    assert_eq!(attempts_made, attempts);
}

#[then(expr = "the event for order {word} is due again in {int} minutes")]
async fn due_again(world: &mut SyncWorld, order: String, minutes: i64) {
    let system = world.system();
    let id = system.event_for(&order).id;
    let entry = system.db.fetch_outbox_entry(id).await.expect("Error fetching entry").expect("Entry is missing");
    let next = entry.next_retry_at.expect("The entry has no retry time");
    assert_eq!((next - system.now).num_minutes(), minutes);
}
