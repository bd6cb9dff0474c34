use chrono::Duration;
use cucumber::given;
use serde_json::json;
use wms_sync_engine::{
    db_types::OutboxEntityType,
    rules::{Condition, Operator},
    test_utils::fixtures::{external_order, seed_product, seed_tag_rule, with_line},
    CarrierError,
};

use crate::cucumber::{sync_world::SyncSystem, SyncWorld};

#[given("a fresh warehouse database")]
async fn fresh_database(world: &mut SyncWorld) {
    world.system = Some(SyncSystem::new().await);
}

#[given(expr = "a product {word} weighing {float} kg with {int} units in stock")]
async fn product(world: &mut SyncWorld, sku: String, weight: f64, stock: i64) {
    seed_product(&world.system().db, &sku, weight, 0.001, stock).await;
}

#[given(expr = "a tag rule adding {string} when {word} equals {string}")]
async fn tag_rule(world: &mut SyncWorld, tag: String, field: String, value: String) {
    seed_tag_rule(&world.system().db, 1, vec![Condition::new(field, Operator::Equals, value)], &tag).await;
}

#[given(expr = "the carrier lists {int} orders of {word} created {int} days ago")]
async fn carrier_orders(world: &mut SyncWorld, count: u32, sku: String, days: i64) {
    let system = world.system();
    let created = system.now - Duration::days(days);
    let orders = (0..count)
        .map(|i| with_line(external_order(&format!("EXT-{}", system.next_order + i), created), &sku, 1, 15.0))
        .collect::<Vec<_>>();
    system.next_order += count;
    system.carrier.add_orders(orders);
}

#[given(expr = "page {int} of the carrier listing fails")]
async fn failing_page(world: &mut SyncWorld, page: u32) {
    world.system().carrier.fail_page(page);
}

#[given(expr = "the carrier credentials are missing")]
async fn no_credentials(world: &mut SyncWorld) {
    world.system().carrier.state().missing_credentials = true;
}

#[given(expr = "an outbox event for order {word}")]
async fn outbox_event(world: &mut SyncWorld, order: String) {
    let system = world.system();
    let entry = system
        .outbox
        .enqueue("order.updated", OutboxEntityType::Order, &order, json!({ "order": order }))
        .await
        .expect("Error queueing event");
    system.events.push((order, entry));
}

#[given(expr = "the carrier rejects the next {int} deliveries with HTTP {int}")]
async fn rejections(world: &mut SyncWorld, count: usize, status: u16) {
    let errors = (0..count).map(|_| CarrierError::Http { status, message: "unavailable".into() }).collect();
    world.system().carrier.fail_next_deliveries(errors);
}
