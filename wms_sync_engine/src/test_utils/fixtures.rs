use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::{
    carrier_types::{ExternalOrder, ExternalOrderLine},
    db_types::{CartonType, NewProduct, Product, SenderAddress},
    rules::{
        Condition,
        ExpediteurMatch,
        ExpediteurRule,
        NewExpediteurRule,
        NewTagRule,
        NewTransportRule,
        TagRule,
        TransportRule,
    },
    sqlite_db::{products, rules},
    SqliteDatabase,
};

pub const CLIENT_ID: i64 = 1;

/// A carrier order with sensible defaults and no lines.
pub fn external_order(external_id: &str, created_at: DateTime<Utc>) -> ExternalOrder {
    ExternalOrder {
        external_id: external_id.to_string(),
        order_number: format!("#{external_id}"),
        created_at,
        store_name: Some("Maison Lumière".into()),
        sub_client: None,
        customer_name: Some("Camille Martin".into()),
        customer_email: Some("camille@example.com".into()),
        country_code: Some("FR".into()),
        shipping_method: Some("standard".into()),
        total_price: 0.0,
        currency: "EUR".into(),
        tags: BTreeSet::new(),
        lines: vec![],
    }
}

pub fn with_line(mut order: ExternalOrder, sku: &str, quantity: i64, unit_price: f64) -> ExternalOrder {
    order.total_price += unit_price * quantity as f64;
    order.lines.push(ExternalOrderLine {
        sku: Some(sku.to_string()),
        name: format!("Item {sku}"),
        quantity,
        unit_price,
    });
    order
}

pub async fn seed_product(db: &SqliteDatabase, sku: &str, weight_kg: f64, volume_m3: f64, stock: i64) -> Product {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    let product = NewProduct {
        client_id: CLIENT_ID,
        sku: sku.to_string(),
        name: format!("Product {sku}"),
        unit_weight_kg: weight_kg,
        volume_m3,
        stock_quantity: stock,
        external_id: None,
    };
    products::insert_product(product, &mut conn).await.expect("Error inserting product")
}

pub async fn seed_tag_rule(db: &SqliteDatabase, priority: i64, conditions: Vec<Condition>, tag: &str) -> TagRule {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    let rule = NewTagRule { priority, active: true, conditions, tag: tag.to_string() };
    rules::insert_tag_rule(rule, &mut conn).await.expect("Error inserting tag rule")
}

pub async fn seed_transport_rule(
    db: &SqliteDatabase,
    priority: i64,
    conditions: Vec<Condition>,
    carrier: &str,
    compute_volumetric: bool,
) -> TransportRule {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    let rule = NewTransportRule {
        priority,
        active: true,
        conditions,
        carrier: carrier.to_string(),
        compute_volumetric,
        volumetric_divisor: None,
    };
    rules::insert_transport_rule(rule, &mut conn).await.expect("Error inserting transport rule")
}

pub async fn seed_carton(db: &SqliteDatabase, name: &str, volume_cm3: f64) -> CartonType {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    rules::insert_carton_type(name, volume_cm3, true, &mut conn).await.expect("Error inserting carton type")
}

pub async fn seed_expediteur(
    db: &SqliteDatabase,
    priority: i64,
    matcher: ExpediteurMatch,
    sender_name: &str,
) -> (ExpediteurRule, SenderAddress) {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    let address = SenderAddress {
        client_id: CLIENT_ID,
        name: Some(sender_name.to_string()),
        address1: Some("12 rue des Entrepôts".into()),
        zip: Some("69007".into()),
        city: Some("Lyon".into()),
        country_code: Some("FR".into()),
        ..Default::default()
    };
    let address = rules::insert_sender_address(&address, &mut conn).await.expect("Error inserting sender address");
    let rule = NewExpediteurRule {
        client_id: CLIENT_ID,
        priority,
        active: true,
        conditions: vec![],
        matcher,
        sender_address_id: address.id,
    };
    let rule = rules::insert_expediteur_rule(rule, &mut conn).await.expect("Error inserting expediteur rule");
    (rule, address)
}
