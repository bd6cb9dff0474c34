use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{
        join_tags,
        DerivedFieldsUpdate,
        ExternalOrderRef,
        KnownExternalOrder,
        LinkedOrder,
        NewOrder,
        NewOrderLine,
        Order,
        OrderLine,
        OrderStatus,
        TrackingUpdate,
    },
    traits::SyncDatabaseError,
};

const TERMINAL_STATUSES: &str = "('delivered', 'shipped', 'completed', 'cancelled')";

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(
    order: NewOrder,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, SyncDatabaseError> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                client_id,
                order_number,
                store_name,
                sub_client,
                customer_name,
                customer_email,
                country_code,
                shipping_method,
                total_price,
                currency,
                total_weight_kg,
                status,
                tags,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *;
        "#,
    )
    .bind(order.client_id)
    .bind(order.order_number)
    .bind(order.store_name)
    .bind(order.sub_client)
    .bind(order.customer_name)
    .bind(order.customer_email)
    .bind(order.country_code)
    .bind(order.shipping_method)
    .bind(order.total_price)
    .bind(order.currency)
    .bind(order.total_weight_kg)
    .bind(OrderStatus::Pending)
    .bind(join_tags(&order.tags))
    .bind(order.created_at)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order [{}] inserted with id {}", order.order_number, order.id);
    Ok(order)
}

pub async fn insert_order_line(
    order_id: i64,
    line: NewOrderLine,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<OrderLine, SyncDatabaseError> {
    let line = sqlx::query_as(
        r#"
            INSERT INTO order_lines (order_id, product_id, sku, name, quantity, unit_price, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(line.product_id)
    .bind(line.sku)
    .bind(line.name)
    .bind(line.quantity)
    .bind(line.unit_price)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(line)
}

/// Links a local order to its external id. A unique-key violation on either column means the external order has
/// already been imported, and is reported as [`SyncDatabaseError::DuplicateExternalId`].
pub async fn insert_external_ref(
    order_id: i64,
    external_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ExternalOrderRef, SyncDatabaseError> {
    let link = sqlx::query_as(
        r#"
            INSERT INTO external_order_refs (order_id, external_id, last_synced_at, created_at)
            VALUES ($1, $2, $3, $3)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(external_id)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            SyncDatabaseError::DuplicateExternalId(external_id.to_string())
        },
        e => SyncDatabaseError::from(e),
    })?;
    Ok(link)
}

pub async fn fetch_known_external_orders(
    external_ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<Vec<KnownExternalOrder>, SyncDatabaseError> {
    if external_ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::<Sqlite>::new(
        r#"
    SELECT r.order_id AS order_id, r.external_id AS external_id, o.status AS status
    FROM external_order_refs r JOIN orders o ON o.id = r.order_id
    WHERE r.external_id IN ("#,
    );
    let mut ids = builder.separated(", ");
    for id in external_ids {
        ids.push_bind(id);
    }
    ids.push_unseparated(")");
    let known = builder.build_query_as::<KnownExternalOrder>().fetch_all(conn).await?;
    trace!("📝️ {} of {} external orders are already known", known.len(), external_ids.len());
    Ok(known)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SyncDatabaseError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_lines(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderLine>, SyncDatabaseError> {
    let lines = sqlx::query_as("SELECT * FROM order_lines WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

pub async fn fetch_external_ref(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ExternalOrderRef>, SyncDatabaseError> {
    let link = sqlx::query_as("SELECT * FROM external_order_refs WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(link)
}

/// Writes the fields that are set in `update`. If nothing is set, only `updated_at` changes.
pub async fn update_derived_fields(
    order_id: i64,
    update: &DerivedFieldsUpdate,
    conn: &mut SqliteConnection,
) -> Result<Order, SyncDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET ");
    let mut set_clause = builder.separated(", ");
    if let Some(tags) = &update.tags {
        set_clause.push("tags = ");
        set_clause.push_bind_unseparated(join_tags(tags));
    }
    if let Some(carrier) = &update.carrier {
        set_clause.push("carrier = ");
        set_clause.push_bind_unseparated(carrier.clone());
    }
    if let Some(w) = update.volumetric_weight {
        set_clause.push("volumetric_weight = ");
        set_clause.push_bind_unseparated(w);
    }
    if let Some(w) = update.billable_weight {
        set_clause.push("billable_weight = ");
        set_clause.push_bind_unseparated(w);
    }
    if let Some(carton) = &update.carton_type {
        set_clause.push("carton_type = ");
        set_clause.push_bind_unseparated(carton.clone());
    }
    if let Some(sender) = &update.expediteur {
        let columns = [
            ("expediteur_name", &sender.name),
            ("expediteur_company", &sender.company),
            ("expediteur_address1", &sender.address1),
            ("expediteur_address2", &sender.address2),
            ("expediteur_zip", &sender.zip),
            ("expediteur_city", &sender.city),
            ("expediteur_country", &sender.country_code),
            ("expediteur_phone", &sender.phone),
            ("expediteur_email", &sender.email),
        ];
        for (column, value) in columns {
            set_clause.push(format!("{column} = "));
            set_clause.push_bind_unseparated(value.clone());
        }
    }
    set_clause.push("updated_at = ");
    set_clause.push_bind_unseparated(Utc::now());
    builder.push(" WHERE id = ");
    builder.push_bind(order_id);
    builder.push(" RETURNING *");
    let order = builder
        .build_query_as::<Order>()
        .fetch_optional(conn)
        .await?
        .ok_or(SyncDatabaseError::OrderNotFound(order_id))?;
    Ok(order)
}

/// Open orders with an external link, least recently synced first.
pub async fn fetch_pollable_orders(
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<LinkedOrder>, SyncDatabaseError> {
    let links: Vec<ExternalOrderRef> = sqlx::query_as(&format!(
        r#"
        SELECT r.* FROM external_order_refs r JOIN orders o ON o.id = r.order_id
        WHERE o.status NOT IN {TERMINAL_STATUSES}
        ORDER BY r.last_synced_at ASC, r.id ASC
        LIMIT $1
        "#
    ))
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;
    if links.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM orders WHERE id IN (");
    let mut ids = builder.separated(", ");
    for link in &links {
        ids.push_bind(link.order_id);
    }
    ids.push_unseparated(")");
    let orders = builder.build_query_as::<Order>().fetch_all(&mut *conn).await?;
    let mut orders = orders.into_iter().map(|o| (o.id, o)).collect::<HashMap<i64, Order>>();
    let linked = links
        .into_iter()
        .filter_map(|external| orders.remove(&external.order_id).map(|order| LinkedOrder { order, external }))
        .collect();
    Ok(linked)
}

/// Sets the status of a non-terminal order. Terminal orders are never changed.
pub async fn update_order_status(
    order_id: i64,
    status: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Order, SyncDatabaseError> {
    let order = sqlx::query_as(&format!(
        "UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status NOT IN {TERMINAL_STATUSES} RETURNING *"
    ))
    .bind(status)
    .bind(Utc::now())
    .bind(order_id)
    .fetch_optional(conn)
    .await?
    .ok_or(SyncDatabaseError::OrderNotFound(order_id))?;
    Ok(order)
}

pub async fn update_tracking(
    order_id: i64,
    update: &TrackingUpdate,
    conn: &mut SqliteConnection,
) -> Result<ExternalOrderRef, SyncDatabaseError> {
    let link = sqlx::query_as(
        r#"
            UPDATE external_order_refs SET
                tracking_number = COALESCE($1, tracking_number),
                tracking_url = COALESCE($2, tracking_url),
                external_status_code = COALESCE($3, external_status_code),
                last_synced_at = $4
            WHERE order_id = $5
            RETURNING *;
        "#,
    )
    .bind(update.tracking_number.clone())
    .bind(update.tracking_url.clone())
    .bind(update.external_status_code)
    .bind(Utc::now())
    .bind(order_id)
    .fetch_optional(conn)
    .await?
    .ok_or(SyncDatabaseError::ExternalRefNotFound(order_id))?;
    Ok(link)
}
