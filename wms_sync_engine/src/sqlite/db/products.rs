use chrono::Utc;
use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{NewProduct, Product, ProductUpsert},
    traits::SyncDatabaseError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, SyncDatabaseError> {
    let now = Utc::now();
    let product: Product = sqlx::query_as(
        r#"
            INSERT INTO products (
                client_id,
                sku,
                name,
                unit_weight_kg,
                volume_m3,
                stock_quantity,
                external_id,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *;
        "#,
    )
    .bind(product.client_id)
    .bind(product.sku)
    .bind(product.name)
    .bind(product.unit_weight_kg)
    .bind(product.volume_m3)
    .bind(product.stock_quantity)
    .bind(product.external_id)
    .bind(now)
    .fetch_one(conn)
    .await?;
    trace!("📦️ Product {} inserted with id {}", product.sku, product.id);
    Ok(product)
}

/// Inserts a product, or refreshes the catalogue fields of an existing one with the same `(client_id, sku)`.
/// Unknown weights and volumes never overwrite known ones, and `stock_quantity` is never touched.
pub async fn upsert_product(product: ProductUpsert, conn: &mut SqliteConnection) -> Result<Product, SyncDatabaseError> {
    let product: Product = sqlx::query_as(
        r#"
            INSERT INTO products (client_id, sku, name, unit_weight_kg, volume_m3, external_id, created_at, updated_at)
            VALUES ($1, $2, $3, COALESCE($4, 0), COALESCE($5, 0), $6, $7, $7)
            ON CONFLICT (client_id, sku) DO UPDATE SET
                name = excluded.name,
                unit_weight_kg = COALESCE($4, products.unit_weight_kg),
                volume_m3 = COALESCE($5, products.volume_m3),
                external_id = COALESCE($6, products.external_id),
                updated_at = $7
            RETURNING *;
        "#,
    )
    .bind(product.client_id)
    .bind(product.sku)
    .bind(product.name)
    .bind(product.unit_weight_kg)
    .bind(product.volume_m3)
    .bind(product.external_id)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    trace!("📦️ Product {} upserted (id {})", product.sku, product.id);
    Ok(product)
}

pub async fn fetch_products_by_sku(
    client_id: i64,
    skus: &[String],
    conn: &mut SqliteConnection,
) -> Result<Vec<Product>, SyncDatabaseError> {
    if skus.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM products WHERE client_id = ");
    builder.push_bind(client_id);
    builder.push(" AND sku IN (");
    let mut list = builder.separated(", ");
    for sku in skus {
        list.push_bind(sku);
    }
    list.push_unseparated(") ORDER BY id");
    let products = builder.build_query_as::<Product>().fetch_all(conn).await?;
    Ok(products)
}

pub async fn fetch_product_by_sku(
    client_id: i64,
    sku: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, SyncDatabaseError> {
    let product = sqlx::query_as("SELECT * FROM products WHERE client_id = $1 AND sku = $2")
        .bind(client_id)
        .bind(sku)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}
