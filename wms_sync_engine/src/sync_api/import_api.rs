use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
};

use log::*;

use crate::{
    carrier_types::ExternalOrder,
    db_types::{NewOrder, NewOrderLine, Product},
    sync_api::{
        sync_objects::{ImportError, ImportResult},
        RulesApi,
    },
    traits::{OrderStore, RuleStore, SyncDatabaseError},
};

/// `ImportApi` writes batches of carrier orders into the local store exactly once.
///
/// An order is identified by its external id. Orders that are already linked locally are skipped, whatever their
/// status, so re-running an import over the same window is harmless. Each new order is created together with its
/// lines and its external link in one transaction, and then handed to the [`RulesApi`] for enrichment.
pub struct ImportApi<B> {
    db: B,
    rules: RulesApi<B>,
    client_id: i64,
}

impl<B> Debug for ImportApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImportApi(client #{})", self.client_id)
    }
}

impl<B: Clone> ImportApi<B> {
    pub fn new(db: B, client_id: i64) -> Self {
        let rules = RulesApi::new(db.clone());
        Self { db, rules, client_id }
    }
}

impl<B> ImportApi<B>
where B: OrderStore + RuleStore
{
    pub fn client_id(&self) -> i64 {
        self.client_id
    }

    /// Imports a batch of orders. A failure on one order never stops the rest of the batch.
    pub async fn import_batch(&self, orders: Vec<ExternalOrder>) -> ImportResult {
        let mut result = ImportResult::default();
        let orders = dedupe(orders, &mut result);
        if orders.is_empty() {
            return result;
        }
        let ids = orders.iter().map(|o| o.external_id.clone()).collect::<Vec<_>>();
        let known = match self.db.fetch_known_external_orders(&ids).await {
            Ok(known) => known.into_iter().map(|k| (k.external_id.clone(), k)).collect::<HashMap<_, _>>(),
            Err(e) => {
                error!("🗃️ Could not look up which of {} orders are already imported. {e}", ids.len());
                for order in &orders {
                    result.push_error(ImportError::order(&order.external_id, e.to_string()));
                }
                return result;
            },
        };
        let (fresh, seen): (Vec<_>, Vec<_>) = orders.into_iter().partition(|o| !known.contains_key(&o.external_id));
        for order in seen {
            if let Some(k) = known.get(&order.external_id) {
                if k.status.is_terminal() {
                    debug!("📝️ Order {} is already {} locally. Skipping it.", order.external_id, k.status);
                } else {
                    debug!("📝️ Order {} is already imported as order #{}. Skipping it.", order.external_id, k.order_id);
                }
            }
            result.skipped_count += 1;
        }
        if fresh.is_empty() {
            return result;
        }
        let catalogue = match self.load_catalogue(&fresh).await {
            Ok(catalogue) => catalogue,
            Err(e) => {
                error!("📦️ Could not load the products referenced by the batch. {e}");
                for order in &fresh {
                    result.push_error(ImportError::order(&order.external_id, e.to_string()));
                }
                return result;
            },
        };
        for order in fresh {
            self.import_one(order, &catalogue, &mut result).await;
        }
        info!(
            "📝️ Batch import complete. {} created, {} skipped, {} errors",
            result.success_count, result.skipped_count, result.error_count
        );
        result
    }

    async fn load_catalogue(&self, orders: &[ExternalOrder]) -> Result<HashMap<String, Product>, SyncDatabaseError> {
        let skus = orders
            .iter()
            .flat_map(|o| o.lines.iter().filter_map(|l| l.sku.clone()))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        if skus.is_empty() {
            return Ok(HashMap::new());
        }
        let products = self.db.fetch_products_by_sku(self.client_id, &skus).await?;
        Ok(products.into_iter().map(|p| (p.sku.clone(), p)).collect())
    }

    async fn import_one(&self, order: ExternalOrder, catalogue: &HashMap<String, Product>, result: &mut ImportResult) {
        let external_id = order.external_id.clone();
        let mut lines = Vec::with_capacity(order.lines.len());
        let mut total_weight_kg = 0.0;
        for line in &order.lines {
            let Some(product) = line.sku.as_ref().and_then(|sku| catalogue.get(sku)) else {
                let sku = line.sku.as_deref().unwrap_or("<none>");
                warn!("📦️ Order {external_id}: no product with SKU {sku} for line '{}'. Line skipped.", line.name);
                result.push_error(ImportError::line(&external_id, format!("Unknown SKU {sku} on line '{}'", line.name)));
                continue;
            };
            total_weight_kg += product.unit_weight_kg * line.quantity as f64;
            lines.push(NewOrderLine {
                product_id: product.id,
                sku: product.sku.clone(),
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }
        let new_order = NewOrder {
            client_id: self.client_id,
            order_number: order.order_number,
            store_name: order.store_name,
            sub_client: order.sub_client,
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            country_code: order.country_code,
            shipping_method: order.shipping_method,
            total_price: order.total_price,
            currency: order.currency,
            total_weight_kg,
            tags: order.tags,
            created_at: order.created_at,
        };
        match self.db.create_linked_order(new_order, lines, &external_id).await {
            Ok(created) => {
                info!("📝️ Imported order {external_id} as {created}");
                result.success_count += 1;
                let report = self.rules.apply_rules(&created).await;
                if !report.errors.is_empty() {
                    debug!("🧮️ {} rule steps failed for {created}", report.errors.len());
                }
            },
            Err(SyncDatabaseError::DuplicateExternalId(id)) => {
                debug!("📝️ Order {id} was imported concurrently. Skipping it.");
                result.skipped_count += 1;
            },
            Err(e) => {
                error!("📝️ Could not import order {external_id}. {e}");
                result.push_error(ImportError::order(&external_id, e.to_string()));
            },
        }
    }
}

/// Keeps the first occurrence of every external id. Later duplicates count as skipped.
fn dedupe(orders: Vec<ExternalOrder>, result: &mut ImportResult) -> Vec<ExternalOrder> {
    let mut seen = HashSet::new();
    orders
        .into_iter()
        .filter(|o| {
            let first = seen.insert(o.external_id.clone());
            if !first {
                debug!("📝️ Order {} appears more than once in the batch", o.external_id);
                result.skipped_count += 1;
            }
            first
        })
        .collect()
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use super::*;
    use crate::carrier_types::ExternalOrderLine;

    fn order(id: &str) -> ExternalOrder {
        ExternalOrder {
            external_id: id.to_string(),
            order_number: format!("#{id}"),
            created_at: Utc::now(),
            store_name: None,
            sub_client: None,
            customer_name: None,
            customer_email: None,
            country_code: None,
            shipping_method: None,
            total_price: 10.0,
            currency: "EUR".into(),
            tags: BTreeSet::new(),
            lines: vec![ExternalOrderLine { sku: Some("SKU".into()), name: "x".into(), quantity: 1, unit_price: 10.0 }],
        }
    }

    #[test]
    fn duplicates_in_a_batch_are_skipped() {
        let mut result = ImportResult::default();
        let orders = dedupe(vec![order("1"), order("2"), order("1"), order("1")], &mut result);
        let ids = orders.iter().map(|o| o.external_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(result.skipped_count, 2);
    }
}
