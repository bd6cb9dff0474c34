use std::{collections::HashMap, fmt::Debug};

use log::*;

use crate::{
    db_types::NewReconciliationRecord,
    sync_api::{
        sync_objects::{ReconciliationReport, ReconciliationSettings},
        SyncApiError,
    },
    traits::{AuditLog, CarrierPlatform, OrderStore},
};

/// `ReconciliationApi` compares local stock levels against the carrier platform and records significant drift.
///
/// It is strictly read-and-report. Stock quantities are never changed here.
pub struct ReconciliationApi<B, P> {
    db: B,
    platform: P,
    settings: ReconciliationSettings,
}

impl<B, P> Debug for ReconciliationApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi({:?})", self.settings)
    }
}

impl<B, P> ReconciliationApi<B, P> {
    pub fn new(db: B, platform: P, settings: ReconciliationSettings) -> Self {
        Self { db, platform, settings }
    }
}

impl<B, P> ReconciliationApi<B, P>
where
    B: OrderStore + AuditLog,
    P: CarrierPlatform,
{
    /// Records a discrepancy for every known product whose stock differs by more than the threshold.
    ///
    /// `threshold_percent` overrides the configured threshold for this run.
    pub async fn reconcile_stock(&self, threshold_percent: Option<f64>) -> Result<ReconciliationReport, SyncApiError> {
        self.platform.check_credentials().map_err(SyncApiError::from_credentials)?;
        let threshold = threshold_percent.unwrap_or(self.settings.threshold_percent);
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(SyncApiError::InvalidRequest(format!("Invalid reconciliation threshold: {threshold}")));
        }
        let stock = self.platform.fetch_stock_levels().await?;
        let skus = stock.iter().map(|s| s.sku.clone()).collect::<Vec<_>>();
        let products = self
            .db
            .fetch_products_by_sku(self.settings.client_id, &skus)
            .await?
            .into_iter()
            .map(|p| (p.sku.clone(), p))
            .collect::<HashMap<_, _>>();
        let mut report = ReconciliationReport::default();
        for item in stock {
            let Some(product) = products.get(&item.sku) else {
                info!("📦️ SKU {} is stocked by the carrier but unknown locally. Skipping it.", item.sku);
                report.skipped += 1;
                continue;
            };
            report.checked += 1;
            let local = product.stock_quantity;
            let external = item.quantity;
            let delta = external - local;
            let delta_percent = percent_difference(local, external);
            if delta == 0 || delta_percent <= threshold {
                trace!("📦️ Stock of {} is within tolerance ({local} vs {external})", item.sku);
                continue;
            }
            warn!("📦️ Stock mismatch on {}. Local {local}, carrier {external} ({delta_percent:.1}%)", item.sku);
            report.discrepancies += 1;
            let record = NewReconciliationRecord {
                product_ref: item.sku.clone(),
                stock_local: local,
                stock_external: external,
                delta,
                delta_percent,
            };
            match self.db.insert_reconciliation_record(record).await {
                Ok(record) => report.records.push(record),
                Err(e) => {
                    error!("🧾️ Could not record the stock mismatch on {}. {e}", item.sku);
                    report.errors.push(format!("{}: {e}", item.sku));
                },
            }
        }
        info!(
            "📦️ Stock reconciliation complete. {} checked, {} discrepancies, {} unknown SKUs",
            report.checked, report.discrepancies, report.skipped
        );
        Ok(report)
    }
}

/// `|local − external| / |local| × 100`. With no local stock, any external stock counts as a 100% difference.
pub fn percent_difference(local: i64, external: i64) -> f64 {
    if local == 0 {
        return if external == 0 { 0.0 } else { 100.0 };
    }
    (local - external).abs() as f64 / local.abs() as f64 * 100.0
}
