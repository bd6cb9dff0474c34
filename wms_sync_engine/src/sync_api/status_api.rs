use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{LinkedOrder, TrackingUpdate},
    sync_api::{
        sync_objects::{StatusMap, StatusPollReport},
        SyncApiError,
    },
    traits::{CarrierPlatform, OrderStore},
};

/// `StatusPollerApi` refreshes the status and tracking details of open orders from the carrier platform.
pub struct StatusPollerApi<B, P> {
    db: B,
    platform: P,
    status_map: StatusMap,
}

impl<B, P> Debug for StatusPollerApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StatusPollerApi")
    }
}

enum PollOutcome {
    Unchanged,
    Changed { status: bool, tracking: bool },
}

impl<B, P> StatusPollerApi<B, P> {
    pub fn new(db: B, platform: P, status_map: StatusMap) -> Self {
        Self { db, platform, status_map }
    }
}

impl<B, P> StatusPollerApi<B, P>
where
    B: OrderStore,
    P: CarrierPlatform,
{
    /// Polls up to `limit` non-terminal linked orders, least recently synced first.
    ///
    /// Errors on one order are logged and collected. They never stop the poll.
    pub async fn poll_statuses(&self, limit: i64) -> Result<StatusPollReport, SyncApiError> {
        self.platform.check_credentials().map_err(SyncApiError::from_credentials)?;
        let orders = self.db.fetch_pollable_orders(limit).await?;
        debug!("🔄️ Polling the carrier status of {} orders", orders.len());
        let mut report = StatusPollReport::default();
        for linked in orders {
            report.checked += 1;
            match self.poll_one(&linked).await {
                Ok(PollOutcome::Unchanged) => report.unchanged += 1,
                Ok(PollOutcome::Changed { status, tracking }) => {
                    if status {
                        report.updated += 1;
                    } else {
                        report.unchanged += 1;
                    }
                    if tracking {
                        report.tracking_updated += 1;
                    }
                },
                Err(e) => {
                    warn!("🔄️ Could not poll the status of order {}. {e}", linked.order);
                    report.errors.push(format!("{}: {e}", linked.external.external_id));
                },
            }
        }
        info!(
            "🔄️ Status poll complete. {} checked, {} updated, {} unchanged, {} errors",
            report.checked,
            report.updated,
            report.unchanged,
            report.errors.len()
        );
        Ok(report)
    }

    async fn poll_one(&self, linked: &LinkedOrder) -> Result<PollOutcome, SyncApiError> {
        let shipment = self.platform.fetch_shipment_status(&linked.external).await?;
        let mapped = self.status_map.map(shipment.code);
        let status_changed = mapped != linked.order.status;
        if status_changed {
            self.db.update_order_status(linked.order.id, mapped).await?;
            info!("🔄️ Order {} moved from {} to {mapped}", linked.order, linked.order.status);
        }
        let ext = &linked.external;
        let tracking_changed = shipment.tracking_number.is_some() && shipment.tracking_number != ext.tracking_number ||
            shipment.tracking_url.is_some() && shipment.tracking_url != ext.tracking_url ||
            ext.external_status_code != Some(shipment.code);
        if tracking_changed {
            let update = TrackingUpdate {
                tracking_number: shipment.tracking_number,
                tracking_url: shipment.tracking_url,
                external_status_code: Some(shipment.code),
            };
            self.db.update_tracking(linked.order.id, &update).await?;
            trace!("🔄️ Tracking details refreshed for order {}", linked.order);
        }
        if status_changed || tracking_changed {
            Ok(PollOutcome::Changed { status: status_changed, tracking: tracking_changed })
        } else {
            Ok(PollOutcome::Unchanged)
        }
    }
}
