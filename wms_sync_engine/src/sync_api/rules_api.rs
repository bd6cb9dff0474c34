use std::{
    collections::HashMap,
    fmt::{Debug, Display},
};

use log::*;

use crate::{
    db_types::{join_tags, DerivedFieldsUpdate, Order, OrderLine, Product},
    rules::{
        select_all_matches,
        select_first_match,
        sort_by_priority,
        volumetric::{compute_parcel_metrics, select_carton},
        OrderRecord,
        TransportRule,
    },
    sync_api::sync_objects::{RuleApplicationReport, RuleStep},
    traits::{OrderStore, RuleStore, SyncDatabaseError},
};

/// `RulesApi` derives an order's tags, carrier, parcel weights, carton and sender address from the rule tables.
///
/// Rule application is best-effort enrichment. Each step runs independently: if a lookup fails in one step, that
/// step's effect is dropped and reported, and the other steps still apply.
pub struct RulesApi<B> {
    db: B,
}

impl<B> Debug for RulesApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RulesApi")
    }
}

impl<B> RulesApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> RulesApi<B>
where B: OrderStore + RuleStore
{
    /// Applies tag, transport and expediteur rules to a persisted order and writes the derived fields back.
    pub async fn apply_rules(&self, order: &Order) -> RuleApplicationReport {
        let mut report = RuleApplicationReport::new(order.id);
        let lines = lines_or_empty(order, self.db.fetch_order_lines(order.id).await, &mut report);
        let mut record = OrderRecord::from_order(order, &lines);
        let mut update = DerivedFieldsUpdate::default();

        self.apply_tag_rules(order, &mut record, &mut update, &mut report).await;
        self.apply_transport_rules(order, &record, &lines, &mut update, &mut report).await;
        self.apply_expediteur_rules(order, &record, &mut update, &mut report).await;

        if !update.is_empty() {
            match self.db.update_derived_fields(order.id, &update).await {
                Ok(_) => debug!("🧮️ Derived fields of order {order} updated"),
                Err(e) => {
                    error!("🧮️ Could not save the derived fields of order {order}. {e}");
                    report.fail(RuleStep::Persist, e);
                },
            }
        }
        for e in &report.errors {
            warn!("🧮️ Rule step '{}' failed for order {order}: {}", e.step, e.message);
        }
        report
    }

    /// Every matching tag rule adds its tag. Existing tags are kept.
    async fn apply_tag_rules(
        &self,
        order: &Order,
        record: &mut OrderRecord,
        update: &mut DerivedFieldsUpdate,
        report: &mut RuleApplicationReport,
    ) {
        let mut rules = match self.db.fetch_tag_rules().await {
            Ok(rules) => rules,
            Err(e) => return report.fail(RuleStep::Tags, e),
        };
        sort_by_priority(&mut rules);
        let mut tags = order.tag_set();
        for rule in select_all_matches(record, &rules) {
            if tags.insert(rule.tag.clone()) {
                trace!("🧮️ Tag rule #{} adds '{}' to order {order}", rule.id, rule.tag);
                report.tags_added.push(rule.tag.clone());
            }
        }
        if !report.tags_added.is_empty() {
            record.insert("tags", join_tags(&tags));
            update.tags = Some(tags);
        }
    }

    /// The first matching transport rule sets the carrier, and optionally the parcel weights and carton.
    async fn apply_transport_rules(
        &self,
        order: &Order,
        record: &OrderRecord,
        lines: &[OrderLine],
        update: &mut DerivedFieldsUpdate,
        report: &mut RuleApplicationReport,
    ) {
        let mut rules = match self.db.fetch_transport_rules().await {
            Ok(rules) => rules,
            Err(e) => return report.fail(RuleStep::Transport, e),
        };
        sort_by_priority(&mut rules);
        let Some(rule) = select_first_match(record, &rules) else {
            debug!("🧮️ No transport rule matches order {order}");
            return;
        };
        debug!("🧮️ Transport rule #{} assigns carrier '{}' to order {order}", rule.id, rule.carrier);
        update.carrier = Some(rule.carrier.clone());
        report.carrier = Some(rule.carrier.clone());
        if rule.compute_volumetric {
            if let Err(e) = self.apply_volumetric(order, rule, lines, update, report).await {
                report.fail(RuleStep::Volumetric, e);
            }
        }
    }

    async fn apply_volumetric(
        &self,
        order: &Order,
        rule: &TransportRule,
        lines: &[OrderLine],
        update: &mut DerivedFieldsUpdate,
        report: &mut RuleApplicationReport,
    ) -> Result<(), String> {
        let skus = lines.iter().map(|l| l.sku.clone()).collect::<Vec<_>>();
        let products = self
            .db
            .fetch_products_by_sku(order.client_id, &skus)
            .await
            .map_err(|e| e.to_string())?
            .into_iter()
            .map(|p| (p.id, p))
            .collect::<HashMap<i64, Product>>();
        let pairs = lines
            .iter()
            .map(|line| {
                products.get(&line.product_id).map(|p| (line, p)).ok_or_else(|| {
                    format!("Product #{} ({}) is missing. Cannot compute the parcel volume.", line.product_id, line.sku)
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        let metrics = compute_parcel_metrics(pairs, rule.divisor());
        trace!("🧮️ Parcel metrics for order {order}: {metrics:?}");
        update.volumetric_weight = Some(metrics.volumetric_weight_kg);
        update.billable_weight = Some(metrics.billable_weight_kg);
        report.metrics = Some(metrics);

        let cartons = self.db.fetch_carton_types().await.map_err(|e| e.to_string())?;
        match select_carton(&cartons, metrics.volume_cm3) {
            Some(carton) => {
                update.carton_type = Some(carton.name.clone());
                report.carton_type = Some(carton.name.clone());
            },
            None => warn!("🧮️ No active carton is large enough for order {order} ({:.0} cm³)", metrics.volume_cm3),
        }
        Ok(())
    }

    /// The first matching expediteur rule for the order's client copies its sender address onto the order.
    async fn apply_expediteur_rules(
        &self,
        order: &Order,
        record: &OrderRecord,
        update: &mut DerivedFieldsUpdate,
        report: &mut RuleApplicationReport,
    ) {
        let result: Result<(), SyncDatabaseError> = async {
            let mut rules = self.db.fetch_expediteur_rules(order.client_id).await?;
            sort_by_priority(&mut rules);
            let Some(rule) = select_first_match(record, &rules) else {
                trace!("🧮️ No expediteur rule matches order {order}");
                return Ok(());
            };
            match self.db.fetch_sender_address(rule.sender_address_id).await? {
                Some(address) => {
                    debug!("🧮️ Expediteur rule #{} sets sender address #{} on order {order}", rule.id, address.id);
                    report.sender_address_id = Some(address.id);
                    update.expediteur = Some(address);
                },
                None => report.fail(
                    RuleStep::Expediteur,
                    format!("Expediteur rule #{} refers to missing sender address #{}", rule.id, rule.sender_address_id),
                ),
            }
            Ok(())
        }
        .await;
        if let Err(e) = result {
            report.fail(RuleStep::Expediteur, e);
        }
    }
}

/// Every step evaluates against a record built from the lines, so a failed lookup is reported on its own step and the
/// rules run with no lines.
fn lines_or_empty<D: Display>(
    order: D,
    lines: Result<Vec<OrderLine>, SyncDatabaseError>,
    report: &mut RuleApplicationReport,
) -> Vec<OrderLine> {
    lines.unwrap_or_else(|e| {
        warn!("🧮️ Could not load the lines of order {order}. Rules are evaluated without them. {e}");
        report.fail(RuleStep::OrderLines, &e);
        vec![]
    })
}
