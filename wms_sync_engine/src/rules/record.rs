use std::collections::HashMap;

use crate::{
    db_types::{Order, OrderLine},
    rules::Scalar,
};

/// Names that rule tables use for record keys, with the key each one stands for.
pub const FIELD_ALIASES: [(&str, &str); 3] =
    [("poids_total", "total_weight"), ("pays_code", "country_code"), ("prix_total", "total_price")];

/// The flat key/value view of an order that rule conditions are evaluated against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderRecord {
    fields: HashMap<String, Scalar>,
}

impl OrderRecord {
    /// Builds the record for an order and its lines.
    ///
    /// Exposed keys: `order_number`, `total_price`, `total_weight`, `currency`, `country_code`, `store_name`,
    /// `sub_client`, `shipping_method`, `customer_email`, `customer_name`, `line_count`, `item_count`, `tags`.
    /// Each key in [`FIELD_ALIASES`] carries the same value as the key it stands for. Optional columns that are unset
    /// are left out of the record, so conditions on them fail (except `notEquals`).
    pub fn from_order(order: &Order, lines: &[OrderLine]) -> Self {
        let item_count: i64 = lines.iter().map(|l| l.quantity).sum();
        let mut record = Self::default()
            .with("order_number", order.order_number.as_str())
            .with("total_price", order.total_price)
            .with("total_weight", order.total_weight_kg)
            .with("currency", order.currency.as_str())
            .with("line_count", lines.len() as i64)
            .with("item_count", item_count)
            .with("tags", order.tags.as_str());
        let optional = [
            ("country_code", &order.country_code),
            ("store_name", &order.store_name),
            ("sub_client", &order.sub_client),
            ("shipping_method", &order.shipping_method),
            ("customer_email", &order.customer_email),
            ("customer_name", &order.customer_name),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                record.insert(key, v.as_str());
            }
        }
        for (alias, key) in FIELD_ALIASES {
            if let Some(value) = record.get(key).cloned() {
                record.insert(alias, value);
            }
        }
        record
    }

    pub fn with<K: Into<String>, V: Into<Scalar>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<K: Into<String>, V: Into<Scalar>>(&mut self, key: K, value: V) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
