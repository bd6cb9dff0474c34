use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `results`/`next` envelope used by the cursor-paginated endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Paginated<T> {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CarrierAddress {
    pub name: Option<String>,
    pub email: Option<String>,
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CarrierOrderItem {
    pub sku: Option<String>,
    pub name: String,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CarrierOrder {
    pub id: u64,
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub shop_name: Option<String>,
    pub sub_account: Option<String>,
    pub shipping_method: Option<String>,
    #[serde(default)]
    pub total_price: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub recipient: CarrierAddress,
    #[serde(default)]
    pub items: Vec<CarrierOrderItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Shipment {
    pub id: u64,
    pub status_code: i64,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StockItem {
    pub sku: String,
    pub product_id: Option<u64>,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CarrierProduct {
    pub id: u64,
    pub sku: String,
    pub name: String,
    pub weight_kg: Option<f64>,
    pub volume_m3: Option<f64>,
}

/// The platform resources that accept pushed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    Order,
    Product,
    Stock,
}

impl EventTarget {
    pub fn path(&self, entity_id: &str) -> String {
        match self {
            Self::Order => format!("/orders/{entity_id}/events/"),
            Self::Product => format!("/products/{entity_id}/events/"),
            Self::Stock => format!("/stock/{entity_id}/adjustments/"),
        }
    }
}

impl Display for EventTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Order => write!(f, "order"),
            Self::Product => write!(f, "product"),
            Self::Stock => write!(f, "stock"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReceipt {
    pub status: u16,
    pub body: String,
}
