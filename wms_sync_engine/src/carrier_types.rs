//! Provider-agnostic representations of the data the engine pulls from, and pushes to, the carrier platform.
//!
//! Adapters for a specific carrier API convert their wire types into these.
use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The inclusive creation-date window an order sync covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The fixed lower bound used by full syncs.
    pub fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single().unwrap_or_default()
    }
}

/// Where to continue reading a paginated order listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    First,
    /// Opaque continuation handed back by the platform with the previous page.
    Next(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPage {
    pub orders: Vec<ExternalOrder>,
    /// `None` when this was the last page.
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalOrderLine {
    pub sku: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalOrder {
    pub external_id: String,
    pub order_number: String,
    pub created_at: DateTime<Utc>,
    pub store_name: Option<String>,
    pub sub_client: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub country_code: Option<String>,
    pub shipping_method: Option<String>,
    pub total_price: f64,
    pub currency: String,
    pub tags: BTreeSet<String>,
    pub lines: Vec<ExternalOrderLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalProduct {
    pub external_id: String,
    pub sku: String,
    pub name: String,
    pub weight_kg: Option<f64>,
    pub volume_m3: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentStatus {
    pub code: i64,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalStock {
    pub sku: String,
    pub external_product_id: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub http_status: u16,
    pub body: String,
}
