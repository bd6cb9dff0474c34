use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {kind}: {value}")]
pub struct ConversionError {
    pub kind: &'static str,
    pub value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

//--------------------------------------     OrderStatus       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Imported, not yet picked up by the warehouse or the carrier.
    Pending,
    /// Being picked and packed.
    Preparing,
    /// Handed over to the carrier.
    InTransit,
    /// The carrier reports the parcel as delivered.
    Delivered,
    /// Shipped by the warehouse outside the carrier flow.
    Shipped,
    /// Closed by an operator.
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Terminal orders are never modified by the sync pipeline again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Shipped | Self::Completed | Self::Cancelled)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Preparing => write!(f, "preparing"),
            OrderStatus::InTransit => write!(f, "in_transit"),
            OrderStatus::Delivered => write!(f, "delivered"),
            OrderStatus::Shipped => write!(f, "shipped"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "preparing" => Ok(Self::Preparing),
            "in_transit" => Ok(Self::InTransit),
            "delivered" => Ok(Self::Delivered),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError::new("order status", s)),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to pending");
            OrderStatus::Pending
        })
    }
}

//--------------------------------------        Tags         -----------------------------------------------------------
/// Tags are stored as a single comma-separated column.
pub fn parse_tags(tags: &str) -> BTreeSet<String> {
    tags.split(',').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect()
}

pub fn join_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

//--------------------------------------        Order        -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub client_id: i64,
    pub order_number: String,
    pub store_name: Option<String>,
    pub sub_client: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub country_code: Option<String>,
    pub shipping_method: Option<String>,
    pub total_price: f64,
    pub currency: String,
    pub total_weight_kg: f64,
    pub status: OrderStatus,
    pub tags: String,
    pub carrier: Option<String>,
    pub volumetric_weight: Option<f64>,
    pub billable_weight: Option<f64>,
    pub carton_type: Option<String>,
    pub expediteur_name: Option<String>,
    pub expediteur_company: Option<String>,
    pub expediteur_address1: Option<String>,
    pub expediteur_address2: Option<String>,
    pub expediteur_zip: Option<String>,
    pub expediteur_city: Option<String>,
    pub expediteur_country: Option<String>,
    pub expediteur_phone: Option<String>,
    pub expediteur_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn tag_set(&self) -> BTreeSet<String> {
        parse_tags(&self.tags)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} ({}, client {})", self.id, self.order_number, self.status, self.client_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub client_id: i64,
    pub order_number: String,
    pub store_name: Option<String>,
    pub sub_client: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub country_code: Option<String>,
    pub shipping_method: Option<String>,
    pub total_price: f64,
    pub currency: String,
    pub total_weight_kg: f64,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(client_id: i64, order_number: S) -> Self {
        Self {
            client_id,
            order_number: order_number.into(),
            store_name: None,
            sub_client: None,
            customer_name: None,
            customer_email: None,
            country_code: None,
            shipping_method: None,
            total_price: 0.0,
            currency: "EUR".to_string(),
            total_weight_kg: 0.0,
            tags: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }
}

/// The fields the rule application service is allowed to write. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedFieldsUpdate {
    pub tags: Option<BTreeSet<String>>,
    pub carrier: Option<String>,
    pub volumetric_weight: Option<f64>,
    pub billable_weight: Option<f64>,
    pub carton_type: Option<String>,
    pub expediteur: Option<SenderAddress>,
}

impl DerivedFieldsUpdate {
    pub fn is_empty(&self) -> bool {
        self.tags.is_none() &&
            self.carrier.is_none() &&
            self.volumetric_weight.is_none() &&
            self.billable_weight.is_none() &&
            self.carton_type.is_none() &&
            self.expediteur.is_none()
    }
}

//--------------------------------------      OrderLine      -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: i64,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: f64,
}

//--------------------------------------       Product       -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub client_id: i64,
    pub sku: String,
    pub name: String,
    pub unit_weight_kg: f64,
    pub volume_m3: f64,
    pub stock_quantity: i64,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub client_id: i64,
    pub sku: String,
    pub name: String,
    pub unit_weight_kg: f64,
    pub volume_m3: f64,
    pub stock_quantity: i64,
    pub external_id: Option<String>,
}

impl NewProduct {
    pub fn new<S: Into<String>>(client_id: i64, sku: S, name: S) -> Self {
        Self {
            client_id,
            sku: sku.into(),
            name: name.into(),
            unit_weight_kg: 0.0,
            volume_m3: 0.0,
            stock_quantity: 0,
            external_id: None,
        }
    }
}

/// Catalogue data pulled from the carrier platform. Stock quantities are never part of a product upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductUpsert {
    pub client_id: i64,
    pub sku: String,
    pub name: String,
    pub unit_weight_kg: Option<f64>,
    pub volume_m3: Option<f64>,
    pub external_id: Option<String>,
}

//--------------------------------------   ExternalOrderRef  -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ExternalOrderRef {
    pub id: i64,
    pub order_id: i64,
    pub external_id: String,
    pub shipment_id: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub external_status_code: Option<i64>,
    pub last_synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// An existing mapping together with the local status of the order it points at.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct KnownExternalOrder {
    pub order_id: i64,
    pub external_id: String,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkedOrder {
    pub order: Order,
    pub external: ExternalOrderRef,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingUpdate {
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub external_status_code: Option<i64>,
}

//--------------------------------------   Rule side tables  -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CartonType {
    pub id: i64,
    pub name: String,
    pub volume_cm3: f64,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SenderAddress {
    pub id: i64,
    pub client_id: i64,
    pub name: Option<String>,
    pub company: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub zip: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

//--------------------------------------     Outbox          -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Sent,
    Failed,
}

/// The platform resource an outbox entry is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OutboxEntityType {
    Order,
    Product,
    Stock,
}

impl Display for OutboxEntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Order => write!(f, "order"),
            Self::Product => write!(f, "product"),
            Self::Stock => write!(f, "stock"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: i64,
    pub event_type: String,
    pub entity_type: OutboxEntityType,
    pub entity_id: String,
    pub payload: String,
    pub status: OutboxStatus,
    pub retry_count: i64,
    pub max_retries: i64,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub external_response: Option<String>,
    pub claimed_by: Option<String>,
    pub leased_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboxEntry {
    pub fn payload_json(&self) -> Value {
        serde_json::from_str(&self.payload).unwrap_or(Value::String(self.payload.clone()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOutboxEntry {
    pub event_type: String,
    pub entity_type: OutboxEntityType,
    pub entity_id: String,
    pub payload: Value,
    pub max_retries: i64,
}

//--------------------------------------  Dead-letter queue  -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DlqStatus {
    Pending,
    /// Claimed by a worker, external call in progress. A row stuck here with an expired lease means the worker died
    /// mid-call.
    Retrying,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct DlqMessage {
    pub id: i64,
    pub event_type: String,
    pub payload: String,
    pub status: DlqStatus,
    pub retry_count: i64,
    pub max_retries: i64,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub claimed_by: Option<String>,
    pub leased_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DlqMessage {
    pub fn payload_json(&self) -> Value {
        serde_json::from_str(&self.payload).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDlqMessage {
    pub event_type: String,
    pub payload: Value,
    pub max_retries: i64,
}

//--------------------------------------  Delivery attempts  -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    Outbox,
    Dlq,
}

/// Immutable history row, one per delivery attempt of an outbox entry or DLQ message.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub id: i64,
    pub queue: QueueKind,
    pub entry_id: i64,
    pub attempt: i64,
    pub success: bool,
    pub latency_ms: i64,
    pub http_status: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDeliveryAttempt {
    pub queue: QueueKind,
    pub entry_id: i64,
    pub attempt: i64,
    pub success: bool,
    pub latency_ms: i64,
    pub http_status: Option<i64>,
    pub error_message: Option<String>,
}

//--------------------------------------    Reconciliation   -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    pub id: i64,
    pub product_ref: String,
    pub stock_local: i64,
    pub stock_external: i64,
    pub delta: i64,
    pub delta_percent: f64,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReconciliationRecord {
    pub product_ref: String,
    pub stock_local: i64,
    pub stock_external: i64,
    pub delta: i64,
    pub delta_percent: f64,
}

//--------------------------------------       SyncRun       -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// The last seven days.
    Incremental,
    /// Everything since the platform epoch.
    Full,
    /// An explicit start and end date.
    Custom,
}

impl Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Incremental => write!(f, "incremental"),
            SyncMode::Full => write!(f, "full"),
            SyncMode::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for SyncMode {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(Self::Incremental),
            "full" => Ok(Self::Full),
            "custom" => Ok(Self::Custom),
            _ => Err(ConversionError::new("sync mode", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Success,
    /// Some orders or pages failed, but the run completed.
    Partial,
    Failed,
}

impl Display for SyncRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncRunStatus::Success => write!(f, "success"),
            SyncRunStatus::Partial => write!(f, "partial"),
            SyncRunStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: i64,
    pub mode: SyncMode,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub pages_fetched: i64,
    pub fetched_count: i64,
    pub created_count: i64,
    pub skipped_count: i64,
    pub failed_count: i64,
    pub status: SyncRunStatus,
    pub truncated: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncRun {
    pub mode: SyncMode,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub pages_fetched: i64,
    pub fetched_count: i64,
    pub created_count: i64,
    pub skipped_count: i64,
    pub failed_count: i64,
    pub status: SyncRunStatus,
    pub truncated: bool,
    pub error_message: Option<String>,
}
