use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    carrier_types::SyncWindow,
    db_types::{OrderStatus, ReconciliationRecord, SyncMode, SyncRunStatus},
    rules::volumetric::ParcelMetrics,
    sync_api::SyncApiError,
};

pub const DEFAULT_CLIENT_ID: i64 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_MAX_PAGES: u32 = 50;
pub const DEFAULT_INCREMENTAL_DAYS: i64 = 7;
pub const DEFAULT_POLL_LIMIT: i64 = 100;
pub const DEFAULT_RECONCILIATION_THRESHOLD: f64 = 10.0;

//--------------------------------------    Order sync      ------------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Orders and products are imported on behalf of this client.
    pub client_id: i64,
    pub page_size: u32,
    /// Safety ceiling on the number of pages read in one run. Reaching it truncates the run.
    pub max_pages: u32,
    pub incremental_days: i64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            incremental_days: DEFAULT_INCREMENTAL_DAYS,
        }
    }
}

/// What to sync. Custom runs must give both bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub mode: SyncMode,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Default for SyncRequest {
    fn default() -> Self {
        Self { mode: SyncMode::Incremental, start_date: None, end_date: None }
    }
}

impl SyncRequest {
    pub fn incremental() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self { mode: SyncMode::Full, ..Default::default() }
    }

    pub fn custom(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { mode: SyncMode::Custom, start_date: Some(start), end_date: Some(end) }
    }

    /// Resolves the request into a concrete window, relative to `now`.
    pub fn window(&self, settings: &SyncSettings, now: DateTime<Utc>) -> Result<SyncWindow, SyncApiError> {
        match self.mode {
            SyncMode::Incremental => Ok(SyncWindow::new(now - Duration::days(settings.incremental_days), now)),
            SyncMode::Full => Ok(SyncWindow::new(SyncWindow::epoch(), now)),
            SyncMode::Custom => {
                let (Some(start), Some(end)) = (self.start_date, self.end_date) else {
                    return Err(SyncApiError::InvalidRequest(
                        "A custom sync requires both a start date and an end date".to_string(),
                    ));
                };
                if start > end {
                    return Err(SyncApiError::InvalidRequest(format!("Start date {start} is after end date {end}")));
                }
                Ok(SyncWindow::new(start, end))
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncRunReport {
    pub run_id: i64,
    pub mode: SyncMode,
    pub window: SyncWindow,
    pub status: SyncRunStatus,
    pub pages_fetched: u32,
    pub fetched: usize,
    pub truncated: bool,
    pub import: ImportResult,
    pub page_error: Option<String>,
}

//--------------------------------------    Batch import    ------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorLevel {
    /// The whole order was rejected.
    Order,
    /// The order was created, but one of its lines was not.
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportError {
    pub external_id: String,
    pub level: ErrorLevel,
    pub message: String,
}

impl ImportError {
    pub fn order<S: Into<String>>(external_id: &str, message: S) -> Self {
        Self { external_id: external_id.to_string(), level: ErrorLevel::Order, message: message.into() }
    }

    pub fn line<S: Into<String>>(external_id: &str, message: S) -> Self {
        Self { external_id: external_id.to_string(), level: ErrorLevel::Line, message: message.into() }
    }
}

impl Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.external_id, self.message)
    }
}

/// The outcome of one batch import. `error_count` covers both order- and line-level errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub success_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub errors: Vec<ImportError>,
}

impl ImportResult {
    pub fn push_error(&mut self, error: ImportError) {
        self.error_count += 1;
        self.errors.push(error);
    }

    /// Number of orders that were rejected outright.
    pub fn failed_orders(&self) -> usize {
        self.errors.iter().filter(|e| e.level == ErrorLevel::Order).count()
    }

    pub fn is_clean(&self) -> bool {
        self.error_count == 0
    }
}

//--------------------------------------  Rule application  ------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStep {
    /// Loading the order's lines, which every other step's record is built from.
    OrderLines,
    Tags,
    Transport,
    Volumetric,
    Expediteur,
    Persist,
}

impl Display for RuleStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleStep::OrderLines => write!(f, "order_lines"),
            RuleStep::Tags => write!(f, "tags"),
            RuleStep::Transport => write!(f, "transport"),
            RuleStep::Volumetric => write!(f, "volumetric"),
            RuleStep::Expediteur => write!(f, "expediteur"),
            RuleStep::Persist => write!(f, "persist"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleStepError {
    pub step: RuleStep,
    pub message: String,
}

/// What the rule application service changed on an order, and which steps failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleApplicationReport {
    pub order_id: i64,
    pub tags_added: Vec<String>,
    pub carrier: Option<String>,
    pub metrics: Option<ParcelMetrics>,
    pub carton_type: Option<String>,
    pub sender_address_id: Option<i64>,
    pub errors: Vec<RuleStepError>,
}

impl RuleApplicationReport {
    pub fn new(order_id: i64) -> Self {
        Self { order_id, ..Default::default() }
    }

    pub fn fail<E: Display>(&mut self, step: RuleStep, e: E) {
        self.errors.push(RuleStepError { step, message: e.to_string() });
    }

    pub fn has_changes(&self) -> bool {
        !self.tags_added.is_empty() ||
            self.carrier.is_some() ||
            self.metrics.is_some() ||
            self.carton_type.is_some() ||
            self.sender_address_id.is_some()
    }
}

//--------------------------------------   Status polling   ------------------------------------------------------------
/// Maps carrier shipment codes onto local statuses through an ordered threshold table.
///
/// The first threshold (scanning from the highest) that the code reaches wins. Codes below every threshold map to the
/// fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMap {
    thresholds: Vec<(i64, OrderStatus)>,
    fallback: OrderStatus,
}

impl Default for StatusMap {
    fn default() -> Self {
        Self::new(
            vec![(3000, OrderStatus::Delivered), (2000, OrderStatus::InTransit), (1000, OrderStatus::Preparing)],
            OrderStatus::Pending,
        )
    }
}

impl StatusMap {
    pub fn new(mut thresholds: Vec<(i64, OrderStatus)>, fallback: OrderStatus) -> Self {
        thresholds.sort_by(|a, b| b.0.cmp(&a.0));
        Self { thresholds, fallback }
    }

    pub fn map(&self, code: i64) -> OrderStatus {
        self.thresholds.iter().find(|(min, _)| code >= *min).map(|(_, s)| *s).unwrap_or(self.fallback)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusPollReport {
    pub checked: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub tracking_updated: usize,
    pub errors: Vec<String>,
}

//--------------------------------------   Reconciliation   ------------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationSettings {
    pub client_id: i64,
    pub threshold_percent: f64,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self { client_id: DEFAULT_CLIENT_ID, threshold_percent: DEFAULT_RECONCILIATION_THRESHOLD }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub checked: usize,
    pub discrepancies: usize,
    pub skipped: usize,
    pub records: Vec<ReconciliationRecord>,
    pub errors: Vec<String>,
}
