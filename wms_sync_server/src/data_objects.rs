use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use wms_sync_engine::{
    db_types::{ReconciliationRecord, SyncMode, SyncRunStatus},
    sync_api::{
        queue_objects::QueueRunReport,
        sync_objects::{ReconciliationReport, StatusPollReport, SyncRequest, SyncRunReport},
    },
};

use crate::errors::ServerError;

//----------------------------------------------   Requests  ----------------------------------------------------
/// Body of `POST /sync/orders`. Every field is optional.
///
/// Dates are accepted either as RFC 3339 timestamps or as plain `YYYY-MM-DD` days. A request that gives dates but no
/// mode is treated as a custom run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOrdersParams {
    pub mode: Option<SyncMode>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl SyncOrdersParams {
    pub fn into_request(self) -> Result<SyncRequest, ServerError> {
        let start_date = self.start_date.as_deref().map(|s| parse_date_param(s, false)).transpose()?;
        let end_date = self.end_date.as_deref().map(|s| parse_date_param(s, true)).transpose()?;
        let mode = match self.mode {
            Some(mode) => mode,
            None if start_date.is_some() || end_date.is_some() => SyncMode::Custom,
            None => SyncMode::Incremental,
        };
        Ok(SyncRequest { mode, start_date, end_date })
    }
}

/// Parses a date parameter. A bare day resolves to its first second, or to its last when `end_of_day` is set, so that
/// `endDate=2024-05-31` includes orders created on the 31st.
pub fn parse_date_param(value: &str, end_of_day: bool) -> Result<DateTime<Utc>, ServerError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| ServerError::InvalidRequestBody(format!("Invalid date '{value}': {e}")))?;
    let time = if end_of_day { day.and_hms_opt(23, 59, 59) } else { day.and_hms_opt(0, 0, 0) };
    time.map(|t| Utc.from_utc_datetime(&t))
        .ok_or_else(|| ServerError::InvalidRequestBody(format!("Invalid date '{value}'")))
}

/// Body of the queue and poller triggers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

impl LimitParams {
    pub fn validated(self) -> Result<Option<i64>, ServerError> {
        match self.limit {
            Some(n) if n < 1 => Err(ServerError::InvalidRequestBody(format!("limit must be positive, got {n}"))),
            limit => Ok(limit),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReconcileParams {
    pub threshold_percent: Option<f64>,
}

//----------------------------------------------   Responses  ---------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOrdersResponse {
    /// True for complete and partial runs.
    pub success: bool,
    pub run_id: i64,
    pub mode: SyncMode,
    pub status: SyncRunStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub pages_fetched: u32,
    pub fetched: usize,
    pub truncated: bool,
    pub imported: usize,
    pub skipped: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}

impl From<SyncRunReport> for SyncOrdersResponse {
    fn from(report: SyncRunReport) -> Self {
        let mut errors = report.page_error.into_iter().collect::<Vec<_>>();
        errors.extend(report.import.errors.iter().map(|e| e.to_string()));
        Self {
            success: report.status != SyncRunStatus::Failed,
            run_id: report.run_id,
            mode: report.mode,
            status: report.status,
            start_date: report.window.start,
            end_date: report.window.end,
            pages_fetched: report.pages_fetched,
            fetched: report.fetched,
            truncated: report.truncated,
            imported: report.import.success_count,
            skipped: report.import.skipped_count,
            error_count: report.import.error_count,
            errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPollResponse {
    pub success: bool,
    pub checked: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub tracking_updated: usize,
    pub errors: Vec<String>,
}

impl From<StatusPollReport> for StatusPollResponse {
    fn from(r: StatusPollReport) -> Self {
        Self {
            success: true,
            checked: r.checked,
            updated: r.updated,
            unchanged: r.unchanged,
            tracking_updated: r.tracking_updated,
            errors: r.errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRunResponse {
    pub success: bool,
    pub claimed: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub rescheduled: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl From<QueueRunReport> for QueueRunResponse {
    fn from(r: QueueRunReport) -> Self {
        Self {
            success: true,
            claimed: r.claimed,
            processed: r.processed(),
            succeeded: r.succeeded,
            rescheduled: r.rescheduled,
            failed: r.failed,
            errors: r.errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub success: bool,
    pub checked: usize,
    pub discrepancies: usize,
    pub skipped: usize,
    pub records: Vec<ReconciliationRecord>,
    pub errors: Vec<String>,
}

impl From<ReconciliationReport> for ReconcileResponse {
    fn from(r: ReconciliationReport) -> Self {
        Self {
            success: true,
            checked: r.checked,
            discrepancies: r.discrepancies,
            skipped: r.skipped,
            records: r.records,
            errors: r.errors,
        }
    }
}
