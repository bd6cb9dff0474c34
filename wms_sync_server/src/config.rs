use std::{env, time::Duration as StdDuration};

use carrier_tools::CarrierConfig;
use chrono::Duration;
use log::*;
use wms_common::{env_or_default, parse_boolean_flag};
use wms_sync_engine::sync_api::{
    queue_objects::{DlqSettings, OutboxSettings, UnknownEventPolicy, DEFAULT_BATCH_SIZE, DEFAULT_LEASE_MINS},
    sync_objects::{
        ReconciliationSettings,
        SyncSettings,
        DEFAULT_CLIENT_ID,
        DEFAULT_INCREMENTAL_DAYS,
        DEFAULT_MAX_PAGES,
        DEFAULT_PAGE_SIZE,
        DEFAULT_POLL_LIMIT,
        DEFAULT_RECONCILIATION_THRESHOLD,
    },
    RetryPolicy,
    DEFAULT_BASE_DELAY_MINS,
    DEFAULT_MAX_RETRIES,
};

const DEFAULT_WMS_HOST: &str = "127.0.0.1";
const DEFAULT_WMS_PORT: u16 = 8470;
const DEFAULT_DB_POOL_SIZE: u32 = 10;

const DEFAULT_ORDERS_PERIOD_SECS: u64 = 15 * 60;
const DEFAULT_STATUS_PERIOD_SECS: u64 = 30 * 60;
const DEFAULT_OUTBOX_PERIOD_SECS: u64 = 60;
const DEFAULT_DLQ_PERIOD_SECS: u64 = 5 * 60;
const DEFAULT_RECONCILE_PERIOD_SECS: u64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_pool_size: u32,
    /// Connection details for the carrier platform.
    pub carrier: CarrierConfig,
    pub sync: SyncSettings,
    pub outbox: OutboxSettings,
    pub dlq: DlqSettings,
    pub reconciliation: ReconciliationSettings,
    /// Number of linked orders the status poller checks when the request does not say.
    pub status_poll_limit: i64,
    pub scheduler: SchedulerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_WMS_HOST.to_string(),
            port: DEFAULT_WMS_PORT,
            database_url: String::default(),
            db_pool_size: DEFAULT_DB_POOL_SIZE,
            carrier: CarrierConfig::default(),
            sync: SyncSettings::default(),
            outbox: OutboxSettings::default(),
            dlq: DlqSettings::default(),
            reconciliation: ReconciliationSettings::default(),
            status_poll_limit: DEFAULT_POLL_LIMIT,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("WMS_HOST").ok().unwrap_or_else(|| DEFAULT_WMS_HOST.into());
        let port = env_or_default("WMS_PORT", DEFAULT_WMS_PORT);
        let database_url = env::var("WMS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ WMS_DATABASE_URL is not set. Please set it to the URL for the WMS database.");
            String::default()
        });
        let db_pool_size = env_or_default("WMS_DB_POOL_SIZE", DEFAULT_DB_POOL_SIZE).max(1);
        let carrier = CarrierConfig::new_from_env_or_default();
        let client_id = env_or_default("WMS_CLIENT_ID", DEFAULT_CLIENT_ID);
        let sync = SyncSettings {
            client_id,
            page_size: env_or_default("WMS_SYNC_PAGE_SIZE", DEFAULT_PAGE_SIZE).max(1),
            max_pages: env_or_default("WMS_SYNC_MAX_PAGES", DEFAULT_MAX_PAGES).max(1),
            incremental_days: env_or_default("WMS_SYNC_INCREMENTAL_DAYS", DEFAULT_INCREMENTAL_DAYS).max(1),
        };
        let retry = retry_policy_from_env();
        let lease = Duration::minutes(env_or_default("WMS_QUEUE_LEASE_MINS", DEFAULT_LEASE_MINS).max(1));
        let lease = lease_covering_timeout(lease, carrier.timeout);
        let outbox = OutboxSettings {
            batch_size: env_or_default("WMS_OUTBOX_BATCH_SIZE", DEFAULT_BATCH_SIZE).max(1),
            lease,
            retry: retry.clone(),
        };
        let unknown_event_policy = if parse_boolean_flag(env::var("WMS_DLQ_UNKNOWN_EVENTS_FAIL").ok(), false) {
            UnknownEventPolicy::FailImmediately
        } else {
            UnknownEventPolicy::Retry
        };
        let dlq = DlqSettings {
            client_id,
            batch_size: env_or_default("WMS_DLQ_BATCH_SIZE", DEFAULT_BATCH_SIZE).max(1),
            lease,
            retry,
            unknown_event_policy,
        };
        let threshold_percent = env_or_default("WMS_RECONCILE_THRESHOLD", DEFAULT_RECONCILIATION_THRESHOLD);
        let threshold_percent = if threshold_percent.is_finite() && threshold_percent >= 0.0 {
            threshold_percent
        } else {
            warn!(
                "🪛️ WMS_RECONCILE_THRESHOLD must be a non-negative number. Using the default, \
                 {DEFAULT_RECONCILIATION_THRESHOLD}, instead."
            );
            DEFAULT_RECONCILIATION_THRESHOLD
        };
        let reconciliation = ReconciliationSettings { client_id, threshold_percent };
        let status_poll_limit = env_or_default("WMS_STATUS_POLL_LIMIT", DEFAULT_POLL_LIMIT).max(1);
        let scheduler = SchedulerConfig::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            db_pool_size,
            carrier,
            sync,
            outbox,
            dlq,
            reconciliation,
            status_poll_limit,
            scheduler,
        }
    }
}

/// A queue worker renews its lease on a row just before the carrier call, so the lease must outlast the slowest call.
/// Leases shorter than twice the carrier timeout are raised to that.
pub fn lease_covering_timeout(lease: Duration, timeout: StdDuration) -> Duration {
    let minimum = Duration::from_std(timeout * 2).unwrap_or(lease);
    if lease < minimum {
        warn!(
            "🪛️ WMS_QUEUE_LEASE_MINS ({} min) does not cover the carrier timeout ({}s). Using a lease of {}s instead.",
            lease.num_minutes(),
            timeout.as_secs(),
            minimum.num_seconds()
        );
        minimum
    } else {
        lease
    }
}

fn retry_policy_from_env() -> RetryPolicy {
    let base_delay_mins = env_or_default("WMS_RETRY_BASE_DELAY_MINS", DEFAULT_BASE_DELAY_MINS).max(1);
    let max_retries = env_or_default("WMS_MAX_RETRIES", DEFAULT_MAX_RETRIES).max(1);
    let classify_client_errors = parse_boolean_flag(env::var("WMS_CLASSIFY_CLIENT_ERRORS").ok(), false);
    if classify_client_errors {
        info!("🪛️ 4xx responses from the carrier platform will fail queue entries without retrying.");
    }
    RetryPolicy { base_delay: Duration::minutes(base_delay_mins), max_retries, classify_client_errors }
}

//-------------------------------------------------  SchedulerConfig  --------------------------------------------------
/// Periods for the in-process scheduler. The scheduler is off unless `WMS_SCHEDULER_ENABLED` is set, in which case an
/// external cron is expected to call the trigger routes instead.
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub sync_orders: StdDuration,
    pub poll_statuses: StdDuration,
    pub process_outbox: StdDuration,
    pub process_dlq: StdDuration,
    pub reconcile_stock: StdDuration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sync_orders: StdDuration::from_secs(DEFAULT_ORDERS_PERIOD_SECS),
            poll_statuses: StdDuration::from_secs(DEFAULT_STATUS_PERIOD_SECS),
            process_outbox: StdDuration::from_secs(DEFAULT_OUTBOX_PERIOD_SECS),
            process_dlq: StdDuration::from_secs(DEFAULT_DLQ_PERIOD_SECS),
            reconcile_stock: StdDuration::from_secs(DEFAULT_RECONCILE_PERIOD_SECS),
        }
    }
}

impl SchedulerConfig {
    pub fn from_env_or_default() -> Self {
        let enabled = parse_boolean_flag(env::var("WMS_SCHEDULER_ENABLED").ok(), false);
        let period = |name: &str, default: u64| StdDuration::from_secs(env_or_default(name, default).max(1));
        Self {
            enabled,
            sync_orders: period("WMS_SCHEDULE_ORDERS_SECS", DEFAULT_ORDERS_PERIOD_SECS),
            poll_statuses: period("WMS_SCHEDULE_STATUS_SECS", DEFAULT_STATUS_PERIOD_SECS),
            process_outbox: period("WMS_SCHEDULE_OUTBOX_SECS", DEFAULT_OUTBOX_PERIOD_SECS),
            process_dlq: period("WMS_SCHEDULE_DLQ_SECS", DEFAULT_DLQ_PERIOD_SECS),
            reconcile_stock: period("WMS_SCHEDULE_RECONCILE_SECS", DEFAULT_RECONCILE_PERIOD_SECS),
        }
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The subset of the configuration that request handlers need. Secrets stay out of it.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub status_poll_limit: i64,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { status_poll_limit: config.status_poll_limit }
    }
}
