use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 28] = [
        "RUST_LOG",
        "WMS_HOST",
        "WMS_PORT",
        "WMS_DATABASE_URL",
        "WMS_DB_POOL_SIZE",
        "WMS_CLIENT_ID",
        "WMS_CARRIER_BASE_URL",
        "WMS_CARRIER_USERNAME",
        "WMS_CARRIER_TIMEOUT_SECS",
        "WMS_CARRIER_MAX_CONCURRENCY",
        "WMS_SYNC_PAGE_SIZE",
        "WMS_SYNC_MAX_PAGES",
        "WMS_SYNC_INCREMENTAL_DAYS",
        "WMS_OUTBOX_BATCH_SIZE",
        "WMS_DLQ_BATCH_SIZE",
        "WMS_QUEUE_LEASE_MINS",
        "WMS_RETRY_BASE_DELAY_MINS",
        "WMS_MAX_RETRIES",
        "WMS_CLASSIFY_CLIENT_ERRORS",
        "WMS_DLQ_UNKNOWN_EVENTS_FAIL",
        "WMS_RECONCILE_THRESHOLD",
        "WMS_STATUS_POLL_LIMIT",
        "WMS_SCHEDULER_ENABLED",
        "WMS_SCHEDULE_ORDERS_SECS",
        "WMS_SCHEDULE_STATUS_SECS",
        "WMS_SCHEDULE_OUTBOX_SECS",
        "WMS_SCHEDULE_DLQ_SECS",
        "WMS_SCHEDULE_RECONCILE_SECS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
