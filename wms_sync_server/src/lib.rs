//! # WMS sync server
//! This crate hosts the HTTP surface of the warehouse carrier sync pipeline. It is responsible for:
//! * Exposing one trigger route per pipeline worker, so that an external cron (or an operator) can run it.
//! * Binding the carrier REST client to the engine's `CarrierPlatform` contract.
//! * Optionally running every worker on a timer from inside the process.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `POST /sync/orders`: Imports carrier orders for an incremental, full or custom date window.
//! * `POST /sync/status`: Polls shipment statuses for linked, non-terminal orders.
//! * `POST /outbox/process`: Delivers due outbound events.
//! * `POST /dlq/process`: Retries due dead-letter jobs.
//! * `POST /reconcile/stock`: Records stock discrepancies between the WMS and the carrier.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod scheduler;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
