use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use wms_sync_engine::{
    sync_api::sync_objects::StatusMap,
    CarrierPlatform,
    DlqApi,
    OrderSyncApi,
    OutboxApi,
    ReconciliationApi,
    SqliteDatabase,
    StatusPollerApi,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::carrier::CarrierGateway,
    routes::{health, PollStatusesRoute, ProcessDlqRoute, ProcessOutboxRoute, ReconcileStockRoute, SyncOrdersRoute},
    scheduler::start_scheduler,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.db_pool_size)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = create_gateway(&config)?;
    if let Err(e) = gateway.check_credentials() {
        warn!("🚨️ {e}. Every sync trigger will fail until the carrier credentials are configured.");
    }
    if config.scheduler.enabled {
        let jobs = start_scheduler(db.clone(), gateway.clone(), &config);
        info!("🕰️ In-process scheduler started with {} jobs", jobs.len());
    } else {
        info!("🕰️ In-process scheduler is disabled. Use the trigger routes to run the pipeline.");
    }
    let srv = create_server_instance(config, db, gateway)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_gateway(config: &ServerConfig) -> Result<CarrierGateway, ServerError> {
    CarrierGateway::new(config.carrier.clone())
        .map(|g| g.with_paging(&config.sync))
        .map_err(|e| ServerError::InitializeError(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: CarrierGateway,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let address = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let orders_api = OrderSyncApi::new(db.clone(), gateway.clone(), config.sync.clone());
        let status_api = StatusPollerApi::new(db.clone(), gateway.clone(), StatusMap::default());
        let outbox_api = OutboxApi::new(db.clone(), gateway.clone(), config.outbox.clone());
        let dlq_api = DlqApi::new(db.clone(), gateway.clone(), config.dlq.clone());
        let reconciliation_api = ReconciliationApi::new(db.clone(), gateway.clone(), config.reconciliation.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("wms::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(status_api))
            .app_data(web::Data::new(outbox_api))
            .app_data(web::Data::new(dlq_api))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(options))
            .service(health)
            .service(SyncOrdersRoute::<SqliteDatabase, CarrierGateway>::new())
            .service(PollStatusesRoute::<SqliteDatabase, CarrierGateway>::new())
            .service(ProcessOutboxRoute::<SqliteDatabase, CarrierGateway>::new())
            .service(ProcessDlqRoute::<SqliteDatabase, CarrierGateway>::new())
            .service(ReconcileStockRoute::<SqliteDatabase, CarrierGateway>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind(address)?
    .run();
    Ok(srv)
}
