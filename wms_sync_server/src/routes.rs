//! Request handler definitions
//!
//! Each worker of the sync pipeline is exposed as a `POST` trigger, so that an external scheduler (or an operator) can
//! run it on demand. Request bodies are optional JSON objects; missing fields fall back to the configured defaults.
//!
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here awaits the engine, which does its I/O
//! asynchronously, so long-running syncs do not stall the server.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use wms_sync_engine::{
    CarrierPlatform,
    DlqApi,
    OrderSyncApi,
    OutboxApi,
    ReconciliationApi,
    StatusPollerApi,
    SyncDatabase,
};

use crate::{
    config::ServerOptions,
    data_objects::{
        LimitParams,
        QueueRunResponse,
        ReconcileParams,
        ReconcileResponse,
        StatusPollResponse,
        SyncOrdersParams,
        SyncOrdersResponse,
    },
    errors::ServerError,
    helpers::parse_optional_body,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Order sync  ----------------------------------------------------
route!(sync_orders => Post "/sync/orders" impl SyncDatabase, CarrierPlatform);
/// Route handler for the order sync trigger
///
/// Body: `{"mode": "incremental" | "full" | "custom", "startDate": "...", "endDate": "..."}`.
///
/// Partial runs (a failed page after the first, or per-order import errors) still return 200, with the failures
/// listed under `errors`. Missing credentials, or a failure to fetch even the first page, return 500.
pub async fn sync_orders<B, P>(
    body: web::Bytes,
    api: web::Data<OrderSyncApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SyncDatabase,
    P: CarrierPlatform,
{
    let params = parse_optional_body::<SyncOrdersParams>(&body)?;
    debug!("💻️ POST sync orders: {params:?}");
    let request = params.into_request()?;
    let report = api.sync_orders(request).await?;
    let import = &report.import;
    info!(
        "💻️ Order sync run #{} finished: {}. {} imported, {} skipped, {} errors",
        report.run_id, report.status, import.success_count, import.skipped_count, import.error_count
    );
    Ok(HttpResponse::Ok().json(SyncOrdersResponse::from(report)))
}

//----------------------------------------------   Status poll  ----------------------------------------------------
route!(poll_statuses => Post "/sync/status" impl SyncDatabase, CarrierPlatform);
pub async fn poll_statuses<B, P>(
    body: web::Bytes,
    api: web::Data<StatusPollerApi<B, P>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: SyncDatabase,
    P: CarrierPlatform,
{
    let limit = parse_optional_body::<LimitParams>(&body)?.validated()?.unwrap_or(options.status_poll_limit);
    debug!("💻️ POST poll statuses. limit: {limit}");
    let report = api.poll_statuses(limit).await?;
    info!("💻️ Status poll checked {} orders and updated {}", report.checked, report.updated);
    Ok(HttpResponse::Ok().json(StatusPollResponse::from(report)))
}

//----------------------------------------------   Outbox  ----------------------------------------------------
route!(process_outbox => Post "/outbox/process" impl SyncDatabase, CarrierPlatform);
pub async fn process_outbox<B, P>(
    body: web::Bytes,
    api: web::Data<OutboxApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SyncDatabase,
    P: CarrierPlatform,
{
    let limit = parse_optional_body::<LimitParams>(&body)?.validated()?;
    debug!("💻️ POST process outbox. limit: {limit:?}");
    let report = api.process_due(limit).await?;
    Ok(HttpResponse::Ok().json(QueueRunResponse::from(report)))
}

//----------------------------------------------   DLQ  ----------------------------------------------------
route!(process_dlq => Post "/dlq/process" impl SyncDatabase, CarrierPlatform);
pub async fn process_dlq<B, P>(body: web::Bytes, api: web::Data<DlqApi<B, P>>) -> Result<HttpResponse, ServerError>
where
    B: SyncDatabase,
    P: CarrierPlatform,
{
    let limit = parse_optional_body::<LimitParams>(&body)?.validated()?;
    debug!("💻️ POST process DLQ. limit: {limit:?}");
    let report = api.process_due(limit).await?;
    Ok(HttpResponse::Ok().json(QueueRunResponse::from(report)))
}

//----------------------------------------------   Reconciliation  ----------------------------------------------------
route!(reconcile_stock => Post "/reconcile/stock" impl SyncDatabase, CarrierPlatform);
/// Compares local stock with the carrier's listing and records the discrepancies above the threshold. Stock levels are
/// never changed.
pub async fn reconcile_stock<B, P>(
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: SyncDatabase,
    P: CarrierPlatform,
{
    let params = parse_optional_body::<ReconcileParams>(&body)?;
    debug!("💻️ POST reconcile stock. {params:?}");
    let report = api.reconcile_stock(params.threshold_percent).await?;
    info!("💻️ Stock reconciliation checked {} products, {} discrepancies", report.checked, report.discrepancies);
    Ok(HttpResponse::Ok().json(ReconcileResponse::from(report)))
}
