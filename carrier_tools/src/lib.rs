//! # Carrier platform client
//!
//! A thin REST client for the third-party shipping platform the warehouse synchronises with. It only models the
//! request/response shapes the sync pipeline needs:
//!
//! * paginated order listings (`results`/`next` cursor pagination),
//! * single order, product and shipment lookups,
//! * stock listings (`page`/`per_page` pagination, where a short page is the last page),
//! * outbound event pushes.
//!
//! Every request is Basic-Auth protected, carries a timeout and is gated by a concurrency cap so that scheduled
//! workers cannot flood the platform.
mod api;
mod config;
mod error;

pub mod data_objects;
pub mod helpers;

pub use api::CarrierApi;
pub use config::CarrierConfig;
pub use data_objects::{
    CarrierAddress,
    CarrierOrder,
    CarrierOrderItem,
    CarrierProduct,
    EventReceipt,
    EventTarget,
    Paginated,
    Shipment,
    StockItem,
};
pub use error::CarrierApiError;
