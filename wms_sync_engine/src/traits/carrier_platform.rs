use thiserror::Error;

use crate::{
    carrier_types::{
        DeliveryReceipt,
        ExternalOrder,
        ExternalProduct,
        ExternalStock,
        OrderPage,
        PageCursor,
        ShipmentStatus,
        SyncWindow,
    },
    db_types::{ExternalOrderRef, OutboxEntry},
};

/// The third-party carrier platform, as seen by the sync pipeline.
///
/// Implementations are expected to apply their own request timeout and concurrency cap.
#[allow(async_fn_in_trait)]
pub trait CarrierPlatform {
    /// Fails when the platform credentials are missing. Workers call this before doing any work.
    fn check_credentials(&self) -> Result<(), CarrierError>;

    async fn fetch_orders_page(
        &self,
        window: &SyncWindow,
        cursor: &PageCursor,
        page_size: u32,
    ) -> Result<OrderPage, CarrierError>;

    async fn fetch_order(&self, external_id: &str) -> Result<ExternalOrder, CarrierError>;

    async fn fetch_product(&self, sku: &str) -> Result<ExternalProduct, CarrierError>;

    async fn fetch_shipment_status(&self, link: &ExternalOrderRef) -> Result<ShipmentStatus, CarrierError>;

    /// The complete stock listing.
    async fn fetch_stock_levels(&self) -> Result<Vec<ExternalStock>, CarrierError>;

    /// Delivers an outbox event to the endpoint for its entity type.
    async fn deliver_event(&self, entry: &OutboxEntry) -> Result<DeliveryReceipt, CarrierError>;
}

#[derive(Debug, Clone, Error)]
pub enum CarrierError {
    #[error("Carrier platform is not configured: {0}")]
    Configuration(String),
    #[error("Could not reach the carrier platform: {0}")]
    Transport(String),
    #[error("Carrier platform returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Could not decode the carrier response: {0}")]
    Decode(String),
    #[error("Not found on the carrier platform: {0}")]
    NotFound(String),
}

impl CarrierError {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            CarrierError::Http { status, .. } => Some(*status),
            CarrierError::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// 4xx responses, which usually mean the request itself is bad and retrying it will not help.
    pub fn is_client_error(&self) -> bool {
        self.http_status().is_some_and(|s| (400..500).contains(&s))
    }
}
