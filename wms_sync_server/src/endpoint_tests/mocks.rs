use mockall::mock;
use wms_sync_engine::{
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
    CarrierError,
    CarrierPlatform,
};

mock! {
    pub Carrier {}
    impl CarrierPlatform for Carrier {
        fn check_credentials(&self) -> Result<(), CarrierError>;
        async fn fetch_orders_page(&self, window: &SyncWindow, cursor: &PageCursor, page_size: u32) -> Result<OrderPage, CarrierError>;
        async fn fetch_order(&self, external_id: &str) -> Result<ExternalOrder, CarrierError>;
        async fn fetch_product(&self, sku: &str) -> Result<ExternalProduct, CarrierError>;
        async fn fetch_shipment_status(&self, link: &ExternalOrderRef) -> Result<ShipmentStatus, CarrierError>;
        async fn fetch_stock_levels(&self) -> Result<Vec<ExternalStock>, CarrierError>;
        async fn deliver_event(&self, entry: &OutboxEntry) -> Result<DeliveryReceipt, CarrierError>;
    }
}

/// A carrier mock whose credentials check passes.
pub fn configured_carrier() -> MockCarrier {
    let mut carrier = MockCarrier::new();
    carrier.expect_check_credentials().returning(|| Ok(()));
    carrier
}

/// A carrier mock that reports missing credentials, and fails the test if anything else is called.
pub fn unconfigured_carrier() -> MockCarrier {
    let mut carrier = MockCarrier::new();
    carrier
        .expect_check_credentials()
        .returning(|| Err(CarrierError::Configuration("WMS_CARRIER_USERNAME is not set".into())));
    carrier
}
