//! Binds the carrier REST client to the engine's [`CarrierPlatform`] contract.
use std::fmt::Debug;

use carrier_tools::{
    helpers::{parse_decimal, split_tags},
    CarrierApi,
    CarrierApiError,
    CarrierConfig,
    CarrierOrder,
    CarrierProduct,
    EventTarget,
    Shipment,
    StockItem,
};
use log::*;
use wms_sync_engine::{
    carrier_types::{
        DeliveryReceipt,
        ExternalOrder,
        ExternalOrderLine,
        ExternalProduct,
        ExternalStock,
        OrderPage,
        PageCursor,
        ShipmentStatus,
        SyncWindow,
    },
    db_types::{ExternalOrderRef, OutboxEntityType, OutboxEntry},
    sync_api::sync_objects::{SyncSettings, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE},
    CarrierError,
    CarrierPlatform,
};

#[derive(Clone)]
pub struct CarrierGateway {
    api: CarrierApi,
    stock_page_size: u32,
    stock_max_pages: u32,
}

impl Debug for CarrierGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CarrierGateway({})", self.api.config().base_url)
    }
}

impl CarrierGateway {
    pub fn new(config: CarrierConfig) -> Result<Self, CarrierApiError> {
        let api = CarrierApi::new(config)?;
        Ok(Self { api, stock_page_size: DEFAULT_PAGE_SIZE, stock_max_pages: DEFAULT_MAX_PAGES })
    }

    /// The stock listing is read with the same page size and ceiling as the order listing.
    pub fn with_paging(mut self, settings: &SyncSettings) -> Self {
        self.stock_page_size = settings.page_size.max(1);
        self.stock_max_pages = settings.max_pages.max(1);
        self
    }
}

impl CarrierPlatform for CarrierGateway {
    fn check_credentials(&self) -> Result<(), CarrierError> {
        self.api.check_credentials().map_err(carrier_error)
    }

    async fn fetch_orders_page(
        &self,
        window: &SyncWindow,
        cursor: &PageCursor,
        page_size: u32,
    ) -> Result<OrderPage, CarrierError> {
        let cursor = match cursor {
            PageCursor::First => None,
            PageCursor::Next(next) => Some(next.as_str()),
        };
        let page =
            self.api.fetch_orders_page(window.start, window.end, page_size, cursor).await.map_err(carrier_error)?;
        let orders = page.results.into_iter().map(external_order).collect();
        Ok(OrderPage { orders, next: page.next })
    }

    async fn fetch_order(&self, external_id: &str) -> Result<ExternalOrder, CarrierError> {
        self.api.get_order(external_id).await.map(external_order).map_err(carrier_error)
    }

    async fn fetch_product(&self, sku: &str) -> Result<ExternalProduct, CarrierError> {
        self.api.get_product(sku).await.map(external_product).map_err(carrier_error)
    }

    async fn fetch_shipment_status(&self, link: &ExternalOrderRef) -> Result<ShipmentStatus, CarrierError> {
        let shipment = match &link.shipment_id {
            Some(id) => self.api.get_shipment(id).await,
            None => self.api.get_shipment_for_order(&link.external_id).await,
        };
        shipment.map(shipment_status).map_err(carrier_error)
    }

    async fn fetch_stock_levels(&self) -> Result<Vec<ExternalStock>, CarrierError> {
        let items =
            self.api.fetch_all_stock(self.stock_page_size, self.stock_max_pages).await.map_err(carrier_error)?;
        Ok(items.into_iter().map(external_stock).collect())
    }

    async fn deliver_event(&self, entry: &OutboxEntry) -> Result<DeliveryReceipt, CarrierError> {
        let target = match entry.entity_type {
            OutboxEntityType::Order => EventTarget::Order,
            OutboxEntityType::Product => EventTarget::Product,
            OutboxEntityType::Stock => EventTarget::Stock,
        };
        let receipt = self
            .api
            .push_event(target, &entry.entity_id, &entry.event_type, &entry.payload_json())
            .await
            .map_err(carrier_error)?;
        Ok(DeliveryReceipt { http_status: receipt.status, body: receipt.body })
    }
}

/// Folds client errors into the engine's error type. A 404 is reported as `NotFound` so that callers can tell a
/// missing resource from a failing platform.
pub fn carrier_error(e: CarrierApiError) -> CarrierError {
    match e {
        CarrierApiError::MissingCredentials => CarrierError::Configuration(e.to_string()),
        CarrierApiError::Initialization(s) => CarrierError::Configuration(s),
        CarrierApiError::QueryError { status: 404, message } => CarrierError::NotFound(message),
        CarrierApiError::QueryError { status, message } => CarrierError::Http { status, message },
        CarrierApiError::Timeout(s) | CarrierApiError::RestRequestError(s) | CarrierApiError::RestResponseError(s) => {
            CarrierError::Transport(s)
        },
        CarrierApiError::JsonError(s) | CarrierApiError::InvalidAmount(s) => CarrierError::Decode(s),
    }
}

fn amount(value: &str, what: &str, reference: &str) -> f64 {
    parse_decimal(value).unwrap_or_else(|e| {
        warn!("🔄️ Order {reference} has an unreadable {what} ({value}). Using 0 instead. {e}");
        0.0
    })
}

pub fn external_order(order: CarrierOrder) -> ExternalOrder {
    let reference = order.reference;
    let lines = order
        .items
        .into_iter()
        .map(|item| ExternalOrderLine {
            unit_price: amount(&item.unit_price, "unit price", &reference),
            sku: item.sku.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            name: item.name,
            quantity: item.quantity,
        })
        .collect();
    ExternalOrder {
        external_id: order.id.to_string(),
        total_price: amount(&order.total_price, "total price", &reference),
        order_number: reference,
        created_at: order.created_at,
        store_name: order.shop_name,
        sub_client: order.sub_account,
        customer_name: order.recipient.name,
        customer_email: order.recipient.email,
        country_code: order.recipient.country_code.map(|c| c.to_uppercase()),
        shipping_method: order.shipping_method,
        currency: order.currency,
        tags: order.tags.as_deref().map(split_tags).unwrap_or_default().into_iter().collect(),
        lines,
    }
}

fn external_product(product: CarrierProduct) -> ExternalProduct {
    ExternalProduct {
        external_id: product.id.to_string(),
        sku: product.sku,
        name: product.name,
        weight_kg: product.weight_kg,
        volume_m3: product.volume_m3,
    }
}

fn shipment_status(shipment: Shipment) -> ShipmentStatus {
    ShipmentStatus {
        code: shipment.status_code,
        tracking_number: shipment.tracking_number,
        tracking_url: shipment.tracking_url,
    }
}

fn external_stock(item: StockItem) -> ExternalStock {
    let external_product_id = item.product_id.map(|id| id.to_string());
    ExternalStock { sku: item.sku, external_product_id, quantity: item.quantity }
}
