use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

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
    traits::{CarrierError, CarrierPlatform},
};

/// An in-memory carrier platform with scriptable failures.
///
/// Clones share state, so a test can keep a handle while a service owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeCarrier {
    state: Arc<Mutex<FakeCarrierState>>,
}

#[derive(Debug, Default)]
pub struct FakeCarrierState {
    pub missing_credentials: bool,
    pub orders: Vec<ExternalOrder>,
    /// 1-based page numbers that fail with a transport error.
    pub failing_pages: HashSet<u32>,
    pub page_requests: u32,
    pub products: HashMap<String, ExternalProduct>,
    pub shipments: HashMap<String, ShipmentStatus>,
    pub stock: Vec<ExternalStock>,
    /// Consumed front to back by `deliver_event`. Once empty, deliveries succeed.
    pub delivery_failures: VecDeque<CarrierError>,
    /// Consumed front to back by `fetch_order`.
    pub order_fetch_failures: VecDeque<CarrierError>,
    pub delivered: Vec<OutboxEntry>,
}

impl FakeCarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeCarrierState> {
        self.state.lock().expect("Fake carrier state lock poisoned")
    }

    pub fn without_credentials(self) -> Self {
        self.state().missing_credentials = true;
        self
    }

    pub fn add_orders<I: IntoIterator<Item = ExternalOrder>>(&self, orders: I) {
        self.state().orders.extend(orders);
    }

    pub fn fail_page(&self, page: u32) {
        self.state().failing_pages.insert(page);
    }

    pub fn add_product(&self, product: ExternalProduct) {
        self.state().products.insert(product.sku.clone(), product);
    }

    pub fn set_shipment(&self, external_id: &str, status: ShipmentStatus) {
        self.state().shipments.insert(external_id.to_string(), status);
    }

    pub fn set_stock(&self, sku: &str, quantity: i64) {
        let mut state = self.state();
        state.stock.retain(|s| s.sku != sku);
        state.stock.push(ExternalStock { sku: sku.to_string(), external_product_id: None, quantity });
    }

    pub fn fail_next_deliveries(&self, errors: Vec<CarrierError>) {
        self.state().delivery_failures.extend(errors);
    }

    pub fn fail_next_order_fetches(&self, errors: Vec<CarrierError>) {
        self.state().order_fetch_failures.extend(errors);
    }

    pub fn delivered_count(&self) -> usize {
        self.state().delivered.len()
    }

    pub fn page_requests(&self) -> u32 {
        self.state().page_requests
    }
}

impl CarrierPlatform for FakeCarrier {
    fn check_credentials(&self) -> Result<(), CarrierError> {
        if self.state().missing_credentials {
            Err(CarrierError::Configuration("CARRIER_API_USERNAME and CARRIER_API_PASSWORD are not set".into()))
        } else {
            Ok(())
        }
    }

    async fn fetch_orders_page(
        &self,
        window: &SyncWindow,
        cursor: &PageCursor,
        page_size: u32,
    ) -> Result<OrderPage, CarrierError> {
        let mut state = self.state();
        state.page_requests += 1;
        let offset = match cursor {
            PageCursor::First => 0,
            PageCursor::Next(c) => c.parse::<usize>().map_err(|e| CarrierError::Decode(e.to_string()))?,
        };
        let page_size = page_size.max(1) as usize;
        let page_number = (offset / page_size) as u32 + 1;
        if state.failing_pages.contains(&page_number) {
            return Err(CarrierError::Transport(format!("Connection reset while reading page {page_number}")));
        }
        let in_window = state
            .orders
            .iter()
            .filter(|o| o.created_at >= window.start && o.created_at <= window.end)
            .cloned()
            .collect::<Vec<_>>();
        let orders = in_window.iter().skip(offset).take(page_size).cloned().collect::<Vec<_>>();
        let end = offset + orders.len();
        let next = (end < in_window.len()).then(|| end.to_string());
        Ok(OrderPage { orders, next })
    }

    async fn fetch_order(&self, external_id: &str) -> Result<ExternalOrder, CarrierError> {
        let mut state = self.state();
        if let Some(e) = state.order_fetch_failures.pop_front() {
            return Err(e);
        }
        state
            .orders
            .iter()
            .find(|o| o.external_id == external_id)
            .cloned()
            .ok_or_else(|| CarrierError::NotFound(format!("order {external_id}")))
    }

    async fn fetch_product(&self, sku: &str) -> Result<ExternalProduct, CarrierError> {
        self.state().products.get(sku).cloned().ok_or_else(|| CarrierError::NotFound(format!("product {sku}")))
    }

    async fn fetch_shipment_status(&self, link: &ExternalOrderRef) -> Result<ShipmentStatus, CarrierError> {
        self.state()
            .shipments
            .get(&link.external_id)
            .cloned()
            .ok_or_else(|| CarrierError::NotFound(format!("shipment for {}", link.external_id)))
    }

    async fn fetch_stock_levels(&self) -> Result<Vec<ExternalStock>, CarrierError> {
        Ok(self.state().stock.clone())
    }

    async fn deliver_event(&self, entry: &OutboxEntry) -> Result<DeliveryReceipt, CarrierError> {
        let mut state = self.state();
        if let Some(e) = state.delivery_failures.pop_front() {
            return Err(e);
        }
        state.delivered.push(entry.clone());
        Ok(DeliveryReceipt { http_status: 200, body: format!("{{\"received\":{}}}", entry.id) })
    }
}
