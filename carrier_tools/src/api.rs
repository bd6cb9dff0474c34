use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Client,
    Method,
    RequestBuilder,
    Response,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::{
    config::CarrierConfig,
    data_objects::{CarrierOrder, CarrierProduct, EventReceipt, EventTarget, Paginated, Shipment, StockItem},
    helpers::is_last_page,
    CarrierApiError,
};

#[derive(Clone)]
pub struct CarrierApi {
    config: CarrierConfig,
    client: Arc<Client>,
    permits: Arc<Semaphore>,
}

impl CarrierApi {
    pub fn new(config: CarrierConfig) -> Result<Self, CarrierApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| CarrierApiError::Initialization(e.to_string()))?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));
        Ok(Self { config, client: Arc::new(client), permits })
    }

    pub fn config(&self) -> &CarrierConfig {
        &self.config
    }

    /// Fails fast when no credentials are configured, so that callers can abort before doing any work.
    pub fn check_credentials(&self) -> Result<(), CarrierApiError> {
        if self.config.has_credentials() {
            Ok(())
        } else {
            Err(CarrierApiError::MissingCredentials)
        }
    }

    /// Resolves `path` against the configured base URL. Absolute URLs (such as `next` cursors handed back by the
    /// platform) are used as-is.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{path}", self.config.base_url.trim_end_matches('/'))
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        trace!("Preparing carrier request: {method} {url}");
        self.client.request(method, url).basic_auth(&self.config.username, Some(self.config.password.reveal()))
    }

    /// Sends the request while holding one of the concurrency permits. Non-2xx responses are turned into
    /// [`CarrierApiError::QueryError`] carrying the status and response body.
    async fn execute(&self, req: RequestBuilder) -> Result<Response, CarrierApiError> {
        let _permit =
            self.permits.acquire().await.map_err(|e| CarrierApiError::RestRequestError(e.to_string()))?;
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                CarrierApiError::Timeout(e.to_string())
            } else {
                CarrierApiError::RestResponseError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("Carrier request successful. {}", response.status());
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| CarrierApiError::RestResponseError(e.to_string()))?;
            debug!("Carrier request failed with {status}: {message}");
            Err(CarrierApiError::QueryError { status, message })
        }
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<B>,
    ) -> Result<T, CarrierApiError> {
        let mut req = self.request(method, path);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = self.execute(req).await?;
        response.json::<T>().await.map_err(|e| CarrierApiError::JsonError(e.to_string()))
    }

    /// Fetches one page of orders created inside `[since, until]`. Pass the `next` URL of the previous page as
    /// `cursor` to continue; the cursor already encodes the filters.
    pub async fn fetch_orders_page(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<Paginated<CarrierOrder>, CarrierApiError> {
        let page = match cursor {
            Some(next) => {
                debug!("Fetching next order page: {next}");
                self.rest_query::<Paginated<CarrierOrder>, ()>(Method::GET, next, &[], None).await?
            },
            None => {
                let params = [
                    ("created_after", since.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ("created_before", until.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ("limit", page_size.to_string()),
                ];
                debug!("Fetching first order page for {} .. {}", params[0].1, params[1].1);
                self.rest_query::<Paginated<CarrierOrder>, ()>(Method::GET, "/orders/", &params, None).await?
            },
        };
        debug!("Fetched {} orders. Next page: {}", page.results.len(), page.next.as_deref().unwrap_or("None"));
        Ok(page)
    }

    pub async fn get_order(&self, order_id: &str) -> Result<CarrierOrder, CarrierApiError> {
        let path = format!("/orders/{order_id}/");
        debug!("Fetching carrier order #{order_id}");
        let result = self.rest_query::<CarrierOrder, ()>(Method::GET, &path, &[], None).await?;
        info!("Fetched carrier order #{order_id}");
        Ok(result)
    }

    pub async fn get_shipment(&self, shipment_id: &str) -> Result<Shipment, CarrierApiError> {
        let path = format!("/shipments/{shipment_id}/");
        trace!("Fetching shipment {shipment_id}");
        self.rest_query::<Shipment, ()>(Method::GET, &path, &[], None).await
    }

    /// Shipment status for an order that has not been assigned a shipment id yet.
    pub async fn get_shipment_for_order(&self, order_id: &str) -> Result<Shipment, CarrierApiError> {
        let path = format!("/orders/{order_id}/shipment/");
        trace!("Fetching shipment for order {order_id}");
        self.rest_query::<Shipment, ()>(Method::GET, &path, &[], None).await
    }

    pub async fn get_product(&self, sku: &str) -> Result<CarrierProduct, CarrierApiError> {
        let path = format!("/products/{sku}/");
        debug!("Fetching carrier product {sku}");
        self.rest_query::<CarrierProduct, ()>(Method::GET, &path, &[], None).await
    }

    pub async fn fetch_stock_page(&self, page: u32, per_page: u32) -> Result<Vec<StockItem>, CarrierApiError> {
        let params = [("page", page.to_string()), ("per_page", per_page.to_string())];
        let items = self.rest_query::<Vec<StockItem>, ()>(Method::GET, "/stock/", &params, None).await?;
        debug!("Fetched {} stock items from page {page}", items.len());
        Ok(items)
    }

    /// Walks the `page`/`per_page` stock listing until a short page is returned, or until `max_pages` have been read.
    pub async fn fetch_all_stock(&self, per_page: u32, max_pages: u32) -> Result<Vec<StockItem>, CarrierApiError> {
        let mut items = vec![];
        let mut page = 1;
        loop {
            let batch = self.fetch_stock_page(page, per_page).await?;
            let last = is_last_page(batch.len(), per_page);
            items.extend(batch);
            if last {
                break;
            }
            if page >= max_pages {
                warn!("Stopped reading stock after {page} pages. The listing may be incomplete.");
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    pub async fn push_event(
        &self,
        target: EventTarget,
        entity_id: &str,
        event_type: &str,
        payload: &Value,
    ) -> Result<EventReceipt, CarrierApiError> {
        let body = serde_json::json!({ "event": event_type, "data": payload });
        let path = target.path(entity_id);
        debug!("Pushing {event_type} event for {target} {entity_id}");
        let response = self.execute(self.request(Method::POST, &path).json(&body)).await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| CarrierApiError::RestResponseError(e.to_string()))?;
        info!("Pushed {event_type} event for {target} {entity_id} ({status})");
        Ok(EventReceipt { status, body })
    }
}
