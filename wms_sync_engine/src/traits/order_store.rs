use crate::{
    db_types::{
        DerivedFieldsUpdate,
        ExternalOrderRef,
        KnownExternalOrder,
        LinkedOrder,
        NewOrder,
        NewOrderLine,
        Order,
        OrderLine,
        OrderStatus,
        Product,
        ProductUpsert,
        TrackingUpdate,
    },
    traits::SyncDatabaseError,
};

/// Orders, their lines, their links to the carrier platform, and the product catalogue they reference.
#[allow(async_fn_in_trait)]
pub trait OrderStore {
    /// Fetches the existing links for the given external ids in a single query. Ids that have never been imported are
    /// simply absent from the result.
    async fn fetch_known_external_orders(
        &self,
        external_ids: &[String],
    ) -> Result<Vec<KnownExternalOrder>, SyncDatabaseError>;

    /// Creates the order, its lines and its external link in one atomic transaction.
    ///
    /// If `external_id` is already linked to another order, nothing is written and
    /// [`SyncDatabaseError::DuplicateExternalId`] is returned.
    async fn create_linked_order(
        &self,
        order: NewOrder,
        lines: Vec<NewOrderLine>,
        external_id: &str,
    ) -> Result<Order, SyncDatabaseError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, SyncDatabaseError>;

    async fn fetch_order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>, SyncDatabaseError>;

    async fn fetch_external_ref(&self, order_id: i64) -> Result<Option<ExternalOrderRef>, SyncDatabaseError>;

    /// Writes the rule-derived fields that are set in `update` and returns the updated order.
    async fn update_derived_fields(
        &self,
        order_id: i64,
        update: &DerivedFieldsUpdate,
    ) -> Result<Order, SyncDatabaseError>;

    /// Non-terminal orders that have an external link, least recently synced first.
    async fn fetch_pollable_orders(&self, limit: i64) -> Result<Vec<LinkedOrder>, SyncDatabaseError>;

    async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> Result<Order, SyncDatabaseError>;

    /// Refreshes tracking details on the order's external link, and stamps `last_synced_at`.
    async fn update_tracking(
        &self,
        order_id: i64,
        update: &TrackingUpdate,
    ) -> Result<ExternalOrderRef, SyncDatabaseError>;

    async fn fetch_products_by_sku(&self, client_id: i64, skus: &[String]) -> Result<Vec<Product>, SyncDatabaseError>;

    /// Inserts or refreshes catalogue data for a product. Stock quantities are left untouched.
    async fn upsert_product(&self, product: ProductUpsert) -> Result<Product, SyncDatabaseError>;
}
