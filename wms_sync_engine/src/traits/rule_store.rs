use crate::{
    db_types::{CartonType, SenderAddress},
    rules::{ExpediteurRule, TagRule, TransportRule},
    traits::SyncDatabaseError,
};

/// Read access to the externally authored rule tables.
///
/// Rules whose stored conditions cannot be parsed are left out of the results (and logged), so one bad rule never
/// disables the rest of its table.
#[allow(async_fn_in_trait)]
pub trait RuleStore {
    async fn fetch_tag_rules(&self) -> Result<Vec<TagRule>, SyncDatabaseError>;

    async fn fetch_transport_rules(&self) -> Result<Vec<TransportRule>, SyncDatabaseError>;

    /// Expediteur rules are scoped to a client.
    async fn fetch_expediteur_rules(&self, client_id: i64) -> Result<Vec<ExpediteurRule>, SyncDatabaseError>;

    async fn fetch_carton_types(&self) -> Result<Vec<CartonType>, SyncDatabaseError>;

    async fn fetch_sender_address(&self, id: i64) -> Result<Option<SenderAddress>, SyncDatabaseError>;
}
