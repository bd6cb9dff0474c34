//! Rule tables. Conditions are stored as JSON text and parsed when the rules are loaded. Rows that fail to parse are
//! skipped with a warning.
use log::warn;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{CartonType, SenderAddress},
    rules::{
        parse_conditions,
        Condition,
        ExpediteurMatch,
        ExpediteurRule,
        NewExpediteurRule,
        NewTagRule,
        NewTransportRule,
        TagRule,
        TransportRule,
    },
    traits::SyncDatabaseError,
};

#[derive(Debug, Clone, FromRow)]
struct TagRuleRow {
    id: i64,
    priority: i64,
    active: bool,
    conditions: String,
    tag: String,
}

impl TagRuleRow {
    fn parse(self) -> Option<TagRule> {
        let conditions = parse_or_warn("tag", self.id, &self.conditions)?;
        Some(TagRule { id: self.id, priority: self.priority, active: self.active, conditions, tag: self.tag })
    }
}

#[derive(Debug, Clone, FromRow)]
struct TransportRuleRow {
    id: i64,
    priority: i64,
    active: bool,
    conditions: String,
    carrier: String,
    compute_volumetric: bool,
    volumetric_divisor: Option<f64>,
}

impl TransportRuleRow {
    fn parse(self) -> Option<TransportRule> {
        let conditions = parse_or_warn("transport", self.id, &self.conditions)?;
        Some(TransportRule {
            id: self.id,
            priority: self.priority,
            active: self.active,
            conditions,
            carrier: self.carrier,
            compute_volumetric: self.compute_volumetric,
            volumetric_divisor: self.volumetric_divisor,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct ExpediteurRuleRow {
    id: i64,
    client_id: i64,
    priority: i64,
    active: bool,
    conditions: String,
    match_type: String,
    match_value: String,
    sender_address_id: i64,
}

impl ExpediteurRuleRow {
    fn parse(self) -> Option<ExpediteurRule> {
        let conditions = parse_or_warn("expediteur", self.id, &self.conditions)?;
        let matcher = ExpediteurMatch::from_columns(&self.match_type, &self.match_value)
            .map_err(|e| warn!("🧮️ Skipping expediteur rule #{}. {e}", self.id))
            .ok()?;
        Some(ExpediteurRule {
            id: self.id,
            client_id: self.client_id,
            priority: self.priority,
            active: self.active,
            conditions,
            matcher,
            sender_address_id: self.sender_address_id,
        })
    }
}

fn parse_or_warn(kind: &str, id: i64, json: &str) -> Option<Vec<Condition>> {
    parse_conditions(json)
        .map_err(|e| warn!("🧮️ Skipping {kind} rule #{id}. Its conditions are not valid: {e}. Conditions: {json}"))
        .ok()
}

/// All tag rules, in ascending priority order.
pub async fn fetch_tag_rules(conn: &mut SqliteConnection) -> Result<Vec<TagRule>, SyncDatabaseError> {
    let rows: Vec<TagRuleRow> =
        sqlx::query_as("SELECT * FROM tag_rules ORDER BY priority ASC, id ASC").fetch_all(conn).await?;
    Ok(rows.into_iter().filter_map(TagRuleRow::parse).collect())
}

pub async fn fetch_transport_rules(conn: &mut SqliteConnection) -> Result<Vec<TransportRule>, SyncDatabaseError> {
    let rows: Vec<TransportRuleRow> =
        sqlx::query_as("SELECT * FROM transport_rules ORDER BY priority ASC, id ASC").fetch_all(conn).await?;
    Ok(rows.into_iter().filter_map(TransportRuleRow::parse).collect())
}

pub async fn fetch_expediteur_rules(
    client_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ExpediteurRule>, SyncDatabaseError> {
    let rows: Vec<ExpediteurRuleRow> =
        sqlx::query_as("SELECT * FROM expediteur_rules WHERE client_id = $1 ORDER BY priority ASC, id ASC")
            .bind(client_id)
            .fetch_all(conn)
            .await?;
    Ok(rows.into_iter().filter_map(ExpediteurRuleRow::parse).collect())
}

/// Carton types in ascending volume order.
pub async fn fetch_carton_types(conn: &mut SqliteConnection) -> Result<Vec<CartonType>, SyncDatabaseError> {
    let cartons = sqlx::query_as("SELECT * FROM carton_types ORDER BY volume_cm3 ASC, id ASC").fetch_all(conn).await?;
    Ok(cartons)
}

pub async fn fetch_sender_address(id: i64, conn: &mut SqliteConnection) -> Result<Option<SenderAddress>, SyncDatabaseError> {
    let address =
        sqlx::query_as("SELECT * FROM sender_addresses WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(address)
}

pub async fn insert_tag_rule(rule: NewTagRule, conn: &mut SqliteConnection) -> Result<TagRule, SyncDatabaseError> {
    let conditions = serde_json::to_string(&rule.conditions)?;
    let id: i64 =
        sqlx::query_scalar("INSERT INTO tag_rules (priority, active, conditions, tag) VALUES ($1, $2, $3, $4) RETURNING id")
            .bind(rule.priority)
            .bind(rule.active)
            .bind(conditions)
            .bind(&rule.tag)
            .fetch_one(conn)
            .await?;
    Ok(TagRule { id, priority: rule.priority, active: rule.active, conditions: rule.conditions, tag: rule.tag })
}

pub async fn insert_transport_rule(
    rule: NewTransportRule,
    conn: &mut SqliteConnection,
) -> Result<TransportRule, SyncDatabaseError> {
    let conditions = serde_json::to_string(&rule.conditions)?;
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO transport_rules (priority, active, conditions, carrier, compute_volumetric, volumetric_divisor)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id;
        "#,
    )
    .bind(rule.priority)
    .bind(rule.active)
    .bind(conditions)
    .bind(&rule.carrier)
    .bind(rule.compute_volumetric)
    .bind(rule.volumetric_divisor)
    .fetch_one(conn)
    .await?;
    Ok(TransportRule {
        id,
        priority: rule.priority,
        active: rule.active,
        conditions: rule.conditions,
        carrier: rule.carrier,
        compute_volumetric: rule.compute_volumetric,
        volumetric_divisor: rule.volumetric_divisor,
    })
}

pub async fn insert_expediteur_rule(
    rule: NewExpediteurRule,
    conn: &mut SqliteConnection,
) -> Result<ExpediteurRule, SyncDatabaseError> {
    let conditions = serde_json::to_string(&rule.conditions)?;
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO expediteur_rules (
                client_id,
                priority,
                active,
                conditions,
                match_type,
                match_value,
                sender_address_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id;
        "#,
    )
    .bind(rule.client_id)
    .bind(rule.priority)
    .bind(rule.active)
    .bind(conditions)
    .bind(rule.matcher.kind().to_string())
    .bind(rule.matcher.column_value())
    .bind(rule.sender_address_id)
    .fetch_one(conn)
    .await?;
    Ok(ExpediteurRule {
        id,
        client_id: rule.client_id,
        priority: rule.priority,
        active: rule.active,
        conditions: rule.conditions,
        matcher: rule.matcher,
        sender_address_id: rule.sender_address_id,
    })
}

pub async fn insert_carton_type(
    name: &str,
    volume_cm3: f64,
    active: bool,
    conn: &mut SqliteConnection,
) -> Result<CartonType, SyncDatabaseError> {
    let carton = sqlx::query_as("INSERT INTO carton_types (name, volume_cm3, active) VALUES ($1, $2, $3) RETURNING *")
        .bind(name)
        .bind(volume_cm3)
        .bind(active)
        .fetch_one(conn)
        .await?;
    Ok(carton)
}

/// Stores a sender address. The `id` of the argument is ignored.
pub async fn insert_sender_address(
    address: &SenderAddress,
    conn: &mut SqliteConnection,
) -> Result<SenderAddress, SyncDatabaseError> {
    let address = sqlx::query_as(
        r#"
            INSERT INTO sender_addresses (
                client_id,
                name,
                company,
                address1,
                address2,
                zip,
                city,
                country_code,
                phone,
                email
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(address.client_id)
    .bind(&address.name)
    .bind(&address.company)
    .bind(&address.address1)
    .bind(&address.address2)
    .bind(&address.zip)
    .bind(&address.city)
    .bind(&address.country_code)
    .bind(&address.phone)
    .bind(&address.email)
    .fetch_one(conn)
    .await?;
    Ok(address)
}
