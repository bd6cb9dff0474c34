use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    db_types::ConversionError,
    rules::{evaluate, parse_tags_value, Condition, OrderRecord},
};

pub const DEFAULT_VOLUMETRIC_DIVISOR: f64 = 5000.0;

/// Behaviour shared by the three rule tables. Rules are evaluated in ascending `priority` order.
pub trait PrioritizedRule {
    fn priority(&self) -> i64;

    fn is_active(&self) -> bool;

    fn conditions(&self) -> &[Condition];

    fn matches(&self, record: &OrderRecord) -> bool {
        evaluate(record, self.conditions())
    }
}

/// Stable sort by ascending priority. Rules with equal priority keep their relative order.
pub fn sort_by_priority<R: PrioritizedRule>(rules: &mut [R]) {
    rules.sort_by_key(|r| r.priority());
}

//--------------------------------------      TagRule        -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRule {
    pub id: i64,
    pub priority: i64,
    pub active: bool,
    pub conditions: Vec<Condition>,
    pub tag: String,
}

impl PrioritizedRule for TagRule {
    fn priority(&self) -> i64 {
        self.priority
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTagRule {
    pub priority: i64,
    pub active: bool,
    pub conditions: Vec<Condition>,
    pub tag: String,
}

//--------------------------------------    TransportRule    -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportRule {
    pub id: i64,
    pub priority: i64,
    pub active: bool,
    pub conditions: Vec<Condition>,
    pub carrier: String,
    pub compute_volumetric: bool,
    pub volumetric_divisor: Option<f64>,
}

impl TransportRule {
    /// The configured divisor, falling back to 5000 when unset or not strictly positive.
    pub fn divisor(&self) -> f64 {
        match self.volumetric_divisor {
            Some(d) if d > 0.0 => d,
            _ => DEFAULT_VOLUMETRIC_DIVISOR,
        }
    }
}

impl PrioritizedRule for TransportRule {
    fn priority(&self) -> i64 {
        self.priority
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransportRule {
    pub priority: i64,
    pub active: bool,
    pub conditions: Vec<Condition>,
    pub carrier: String,
    pub compute_volumetric: bool,
    pub volumetric_divisor: Option<f64>,
}

//--------------------------------------   ExpediteurRule    -----------------------------------------------------------
/// How an expediteur rule is matched against an order, on top of its conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum ExpediteurMatch {
    /// `store_name` equals the value exactly.
    ExactName(String),
    /// `store_name` contains the value, ignoring case.
    NameContains(String),
    /// The order carries at least one of the tags.
    #[serde(rename = "any-tag-in-set")]
    AnyTagIn(Vec<String>),
    /// `sub_client` equals the value exactly.
    ExactSubClient(String),
}

impl ExpediteurMatch {
    /// Builds a matcher from the `match_type` / `match_value` column pair. Tag sets are comma separated.
    pub fn from_columns(match_type: &str, match_value: &str) -> Result<Self, ConversionError> {
        let kind: ExpediteurMatchKind = match_type.parse()?;
        let m = match kind {
            ExpediteurMatchKind::ExactName => Self::ExactName(match_value.to_string()),
            ExpediteurMatchKind::NameContains => Self::NameContains(match_value.to_string()),
            ExpediteurMatchKind::AnyTagIn => Self::AnyTagIn(parse_tags_value(match_value)),
            ExpediteurMatchKind::ExactSubClient => Self::ExactSubClient(match_value.to_string()),
        };
        Ok(m)
    }

    pub fn kind(&self) -> ExpediteurMatchKind {
        match self {
            Self::ExactName(_) => ExpediteurMatchKind::ExactName,
            Self::NameContains(_) => ExpediteurMatchKind::NameContains,
            Self::AnyTagIn(_) => ExpediteurMatchKind::AnyTagIn,
            Self::ExactSubClient(_) => ExpediteurMatchKind::ExactSubClient,
        }
    }

    /// The value as stored in the `match_value` column.
    pub fn column_value(&self) -> String {
        match self {
            Self::ExactName(v) | Self::NameContains(v) | Self::ExactSubClient(v) => v.clone(),
            Self::AnyTagIn(tags) => tags.join(","),
        }
    }

    pub fn matches(&self, record: &OrderRecord) -> bool {
        let text = |key: &str| record.get(key).map(|v| v.to_string());
        match self {
            Self::ExactName(name) => text("store_name").is_some_and(|s| &s == name),
            Self::NameContains(part) => {
                text("store_name").is_some_and(|s| s.to_lowercase().contains(&part.to_lowercase()))
            },
            Self::AnyTagIn(wanted) => {
                let tags = text("tags").map(|t| parse_tags_value(&t)).unwrap_or_default();
                wanted.iter().any(|w| tags.contains(w))
            },
            Self::ExactSubClient(sub) => text("sub_client").is_some_and(|s| &s == sub),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpediteurMatchKind {
    ExactName,
    NameContains,
    AnyTagIn,
    ExactSubClient,
}

impl Display for ExpediteurMatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactName => write!(f, "exact-name"),
            Self::NameContains => write!(f, "name-contains"),
            Self::AnyTagIn => write!(f, "any-tag-in-set"),
            Self::ExactSubClient => write!(f, "exact-sub-client"),
        }
    }
}

impl FromStr for ExpediteurMatchKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact-name" => Ok(Self::ExactName),
            "name-contains" => Ok(Self::NameContains),
            "any-tag-in-set" => Ok(Self::AnyTagIn),
            "exact-sub-client" => Ok(Self::ExactSubClient),
            other => Err(ConversionError { kind: "expediteur match type", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpediteurRule {
    pub id: i64,
    pub client_id: i64,
    pub priority: i64,
    pub active: bool,
    pub conditions: Vec<Condition>,
    pub matcher: ExpediteurMatch,
    pub sender_address_id: i64,
}

impl PrioritizedRule for ExpediteurRule {
    fn priority(&self) -> i64 {
        self.priority
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn matches(&self, record: &OrderRecord) -> bool {
        self.matcher.matches(record) && evaluate(record, &self.conditions)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpediteurRule {
    pub client_id: i64,
    pub priority: i64,
    pub active: bool,
    pub conditions: Vec<Condition>,
    pub matcher: ExpediteurMatch,
    pub sender_address_id: i64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn divisor_defaults() {
        let mut rule = TransportRule {
            id: 1,
            priority: 1,
            active: true,
            conditions: vec![],
            carrier: "colissimo".into(),
            compute_volumetric: true,
            volumetric_divisor: None,
        };
        assert_eq!(rule.divisor(), 5000.0);
        rule.volumetric_divisor = Some(0.0);
        assert_eq!(rule.divisor(), 5000.0);
        rule.volumetric_divisor = Some(6000.0);
        assert_eq!(rule.divisor(), 6000.0);
    }

    #[test]
    fn expediteur_matchers() {
        let record = OrderRecord::default()
            .with("store_name", "Atelier Nord")
            .with("sub_client", "north-1")
            .with("tags", "fragile,vip");
        assert!(ExpediteurMatch::ExactName("Atelier Nord".into()).matches(&record));
        assert!(!ExpediteurMatch::ExactName("atelier nord".into()).matches(&record));
        assert!(ExpediteurMatch::NameContains("NORD".into()).matches(&record));
        assert!(ExpediteurMatch::AnyTagIn(vec!["bulk".into(), "vip".into()]).matches(&record));
        assert!(!ExpediteurMatch::AnyTagIn(vec!["bulk".into()]).matches(&record));
        assert!(ExpediteurMatch::ExactSubClient("north-1".into()).matches(&record));
        assert!(!ExpediteurMatch::ExactSubClient("north-1".into()).matches(&OrderRecord::default()));
    }

    #[test]
    fn matcher_columns() {
        let m = ExpediteurMatch::from_columns("any-tag-in-set", "vip, fragile").unwrap();
        assert_eq!(m, ExpediteurMatch::AnyTagIn(vec!["vip".into(), "fragile".into()]));
        assert_eq!(m.kind().to_string(), "any-tag-in-set");
        assert_eq!(m.column_value(), "vip,fragile");
        assert!(ExpediteurMatch::from_columns("fuzzy-name", "x").is_err());
    }
}
