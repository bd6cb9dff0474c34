//! Typed rule conditions and the conjunctive evaluator.
//!
//! Conditions are authored as JSON, e.g.
//!
//! ```json
//! [{ "field": "total_weight", "op": "greaterThan", "value": 10 },
//!  { "field": "country_code", "operator": "in", "value": ["FR", "BE"] }]
//! ```
//!
//! Every condition in a list must hold for the list to hold. There is no `OR`; disjunction is expressed as separate
//! rules.
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::rules::OrderRecord;

/// A single comparable value, either on the record side or on the condition side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view of the value. Text is parsed leniently (surrounding whitespace is ignored); booleans are never
    /// numbers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Scalar::Bool(_) => None,
        }
    }

    fn loosely_equals(&self, other: &Scalar) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a == b;
        }
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value as f64)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    In,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Many(Vec<Scalar>),
    One(Scalar),
}

impl ConditionValue {
    fn items(&self) -> &[Scalar] {
        match self {
            ConditionValue::Many(v) => v.as_slice(),
            ConditionValue::One(s) => std::slice::from_ref(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    #[serde(alias = "op")]
    pub operator: Operator,
    pub value: ConditionValue,
}

impl Condition {
    pub fn new<S: Into<String>, V: Into<Scalar>>(field: S, operator: Operator, value: V) -> Self {
        Self { field: field.into(), operator, value: ConditionValue::One(value.into()) }
    }

    pub fn list<S: Into<String>>(field: S, operator: Operator, values: Vec<Scalar>) -> Self {
        Self { field: field.into(), operator, value: ConditionValue::Many(values) }
    }

    pub fn holds_for(&self, record: &OrderRecord) -> bool {
        match record.get(&self.field) {
            Some(actual) => compare(actual, self.operator, &self.value),
            None => self.operator == Operator::NotEquals,
        }
    }
}

fn compare(actual: &Scalar, operator: Operator, expected: &ConditionValue) -> bool {
    match operator {
        Operator::Equals | Operator::In => expected.items().iter().any(|e| actual.loosely_equals(e)),
        Operator::NotEquals => !expected.items().iter().any(|e| actual.loosely_equals(e)),
        Operator::GreaterThan => numeric(actual, expected).map(|(a, e)| a > e).unwrap_or(false),
        Operator::LessThan => numeric(actual, expected).map(|(a, e)| a < e).unwrap_or(false),
        Operator::Contains => {
            let haystack = actual.to_string().to_lowercase();
            expected.items().iter().any(|e| haystack.contains(&e.to_string().to_lowercase()))
        },
    }
}

fn numeric(actual: &Scalar, expected: &ConditionValue) -> Option<(f64, f64)> {
    match expected {
        ConditionValue::One(e) => Some((actual.as_number()?, e.as_number()?)),
        ConditionValue::Many(_) => None,
    }
}

/// Returns true when every condition holds for `record`. An empty list is a catch-all and always holds.
pub fn evaluate(record: &OrderRecord, conditions: &[Condition]) -> bool {
    conditions.iter().all(|c| c.holds_for(record))
}

/// Parses a JSON condition list as stored in the rule tables. `null` or an empty string means "no conditions".
pub fn parse_conditions(json: &str) -> Result<Vec<Condition>, serde_json::Error> {
    let trimmed = json.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(vec![]);
    }
    serde_json::from_str(trimmed)
}
