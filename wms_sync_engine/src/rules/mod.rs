//! # Rule evaluation
//!
//! Tag, transport and expediteur rules are authored outside of this crate and consumed here. Each rule carries a
//! `priority` (lower is evaluated first), an `active` flag and a conjunctive list of [`Condition`]s.
//!
//! * [`evaluate`] checks a condition list against an [`OrderRecord`].
//! * [`select_first_match`] implements first-match-wins over a priority-sorted slice.
//! * [`select_all_matches`] returns every matching rule (used for tags).
//! * [`volumetric`] holds the parcel maths used by transport rules.
mod conditions;
mod evaluator;
mod record;
mod rule_types;
pub mod volumetric;

pub use conditions::{evaluate, parse_conditions, Condition, ConditionValue, Operator, Scalar};
pub use evaluator::{select_all_matches, select_first_match};
pub use record::OrderRecord;
pub use rule_types::{
    sort_by_priority,
    ExpediteurMatch,
    ExpediteurMatchKind,
    ExpediteurRule,
    NewExpediteurRule,
    NewTagRule,
    NewTransportRule,
    PrioritizedRule,
    TagRule,
    TransportRule,
    DEFAULT_VOLUMETRIC_DIVISOR,
};

/// Splits a comma-separated tag list, keeping the given order.
pub(crate) fn parse_tags_value(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect()
}
