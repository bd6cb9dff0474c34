use crate::rules::{OrderRecord, PrioritizedRule};

/// Returns the first active rule, in the order given, whose conditions hold for `record`.
///
/// The slice must already be sorted by ascending priority (see [`super::sort_by_priority`]). It is deliberately not
/// re-sorted here, so that rules with equal priority keep the order the caller gave them. Once a rule matches, all
/// later rules are ignored.
pub fn select_first_match<'a, R: PrioritizedRule>(record: &OrderRecord, rules: &'a [R]) -> Option<&'a R> {
    rules.iter().find(|r| r.is_active() && r.matches(record))
}

/// Every active rule whose conditions hold, in the order given.
pub fn select_all_matches<'a, R: PrioritizedRule>(record: &OrderRecord, rules: &'a [R]) -> Vec<&'a R> {
    rules.iter().filter(|r| r.is_active() && r.matches(record)).collect()
}
