//! Reference-list reconciliation.
//!
//! # Responsibility
//! - Compute the add/remove delta taking a list membership from its current
//!   state to a client-submitted desired state.
//! - Resolve every addition before anything is changed.
//!
//! # Invariants
//! - Membership is a set: duplicate desired ids collapse to one member.
//! - Surviving members keep their current order; additions are appended in
//!   first-occurrence desired order.
//! - A single unresolvable addition fails the whole reconciliation.

use crate::model::object::ObjectId;
use crate::service::KbResult;
use std::collections::HashSet;

/// Add/remove delta for one reference-list attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceDelta {
    /// Current members absent from the desired list, in current order.
    pub to_remove: Vec<ObjectId>,
    /// Desired ids not yet members, first occurrence order, no duplicates.
    pub to_add: Vec<ObjectId>,
}

impl ReferenceDelta {
    pub fn compute(current: &[ObjectId], desired: &[ObjectId]) -> Self {
        let desired_set: HashSet<&str> = desired.iter().map(String::as_str).collect();
        let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();

        let to_remove = current
            .iter()
            .filter(|id| !desired_set.contains(id.as_str()))
            .cloned()
            .collect();

        let mut seen = HashSet::new();
        let to_add = desired
            .iter()
            .filter(|id| !current_set.contains(id.as_str()))
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        Self { to_remove, to_add }
    }

    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }

    /// Membership after removals then additions.
    pub fn apply(&self, current: &[ObjectId]) -> Vec<ObjectId> {
        let removed: HashSet<&str> = self.to_remove.iter().map(String::as_str).collect();
        current
            .iter()
            .filter(|id| !removed.contains(id.as_str()))
            .chain(self.to_add.iter())
            .cloned()
            .collect()
    }
}

/// Outcome of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub delta: ReferenceDelta,
    pub members: Vec<ObjectId>,
}

/// Reconciles `current` against `desired`, calling `resolve` once per
/// addition before producing the new membership.
///
/// `resolve` reports why an id cannot join the list; its first error is
/// returned unchanged and nothing is applied.
pub fn reconcile_references<F>(
    current: &[ObjectId],
    desired: &[ObjectId],
    mut resolve: F,
) -> KbResult<Reconciliation>
where
    F: FnMut(&str) -> KbResult<()>,
{
    let delta = ReferenceDelta::compute(current, desired);
    for object_id in &delta.to_add {
        resolve(object_id)?;
    }
    let members = delta.apply(current);
    Ok(Reconciliation { delta, members })
}

#[cfg(test)]
mod tests {
    use super::{reconcile_references, ReferenceDelta};
    use crate::service::KbError;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn delta_collapses_duplicates_and_keeps_survivor_order() {
        let current = ids(&["1", "2", "3"]);
        let desired = ids(&["2", "3", "4", "4"]);

        let delta = ReferenceDelta::compute(&current, &desired);

        assert_eq!(delta.to_remove, ids(&["1"]));
        assert_eq!(delta.to_add, ids(&["4"]));
        assert_eq!(delta.apply(&current), ids(&["2", "3", "4"]));
    }

    #[test]
    fn identical_membership_yields_empty_delta() {
        let current = ids(&["a", "b"]);
        let delta = ReferenceDelta::compute(&current, &ids(&["b", "a"]));
        assert!(delta.is_empty());
        assert_eq!(delta.apply(&current), current);
    }

    #[test]
    fn additions_follow_first_desired_occurrence() {
        let delta = ReferenceDelta::compute(&[], &ids(&["c", "a", "c", "b", "a"]));
        assert_eq!(delta.to_add, ids(&["c", "a", "b"]));
    }

    #[test]
    fn resolver_sees_each_addition_once() {
        let mut resolved = Vec::new();
        let outcome = reconcile_references(&ids(&["1"]), &ids(&["5", "5", "1", "6"]), |id| {
            resolved.push(id.to_string());
            Ok(())
        })
        .unwrap();

        assert_eq!(resolved, ids(&["5", "6"]));
        assert_eq!(outcome.members, ids(&["1", "5", "6"]));
    }

    #[test]
    fn unresolvable_addition_fails_whole_reconciliation() {
        let err = reconcile_references(&ids(&["1", "2"]), &ids(&["2", "999"]), |id| {
            if id == "999" {
                Err(KbError::UnknownReference {
                    attribute: "related".to_string(),
                    object_id: id.to_string(),
                })
            } else {
                Ok(())
            }
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "unknown object id reference: 999");
    }
}
