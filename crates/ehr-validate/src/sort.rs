//! Sort-order tracking across accepted lines.
//!
//! The per-patient merge step downstream is cheap only when an extract
//! arrives ordered by `(subsetId, patientId)`. The tracker watches the
//! accepted lines of one scan and flips a sticky flag on the first
//! violation; the flag is never re-evaluated back to true.
//!
//! Patient ids are ordered by length first (shorter before longer), then
//! lexicographically, so `"2" < "10"`. The patients file forbids ties
//! (duplicate ids); the episode kinds allow them, since one patient has
//! many episodes. Whether ordering spans subsets or restarts per subset
//! is a per-kind policy.

use std::cmp::Ordering;

use ehr_model::RecordKind;

/// Length-first id ordering: `"2" < "10" < "11" < "AA1"`.
pub fn cmp_ids(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    Forbid,
    Allow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortScope {
    /// Ordering is enforced across subsets, subset id compared first.
    Global,
    /// Ordering restarts whenever the subset id changes.
    PerSubset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortPolicy {
    pub duplicates: DuplicatePolicy,
    pub scope: SortScope,
}

impl SortPolicy {
    pub fn for_kind(kind: RecordKind) -> Self {
        Self {
            duplicates: match kind {
                RecordKind::Patient => DuplicatePolicy::Forbid,
                _ => DuplicatePolicy::Allow,
            },
            scope: SortScope::Global,
        }
    }
}

#[derive(Debug)]
pub struct SortTracker {
    policy: SortPolicy,
    previous: Option<(String, String)>,
    sorted: bool,
}

impl SortTracker {
    pub fn new(policy: SortPolicy) -> Self {
        Self {
            policy,
            previous: None,
            sorted: true,
        }
    }

    /// Feed the `(subset, patient)` of an accepted line.
    pub fn observe(&mut self, subset: &str, patient: &str) {
        if self.sorted
            && let Some((prev_subset, prev_patient)) = &self.previous
        {
            self.sorted = self.in_order(prev_subset, prev_patient, subset, patient);
        }
        self.previous = Some((subset.to_string(), patient.to_string()));
    }

    fn in_order(&self, prev_subset: &str, prev_patient: &str, subset: &str, patient: &str) -> bool {
        let patient_order = match self.policy.scope {
            SortScope::Global => match cmp_ids(prev_subset, subset) {
                Ordering::Less => return true,
                Ordering::Greater => return false,
                Ordering::Equal => cmp_ids(prev_patient, patient),
            },
            SortScope::PerSubset => {
                if prev_subset != subset {
                    return true;
                }
                cmp_ids(prev_patient, patient)
            }
        };
        match patient_order {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => self.policy.duplicates == DuplicatePolicy::Allow,
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(kind: RecordKind) -> SortTracker {
        SortTracker::new(SortPolicy::for_kind(kind))
    }

    #[test]
    fn length_first_ordering_is_sorted() {
        let mut t = tracker(RecordKind::Patient);
        for id in ["1", "2", "10"] {
            t.observe("0", id);
        }
        assert!(t.is_sorted());
    }

    #[test]
    fn out_of_order_ids_flip_the_flag() {
        let mut t = tracker(RecordKind::Patient);
        for id in ["1", "10", "2"] {
            t.observe("0", id);
        }
        assert!(!t.is_sorted());
    }

    #[test]
    fn the_flag_is_sticky() {
        let mut t = tracker(RecordKind::Event);
        t.observe("0", "5");
        t.observe("0", "3");
        assert!(!t.is_sorted());
        t.observe("0", "4");
        t.observe("0", "9");
        assert!(!t.is_sorted());
    }

    #[test]
    fn patients_forbid_duplicate_ids() {
        let mut t = tracker(RecordKind::Patient);
        t.observe("0", "7");
        t.observe("0", "7");
        assert!(!t.is_sorted());
    }

    #[test]
    fn episodes_allow_duplicate_ids() {
        let mut t = tracker(RecordKind::Prescription);
        t.observe("0", "7");
        t.observe("0", "7");
        t.observe("0", "8");
        assert!(t.is_sorted());
    }

    #[test]
    fn global_scope_orders_subsets_too() {
        let mut t = tracker(RecordKind::Event);
        t.observe("S2", "1");
        t.observe("S1", "2");
        assert!(!t.is_sorted());
    }

    #[test]
    fn per_subset_scope_restarts_at_subset_changes() {
        let mut t = SortTracker::new(SortPolicy {
            duplicates: DuplicatePolicy::Allow,
            scope: SortScope::PerSubset,
        });
        t.observe("S2", "5");
        t.observe("S1", "1"); // new subset, ordering restarts
        t.observe("S1", "2");
        assert!(t.is_sorted());
        t.observe("S1", "1");
        assert!(!t.is_sorted());
    }
}
