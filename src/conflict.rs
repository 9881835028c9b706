//! Conflict detection: exact pairwise scans and a Bloom-accelerated
//! pre-filter behind one interface.
//!
//! `conflicts(a, b)` is the ground truth. [`ConflictChecker`] is the
//! pluggable interface the scheduler calls once per admission attempt;
//! [`ExactConflictChecker`] always scans, [`BloomConflictChecker`] uses a
//! summary to skip the scan when it can prove no conflict exists. A third
//! engine (range- or index-partitioned) can be dropped in without
//! touching the scheduler loop.

use crate::active_set::ActiveSet;
use crate::bloom::BloomFilter;
use crate::constants::{DEFAULT_BLOOM_REFRESH_THRESHOLD, BLOOM_NUM_HASHES};
use crate::txn::Txn;

/// Returns `true` iff `a` and `b` share an object and at least one names
/// it as a write. Bounded at `MAX_TXN_OBJS^2` comparisons.
pub fn conflicts(a: &Txn, b: &Txn) -> bool {
    for oa in a.objs() {
        for ob in b.objs() {
            if oa.id() == ob.id() && (oa.is_write() || ob.is_write()) {
                return true;
            }
        }
    }
    false
}

/// Whether `txn` conflicts with any transaction already in `active` via
/// an exact pairwise scan. First hit wins.
pub fn conflicts_with_any(txn: &Txn, active: &ActiveSet) -> bool {
    active.iter().any(|a| conflicts(txn, a))
}

/// A pluggable strategy behind `conflict_with_active`. Implementations
/// must uphold: whenever `conflict_with_active` returns `false`, no exact
/// pairwise conflict exists with the current active set.
pub trait ConflictChecker: Send {
    /// Check `txn` against the current active set.
    fn conflict_with_active(&mut self, txn: &Txn, active: &ActiveSet) -> bool;

    /// Notify the checker that `txn` was just admitted into the active
    /// set (called once per successful Phase B admission).
    fn on_admit(&mut self, txn: &Txn);

    /// Notify the checker that Phase C ran and observed whether any
    /// transaction was dispatched this pass while some client queue was
    /// non-empty; implementations that maintain a derived summary use
    /// this to decide whether to rebuild it from scratch.
    fn maybe_rebuild(&mut self, active: &ActiveSet, dispatched_nothing_but_pending_nonempty: bool);
}

/// Always falls through to the exact scan. No precomputed summary, no
/// false positives, no maintenance cost.
#[derive(Default)]
pub struct ExactConflictChecker;

impl ConflictChecker for ExactConflictChecker {
    fn conflict_with_active(&mut self, txn: &Txn, active: &ActiveSet) -> bool {
        conflicts_with_any(txn, active)
    }

    fn on_admit(&mut self, _txn: &Txn) {}

    fn maybe_rebuild(&mut self, _active: &ActiveSet, _dispatched_nothing_but_pending_nonempty: bool) {}
}

/// Bloom-accelerated checker: a summary of the active set's object
/// universe lets most non-conflicting admissions skip the exact scan
/// entirely. A false positive on the summary just forces the fallback
/// scan — it never suppresses it.
pub struct BloomConflictChecker {
    bloom: BloomFilter,
    refresh_threshold: usize,
    dispatches_since_refresh: usize,
}

impl BloomConflictChecker {
    /// Construct a checker with a summary of `total_bits` bits, rebuilt
    /// from scratch every `refresh_threshold` dispatches (or sooner, per
    /// `maybe_rebuild`).
    pub fn new(total_bits: usize, refresh_threshold: usize) -> Self {
        Self {
            bloom: BloomFilter::new(total_bits),
            refresh_threshold,
            dispatches_since_refresh: 0,
        }
    }

    fn rebuild(&mut self, active: &ActiveSet) {
        self.bloom.reset();
        for txn in active.iter() {
            for obj in txn.objs() {
                self.bloom.insert(obj.id());
            }
        }
        self.dispatches_since_refresh = 0;
    }
}

impl Default for BloomConflictChecker {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_BLOOM_BITS, DEFAULT_BLOOM_REFRESH_THRESHOLD)
    }
}

impl ConflictChecker for BloomConflictChecker {
    fn conflict_with_active(&mut self, txn: &Txn, active: &ActiveSet) -> bool {
        let maybe_present = txn.objs().iter().any(|o| self.bloom.query(o.id()));
        if !maybe_present {
            return false;
        }
        // Bloom was inconclusive (or every object id happened to collide);
        // fall back to the exact scan. A false positive here never
        // suppresses the fallback — it only costs an extra scan.
        conflicts_with_any(txn, active)
    }

    fn on_admit(&mut self, txn: &Txn) {
        for obj in txn.objs() {
            self.bloom.insert(obj.id());
        }
        self.dispatches_since_refresh += 1;
    }

    fn maybe_rebuild(&mut self, active: &ActiveSet, dispatched_nothing_but_pending_nonempty: bool) {
        if self.dispatches_since_refresh >= self.refresh_threshold || dispatched_nothing_but_pending_nonempty {
            self.rebuild(active);
        }
    }
}

static_assertions::const_assert!(BLOOM_NUM_HASHES > 0);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::ObjRef;

    fn txn(id: u64, objs: &[(u64, bool)]) -> Txn {
        let refs: Vec<ObjRef> = objs.iter().map(|&(o, w)| ObjRef::new(o, w)).collect();
        Txn::new(id, 0, &refs)
    }

    #[test]
    fn read_read_never_conflicts() {
        let a = txn(1, &[(10, false)]);
        let b = txn(2, &[(10, false)]);
        assert!(!conflicts(&a, &b));
    }

    #[test]
    fn read_write_same_object_conflicts() {
        let a = txn(1, &[(10, false)]);
        let b = txn(2, &[(10, true)]);
        assert!(conflicts(&a, &b));
        assert!(conflicts(&b, &a));
    }

    #[test]
    fn disjoint_objects_never_conflict() {
        let a = txn(1, &[(10, true)]);
        let b = txn(2, &[(20, true)]);
        assert!(!conflicts(&a, &b));
    }

    #[test]
    fn exact_checker_matches_bloom_checker() {
        let mut active = ActiveSet::new(8);
        active.push(txn(1, &[(5, true)]));
        active.push(txn(2, &[(6, false)]));

        let candidate_conflict = txn(3, &[(5, false)]);
        let candidate_clear = txn(4, &[(99, false)]);

        let mut exact = ExactConflictChecker;
        let mut bloom = BloomConflictChecker::default();
        for txn in active.iter() {
            bloom.on_admit(txn);
        }

        assert_eq!(
            exact.conflict_with_active(&candidate_conflict, &active),
            bloom.conflict_with_active(&candidate_conflict, &active)
        );
        assert_eq!(
            exact.conflict_with_active(&candidate_clear, &active),
            bloom.conflict_with_active(&candidate_clear, &active)
        );
    }

    #[test]
    fn bloom_soundness_under_false_positive_pressure() {
        // Small active-set capacity against a tiny object domain forces
        // frequent Bloom false positives; the exact fallback must still
        // agree with ground truth in every case.
        let mut active = ActiveSet::new(4);
        for i in 0..4u64 {
            active.push(txn(i, &[(i % 3, i % 2 == 0)]));
        }
        let mut bloom = BloomConflictChecker::new(256, 64);
        for txn in active.iter() {
            bloom.on_admit(txn);
        }

        for candidate_id in 100..4096u64 {
            let candidate = txn(candidate_id, &[(candidate_id % 3, true)]);
            let truth = conflicts_with_any(&candidate, &active);
            let bloom_says_no = !bloom.conflict_with_active(&candidate, &active);
            if bloom_says_no {
                assert!(!truth, "bloom declared no conflict but exact scan disagrees");
            }
        }
    }
}
