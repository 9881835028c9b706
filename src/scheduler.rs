//! The scheduler: admission control over the active set.
//!
//! Runs as a single dedicated thread executing a tight three-phase loop
//! (drain completions, admit pending, maintain the conflict summary).
//! Every queue it touches is wrapped in `Arc` purely so driver threads on
//! the other end can share ownership — the scheduler itself is always
//! the sole consumer of a `pending_q`/`done_q` and the sole producer of
//! a `sched_q`, so no synchronization beyond the ring's own protocol is
//! needed here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::active_set::ActiveSet;
use crate::conflict::ConflictChecker;
use crate::eventlog::{EventKind, EventLog};
use crate::ring::SpscRing;
use crate::txn::Txn;

/// Owns the active set and conflict checker; drives the three-phase loop.
pub struct Scheduler {
    pending: Vec<Arc<SpscRing<Txn>>>,
    sched: Vec<Arc<SpscRing<u64>>>,
    done: Vec<Arc<SpscRing<u64>>>,
    active: ActiveSet,
    checker: Box<dyn ConflictChecker>,
    next_puppet: usize,
    event_log: Arc<EventLog>,
    keep_running: Arc<AtomicBool>,
}

impl Scheduler {
    /// Construct a scheduler over the given per-client pending queues,
    /// per-puppet scheduled/done queues, and conflict-checking strategy.
    pub fn new(
        pending: Vec<Arc<SpscRing<Txn>>>,
        sched: Vec<Arc<SpscRing<u64>>>,
        done: Vec<Arc<SpscRing<u64>>>,
        active_capacity: usize,
        checker: Box<dyn ConflictChecker>,
        event_log: Arc<EventLog>,
        keep_running: Arc<AtomicBool>,
    ) -> Self {
        assert_eq!(sched.len(), done.len(), "one scheduled queue and one done queue per puppet");
        Self {
            pending,
            sched,
            done,
            active: ActiveSet::new(active_capacity),
            checker,
            next_puppet: 0,
            event_log,
            keep_running,
        }
    }

    /// Run the busy loop until the shutdown flag is observed.
    pub fn run(&mut self) {
        while self.keep_running.load(Ordering::SeqCst) {
            self.run_once();
        }
    }

    /// One pass of phases A, B, and C. Exposed separately so tests can
    /// drive the scheduler deterministically without a background thread.
    pub fn run_once(&mut self) {
        self.phase_a();
        let dispatched_any = self.phase_b();
        self.phase_c(dispatched_any);
    }

    fn phase_a(&mut self) {
        for done_q in &self.done {
            while let Some(tid) = done_q.try_dequeue() {
                self.active
                    .remove_by_id(tid)
                    .unwrap_or_else(|| panic!("completion received for unknown transaction {tid}"));
                self.event_log.record(tid, EventKind::Cleanup, 0);
            }
        }
    }

    fn phase_b(&mut self) -> bool {
        let mut dispatched_any = false;

        for client in 0..self.pending.len() {
            loop {
                if self.active.is_full() {
                    break;
                }
                let Some(txn) = self.pending[client].try_peek() else {
                    break;
                };
                if self.checker.conflict_with_active(&txn, &self.active) {
                    // FIFO head-of-line: this client's queue stays put
                    // until the blocking transaction clears.
                    break;
                }
                let target = self.next_puppet;
                if self.sched[target].is_full() {
                    break;
                }

                let dequeued = self.pending[client].try_dequeue();
                debug_assert_eq!(dequeued.map(|t| t.id), Some(txn.id), "peek/dequeue must observe the same head");

                self.active.push(txn);
                self.sched[target].enqueue_spin(txn.id);
                self.event_log.record(txn.id, EventKind::SchedReady, target as u64);
                self.checker.on_admit(&txn);

                self.next_puppet = (target + 1) % self.sched.len();
                dispatched_any = true;
            }
        }

        dispatched_any
    }

    fn phase_c(&mut self, dispatched_any: bool) {
        let pending_nonempty = self.pending.iter().any(|q| !q.is_empty());
        self.checker.maybe_rebuild(&self.active, !dispatched_any && pending_nonempty);
    }
}
