//! Puppet (executor) driver: consumes assigned transactions, simulates
//! work, reports completion.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::cpu::busy_wait_cycles;
use crate::eventlog::{EventKind, EventLog};
use crate::ring::SpscRing;

/// Drives one puppet's scheduled/done queue pair.
pub struct PuppetDriver {
    id: usize,
    sched_q: Arc<SpscRing<u64>>,
    done_q: Arc<SpscRing<u64>>,
    event_log: Arc<EventLog>,
    keep_running: Arc<AtomicBool>,
    /// Incremented once per completion; polled by the watchdog.
    completed: Arc<AtomicU64>,
    work_sim_cycles: u64,
}

impl PuppetDriver {
    /// Construct a driver for puppet `id`.
    pub fn new(
        id: usize,
        sched_q: Arc<SpscRing<u64>>,
        done_q: Arc<SpscRing<u64>>,
        event_log: Arc<EventLog>,
        keep_running: Arc<AtomicBool>,
        completed: Arc<AtomicU64>,
        work_sim_cycles: u64,
    ) -> Self {
        Self { id, sched_q, done_q, event_log, keep_running, completed, work_sim_cycles }
    }

    /// Run until the shutdown flag is observed between transactions.
    pub fn run(&self) {
        while self.keep_running.load(Ordering::SeqCst) {
            let Some(txn_id) = self.poll_once() else { continue };
            self.event_log.record(txn_id, EventKind::WorkRecv, self.id as u64);

            busy_wait_cycles(self.work_sim_cycles);

            self.event_log.record(txn_id, EventKind::Done, self.id as u64);
            self.completed.fetch_add(1, Ordering::Relaxed);
            self.done_q.enqueue_spin(txn_id);
        }
    }

    fn poll_once(&self) -> Option<u64> {
        loop {
            if let Some(tid) = self.sched_q.try_dequeue() {
                return Some(tid);
            }
            if !self.keep_running.load(Ordering::SeqCst) {
                return None;
            }
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_DONE_CAPACITY, DEFAULT_SCHED_CAPACITY};

    #[test]
    fn executes_one_transaction_and_reports_completion() {
        let sched_q = Arc::new(SpscRing::new(DEFAULT_SCHED_CAPACITY));
        let done_q = Arc::new(SpscRing::new(DEFAULT_DONE_CAPACITY));
        let log = Arc::new(EventLog::new(64, 1, None));
        let keep_running = Arc::new(AtomicBool::new(true));
        let completed = Arc::new(AtomicU64::new(0));

        sched_q.try_enqueue(7);

        let driver = PuppetDriver::new(2, sched_q, done_q.clone(), log.clone(), keep_running.clone(), completed.clone(), 0);
        // Run just long enough to process the one queued transaction,
        // then signal shutdown so `run` returns.
        let stop_after = keep_running.clone();
        std::thread::spawn(move || {
            while done_q.is_empty() {
                std::hint::spin_loop();
            }
            stop_after.store(false, Ordering::SeqCst);
        });
        driver.run();

        assert_eq!(completed.load(Ordering::Relaxed), 1);
        assert_eq!(log.sorted_snapshot().iter().filter(|e| e.kind == EventKind::WorkRecv).count(), 1);
        assert_eq!(log.sorted_snapshot().iter().filter(|e| e.kind == EventKind::Done).count(), 1);
    }

    #[test]
    fn idle_poll_exits_promptly_on_shutdown() {
        let sched_q = Arc::new(SpscRing::new(DEFAULT_SCHED_CAPACITY));
        let done_q = Arc::new(SpscRing::new(DEFAULT_DONE_CAPACITY));
        let log = Arc::new(EventLog::new(16, 1, None));
        let keep_running = Arc::new(AtomicBool::new(false));
        let completed = Arc::new(AtomicU64::new(0));

        let driver = PuppetDriver::new(0, sched_q, done_q, log, keep_running, completed.clone(), 0);
        driver.run();
        assert_eq!(completed.load(Ordering::Relaxed), 0);
    }
}
