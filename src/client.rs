//! Client driver: submits a prepared workload through a pending queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cpu::busy_wait_cycles;
use crate::eventlog::{EventKind, EventLog};
use crate::ring::SpscRing;
use crate::txn::Txn;

/// Drives one client's share of the workload into its pending queue.
pub struct ClientDriver {
    workload: Vec<Txn>,
    pending: Arc<SpscRing<Txn>>,
    event_log: Arc<EventLog>,
    keep_running: Arc<AtomicBool>,
    /// Cycles to busy-wait after each submission, or 0 to disable rate
    /// limiting. Computed by the caller as `work_sim_cycles / N_p`.
    rate_limit_cycles: u64,
}

impl ClientDriver {
    /// Construct a driver over this client's slice of the workload.
    pub fn new(
        workload: Vec<Txn>,
        pending: Arc<SpscRing<Txn>>,
        event_log: Arc<EventLog>,
        keep_running: Arc<AtomicBool>,
        rate_limit_cycles: u64,
    ) -> Self {
        Self { workload, pending, event_log, keep_running, rate_limit_cycles }
    }

    /// Submit every transaction in workload order, spinning on backpressure.
    /// Bails out early if the shutdown flag is observed mid-submission
    /// (timeout or stall already declared elsewhere).
    pub fn run(&self) {
        for txn in &self.workload {
            if !self.keep_running.load(Ordering::SeqCst) {
                return;
            }
            self.event_log.record(txn.id, EventKind::Submit, 0);
            while !self.pending.try_enqueue(*txn) {
                if !self.keep_running.load(Ordering::SeqCst) {
                    return;
                }
                std::hint::spin_loop();
            }
            if self.rate_limit_cycles > 0 {
                busy_wait_cycles(self.rate_limit_cycles);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_PENDING_CAPACITY;
    use crate::txn::ObjRef;

    fn txn(id: u64) -> Txn {
        Txn::new(id, 0, &[ObjRef::new(id, false)])
    }

    #[test]
    fn submits_every_transaction_in_order() {
        let pending = Arc::new(SpscRing::new(DEFAULT_PENDING_CAPACITY));
        let log = Arc::new(EventLog::new(64, 1, None));
        let keep_running = Arc::new(AtomicBool::new(true));
        let workload = vec![txn(0), txn(1), txn(2)];

        let driver = ClientDriver::new(workload, pending.clone(), log, keep_running, 0);
        driver.run();

        for i in 0..3u64 {
            assert_eq!(pending.try_dequeue().map(|t| t.id), Some(i));
        }
    }

    #[test]
    fn stops_submitting_once_shutdown_is_observed() {
        let pending = Arc::new(SpscRing::new(1));
        let log = Arc::new(EventLog::new(64, 1, None));
        let keep_running = Arc::new(AtomicBool::new(false));
        let workload = vec![txn(0), txn(1)];

        let driver = ClientDriver::new(workload, pending.clone(), log, keep_running, 0);
        driver.run();

        // Shutdown was already observed before the first submission.
        assert!(pending.try_dequeue().is_none());
    }
}
