//! Orchestrator: wires queues and threads together and drives one run
//! of the harness from a parsed configuration to completion.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::client::ClientDriver;
use crate::config::RunConfig;
use crate::conflict::{BloomConflictChecker, ConflictChecker};
use crate::constants::{
    CLIENT_BASE, DEFAULT_ACTIVE, DEFAULT_DONE_CAPACITY, DEFAULT_LOG_CAPACITY, DEFAULT_PENDING_CAPACITY,
    DEFAULT_SCHED_CAPACITY, MAIN_CORE, SCHEDULER_CORE,
};
use crate::cpu;
use crate::error::{PmError, Result};
use crate::eventlog::EventLog;
use crate::puppet::PuppetDriver;
use crate::ring::SpscRing;
use crate::scheduler::Scheduler;
use crate::txn::Txn;
use crate::watchdog::Watchdog;
use crate::workload::parse_workload;

/// Outcome of a completed run.
#[derive(Debug)]
pub struct Summary {
    /// Total transactions in the workload.
    pub total_txns: usize,
    /// Transactions that reported completion before the run ended.
    pub completed_txns: u64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Run the harness to completion (or failure) for the given configuration.
pub fn run(config: &RunConfig) -> Result<Summary> {
    let input_file = File::open(&config.input).map_err(|e| {
        PmError::usage(format!("cannot open input file {}: {e}", config.input.display()))
    })?;
    let reader = BufReader::new(input_file);
    let workload = parse_workload(reader)?;
    let total_txns = workload.len();

    let num_clients = config.clients;
    let num_puppets = config.puppets;
    let sample_period = config.sample_period.unwrap_or(0);

    let live_sink: Option<Box<dyn std::io::Write + Send>> =
        if config.live_dump { Some(Box::new(std::io::stdout())) } else { None };
    let event_log = Arc::new(EventLog::new(DEFAULT_LOG_CAPACITY, sample_period, live_sink));
    let cpu_freq = cpu::measure_cpu_freq();
    event_log.start_timer(cpu_freq);

    let keep_running = Arc::new(AtomicBool::new(true));

    let pending: Vec<Arc<SpscRing<Txn>>> =
        (0..num_clients).map(|_| Arc::new(SpscRing::new(DEFAULT_PENDING_CAPACITY))).collect();
    let sched: Vec<Arc<SpscRing<u64>>> =
        (0..num_puppets).map(|_| Arc::new(SpscRing::new(DEFAULT_SCHED_CAPACITY))).collect();
    let done: Vec<Arc<SpscRing<u64>>> =
        (0..num_puppets).map(|_| Arc::new(SpscRing::new(DEFAULT_DONE_CAPACITY))).collect();
    let completed: Vec<Arc<AtomicU64>> = (0..num_puppets).map(|_| Arc::new(AtomicU64::new(0))).collect();

    let per_client_workload = partition_by_client(workload, num_clients);

    let work_sim_cycles = us_to_cycles(config.work_us, cpu_freq);
    let rate_limit_cycles = if config.limit { work_sim_cycles / num_puppets as u64 } else { 0 };

    cpu::pin_to_cpu(MAIN_CORE)?;

    let checker: Box<dyn ConflictChecker> = Box::new(BloomConflictChecker::default());
    let mut scheduler = Scheduler::new(
        pending.clone(),
        sched.clone(),
        done.clone(),
        DEFAULT_ACTIVE,
        checker,
        event_log.clone(),
        keep_running.clone(),
    );
    let scheduler_handle = std::thread::spawn(move || {
        cpu::pin_to_cpu(SCHEDULER_CORE).expect("failed to pin scheduler thread");
        scheduler.run();
    });

    let mut client_handles = Vec::with_capacity(num_clients);
    for (c, workload_slice) in per_client_workload.into_iter().enumerate() {
        let driver = ClientDriver::new(
            workload_slice,
            pending[c].clone(),
            event_log.clone(),
            keep_running.clone(),
            rate_limit_cycles,
        );
        client_handles.push(std::thread::spawn(move || {
            cpu::pin_to_cpu(CLIENT_BASE + c).expect("failed to pin client thread");
            driver.run();
        }));
    }

    let puppet_base = puppet_base(num_clients);
    let mut puppet_handles = Vec::with_capacity(num_puppets);
    for p in 0..num_puppets {
        let driver = PuppetDriver::new(
            p,
            sched[p].clone(),
            done[p].clone(),
            event_log.clone(),
            keep_running.clone(),
            completed[p].clone(),
            work_sim_cycles,
        );
        puppet_handles.push(std::thread::spawn(move || {
            cpu::pin_to_cpu(puppet_base + p).expect("failed to pin puppet thread");
            driver.run();
        }));
    }

    // The watchdog runs on its own sleeping thread, not one of the pinned
    // hot-path cores, since its only job is a once-a-second sleep/compare.
    let stalled = Arc::new(AtomicBool::new(false));
    let watchdog_keep_running = keep_running.clone();
    let watchdog_stalled = stalled.clone();
    let watchdog_completed = completed.clone();
    let watchdog_handle = std::thread::spawn(move || {
        let mut watchdog = Watchdog::new(watchdog_completed);
        while watchdog_keep_running.load(Ordering::SeqCst) {
            std::thread::sleep(crate::watchdog::interval());
            if !watchdog_keep_running.load(Ordering::SeqCst) {
                break;
            }
            if watchdog.poll() {
                watchdog_stalled.store(true, Ordering::SeqCst);
                watchdog_keep_running.store(false, Ordering::SeqCst);
                break;
            }
        }
    });

    let start = Instant::now();
    let timeout = Duration::from_secs(config.timeout_secs);
    let mut last_status = Instant::now();
    let poll_interval = Duration::from_millis(5);
    let total_completed = || completed.iter().map(|c| c.load(Ordering::Relaxed)).sum::<u64>();

    let outcome: Result<()> = loop {
        if total_completed() >= total_txns as u64 {
            break Ok(());
        }
        if start.elapsed() >= timeout {
            break Err(PmError::Timeout);
        }
        if stalled.load(Ordering::SeqCst) {
            break Err(PmError::Stalled);
        }
        if config.status && last_status.elapsed() >= Duration::from_secs(1) {
            last_status = Instant::now();
            tracing::info!(completed = total_completed(), total = total_txns, "run progress");
        }
        std::thread::sleep(poll_interval);
    };

    keep_running.store(false, Ordering::SeqCst);

    // A panicking thread (a pinning failure, or a fatal invariant violation
    // such as completion for an unknown transaction or event-log capacity
    // overflow) is caught by `join()` rather than left to unwind out of
    // `main`, and reported with the same `PmError::Fatal`/exit-2 shape as
    // any other runtime-fatal condition. We still join every thread before
    // returning, in keeping with "no unwinding of other threads is
    // attempted" — they are not cancelled, only waited on.
    let mut thread_panic: Option<PmError> = None;
    let mut note_panic = |who: &str, result: std::thread::Result<()>| {
        if let Err(payload) = result {
            thread_panic.get_or_insert_with(|| PmError::fatal(format!("{who} thread panicked: {}", panic_message(&payload))));
        }
    };

    note_panic("scheduler", scheduler_handle.join());
    for h in client_handles {
        note_panic("client", h.join());
    }
    for h in puppet_handles {
        note_panic("puppet", h.join());
    }
    note_panic("watchdog", watchdog_handle.join());

    let elapsed = start.elapsed();
    let completed_total = total_completed();

    if let Some(log_path) = &config.log_path {
        let mut sink = BufWriter::new(File::create(log_path)?);
        event_log.write(&mut sink)?;
    }
    if let Some(dump_path) = &config.dump_path {
        let mut sink = BufWriter::new(File::create(dump_path)?);
        event_log.dump_text(&mut sink)?;
    }

    if let Some(err) = thread_panic {
        return Err(err);
    }
    outcome?;

    Ok(Summary { total_txns, completed_txns: completed_total, elapsed })
}

/// Render a caught thread panic's payload as a diagnostic string. Panics
/// raised via `panic!("...")`/`assert!(...)` carry a `&str` or `String`
/// payload; anything else is reported generically.
fn panic_message(payload: &(dyn std::any::Any + Send + 'static)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// First logical core assigned to puppet 0 for a run with this many
/// clients. Clients occupy `CLIENT_BASE .. CLIENT_BASE + num_clients`, so
/// basing puppets immediately after that range keeps every thread in the
/// run on a distinct core, per spec §2/§4.7, rather than relying on the
/// worst-case `MAX_CLIENTS` spacing in `constants::PUPPET_BASE`.
fn puppet_base(num_clients: usize) -> usize {
    CLIENT_BASE + num_clients
}

/// Split a workload across `num_clients` in round-robin order, preserving
/// each client's relative submission order.
fn partition_by_client(workload: Vec<Txn>, num_clients: usize) -> Vec<Vec<Txn>> {
    let mut per_client = vec![Vec::new(); num_clients];
    for (i, txn) in workload.into_iter().enumerate() {
        per_client[i % num_clients].push(txn);
    }
    per_client
}

fn us_to_cycles(work_us: u64, cpu_freq_hz: f64) -> u64 {
    ((work_us as f64) * cpu_freq_hz / 1_000_000.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::ObjRef;

    fn txn(id: u64) -> Txn {
        Txn::new(id, 0, &[ObjRef::new(id, false)])
    }

    #[test]
    fn partitions_preserve_relative_order_per_client() {
        let workload: Vec<Txn> = (0..6).map(txn).collect();
        let parts = partition_by_client(workload, 2);
        assert_eq!(parts[0].iter().map(|t| t.id).collect::<Vec<_>>(), vec![0, 2, 4]);
        assert_eq!(parts[1].iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 3, 5]);
    }

    #[test]
    fn us_to_cycles_scales_linearly() {
        assert_eq!(us_to_cycles(0, 1_000_000.0), 0);
        assert_eq!(us_to_cycles(1_000_000, 1_000_000.0), 1_000_000);
    }

    #[test]
    fn missing_input_file_is_a_usage_error_not_a_generic_io_error() {
        let mut config = RunConfig::default();
        config.input = std::env::temp_dir().join("pm-runner-does-not-exist-12345.csv");

        let err = run(&config).expect_err("missing input file must fail");
        assert_eq!(err.exit_code(), 1, "missing --input should map to the usage (exit 1) bucket, not exit 2");
        assert!(matches!(err, PmError::Usage { .. }));
    }

    #[test]
    fn panic_message_extracts_str_and_string_payloads() {
        let str_payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*str_payload), "boom");

        let string_payload: Box<dyn std::any::Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(&*string_payload), "kaboom");

        let other_payload: Box<dyn std::any::Any + Send> = Box::new(42i32);
        assert_eq!(panic_message(&*other_payload), "non-string panic payload");
    }

    #[test]
    fn puppet_base_never_overlaps_client_cores() {
        for num_clients in 1..=8 {
            let base = puppet_base(num_clients);
            let client_cores: Vec<usize> = (0..num_clients).map(|c| CLIENT_BASE + c).collect();
            assert!(
                client_cores.iter().all(|&c| c < base),
                "puppet_base({num_clients}) = {base} must sit above every client core {client_cores:?}"
            );
        }
    }
}
