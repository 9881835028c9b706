//! Wait-free event log for per-transaction lifecycle timestamps.
//!
//! Every thread in the system may call [`EventLog::record`] concurrently:
//! the write index is a single atomic fetch-add, and each reserved slot
//! is owned exclusively by the thread that reserved it, so the append
//! itself never blocks. Reads (`write`, `read`, `dump_text`) only happen
//! once the run is over. The only lock in this module guards the
//! optional live text sink, and only serializes `printf`-style output —
//! never the reservation itself.

use std::cell::UnsafeCell;
use std::io::{self, Read, Write};
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cpu::read_cycles;
use crate::error::{PmError, Result};

/// Lifecycle event kinds, in the order a transaction passes through them.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum EventKind {
    /// Client begins trying to submit the transaction.
    Submit = 0,
    /// The scheduler committed to dispatch.
    SchedReady = 1,
    /// The assigned puppet dequeued its `TxnId`.
    WorkRecv = 2,
    /// The puppet finished simulated work.
    Done = 3,
    /// The scheduler reclaimed the active-set entry.
    Cleanup = 4,
}

impl EventKind {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Submit),
            1 => Some(Self::SchedReady),
            2 => Some(Self::WorkRecv),
            3 => Some(Self::Done),
            4 => Some(Self::Cleanup),
            _ => None,
        }
    }

    fn word(self) -> &'static str {
        match self {
            Self::Submit => "submitted",
            Self::SchedReady => "scheduled",
            Self::WorkRecv => "executing",
            Self::Done => "done",
            Self::Cleanup => "removed",
        }
    }

    /// Whether this kind's human dump should include `on puppet_id=<aux>`.
    fn carries_puppet_id(self) -> bool {
        matches!(self, Self::WorkRecv | Self::Done)
    }
}

/// A single recorded lifecycle event.
#[derive(Clone, Copy, Debug)]
pub struct Event {
    /// Raw cycle-counter reading at record time.
    pub tsc: u64,
    /// Transaction this event concerns.
    pub txn_id: u64,
    /// Lifecycle stage.
    pub kind: EventKind,
    /// Auxiliary payload — puppet id for `WorkRecv`/`Done`, otherwise 0.
    pub aux: u64,
}

const RECORD_SIZE: usize = 8 + 8 + 4 + 8; // tsc, txn_id, kind (u32 on the wire), aux

/// A preallocated, append-only event buffer with wait-free `record`.
pub struct EventLog {
    buf: Box<[UnsafeCell<MaybeUninit<Event>>]>,
    capacity: usize,
    len: AtomicUsize,
    sample_period: u64,
    live_sink: Option<parking_lot::Mutex<Box<dyn Write + Send>>>,
    base_tsc: std::sync::atomic::AtomicU64,
    cpu_freq: parking_lot::Mutex<f64>,
}

// SAFETY: each reserved index is written by exactly one thread (the one
// that won the fetch-add), and reads only happen after all writers have
// stopped (post-run), so there's no overlapping access to any given slot.
unsafe impl Sync for EventLog {}

impl EventLog {
    /// Preallocate a log of `capacity` events. `sample_period == S` means
    /// only transactions with `id % S == 0` are recorded; `S == 0`
    /// disables recording entirely. `live_sink`, if present, receives a
    /// human-readable line per recorded event as it happens.
    pub fn new(capacity: usize, sample_period: u64, live_sink: Option<Box<dyn Write + Send>>) -> Self {
        let buf = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            buf,
            capacity,
            len: AtomicUsize::new(0),
            sample_period,
            live_sink: live_sink.map(parking_lot::Mutex::new),
            base_tsc: std::sync::atomic::AtomicU64::new(0),
            cpu_freq: parking_lot::Mutex::new(1.0),
        }
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Whether sampling is disabled (`sample_period == 0`).
    pub fn is_disabled(&self) -> bool {
        self.sample_period == 0
    }

    /// Latch a base timestamp and the measured CPU frequency, used to
    /// convert raw cycle counts into seconds for the human dump.
    pub fn start_timer(&self, cpu_freq: f64) {
        self.base_tsc.store(read_cycles(), Ordering::Relaxed);
        *self.cpu_freq.lock() = cpu_freq;
    }

    /// Reserve a slot and record an event. Wait-free: a single atomic
    /// fetch-add reserves the index, and no other thread's reservation
    /// can ever collide with it. Fatal if recording would exceed the
    /// preallocated capacity.
    pub fn record(&self, txn_id: u64, kind: EventKind, aux: u64) {
        if self.sample_period == 0 || txn_id % self.sample_period != 0 {
            return;
        }

        let idx = self.len.fetch_add(1, Ordering::AcqRel);
        assert!(
            idx < self.capacity,
            "event log capacity exceeded: reserved index {idx} >= capacity {}",
            self.capacity
        );

        let event = Event { tsc: read_cycles(), txn_id, kind, aux };
        // SAFETY: index `idx` was exclusively reserved by this call via
        // the fetch-add above; no other thread can write the same index.
        unsafe {
            (*self.buf[idx].get()).write(event);
        }

        if let Some(sink) = &self.live_sink {
            let mut sink = sink.lock();
            let _ = writeln!(sink, "{}", self.format_event(&event));
            let _ = sink.flush();
        }
    }

    fn format_event(&self, e: &Event) -> String {
        let base = self.base_tsc.load(Ordering::Relaxed);
        let freq = *self.cpu_freq.lock();
        let seconds = (e.tsc.wrapping_sub(base)) as f64 / freq;
        if e.kind.carries_puppet_id() {
            format!("[+{seconds:.7}] txn_id={} {} on puppet_id={}", e.txn_id, e.kind.word(), e.aux)
        } else {
            format!("[+{seconds:.7}] txn_id={} {}", e.txn_id, e.kind.word())
        }
    }

    /// Snapshot the recorded events sorted by `tsc` ascending. Does not
    /// mutate the log.
    pub fn sorted_snapshot(&self) -> Vec<Event> {
        let len = self.len();
        let mut events: Vec<Event> = (0..len)
            // SAFETY: indices `< len` were all written before `len` was
            // published via the Release fetch-add in `record`, and this
            // method is only called once recording has stopped.
            .map(|i| unsafe { (*self.buf[i].get()).assume_init() })
            .collect();
        events.sort_by_key(|e| e.tsc);
        events
    }

    /// Write the binary log: header `(count, base_tsc, cpu_freq)`
    /// followed by `count` fixed-size records, sorted by `tsc` ascending.
    pub fn write(&self, sink: &mut impl Write) -> io::Result<()> {
        let events = self.sorted_snapshot();
        let count = events.len() as i32;
        let base = self.base_tsc.load(Ordering::Relaxed);
        let freq = *self.cpu_freq.lock();

        sink.write_all(&count.to_le_bytes())?;
        sink.write_all(&base.to_le_bytes())?;
        sink.write_all(&freq.to_le_bytes())?;
        for e in &events {
            sink.write_all(&e.tsc.to_le_bytes())?;
            sink.write_all(&e.txn_id.to_le_bytes())?;
            sink.write_all(&(e.kind as u32).to_le_bytes())?;
            sink.write_all(&e.aux.to_le_bytes())?;
        }
        Ok(())
    }

    /// Read a binary log previously produced by [`EventLog::write`] into
    /// a fresh, detached `EventLog` (not wired for further recording).
    pub fn read(source: &mut impl Read) -> Result<Self> {
        let mut i32_buf = [0u8; 4];
        source.read_exact(&mut i32_buf)?;
        let count = i32::from_le_bytes(i32_buf);
        if count < 0 {
            return Err(PmError::fatal("event log header declared a negative count"));
        }
        let count = count as usize;

        let mut u64_buf = [0u8; 8];
        source.read_exact(&mut u64_buf)?;
        let base_tsc = u64::from_le_bytes(u64_buf);

        let mut f64_buf = [0u8; 8];
        source.read_exact(&mut f64_buf)?;
        let cpu_freq = f64::from_le_bytes(f64_buf);

        let log = EventLog::new(count.max(1), 1, None);
        log.base_tsc.store(base_tsc, Ordering::Relaxed);
        *log.cpu_freq.lock() = cpu_freq;

        for i in 0..count {
            source.read_exact(&mut u64_buf)?;
            let tsc = u64::from_le_bytes(u64_buf);
            source.read_exact(&mut u64_buf)?;
            let txn_id = u64::from_le_bytes(u64_buf);
            let mut kind_buf = [0u8; 4];
            source.read_exact(&mut kind_buf)?;
            let kind = EventKind::from_u8(u32::from_le_bytes(kind_buf) as u8)
                .ok_or_else(|| PmError::fatal("unrecognized event kind in binary log"))?;
            source.read_exact(&mut u64_buf)?;
            let aux = u64::from_le_bytes(u64_buf);

            let event = Event { tsc, txn_id, kind, aux };
            unsafe {
                (*log.buf[i].get()).write(event);
            }
        }
        log.len.store(count, Ordering::Release);
        Ok(log)
    }

    /// Write a human-readable line per event, sorted by `tsc` ascending.
    pub fn dump_text(&self, sink: &mut impl Write) -> io::Result<()> {
        for e in self.sorted_snapshot() {
            writeln!(sink, "{}", self.format_event(&e))?;
        }
        Ok(())
    }
}
