//! Puppetmaster Runner: an emulated hardware transaction scheduler.
//!
//! Clients submit transactions naming read/write object sets; a central
//! scheduler admits non-conflicting transactions onto a fixed pool of
//! pinned puppet threads, and a wait-free event log records the
//! lifecycle of each transaction for offline analysis. See the
//! `harness` module for the orchestration entry point, and the
//! `DESIGN.md` in the repository root for how each module here traces
//! back to a reference implementation.

pub mod active_set;
pub mod bloom;
pub mod client;
pub mod config;
pub mod conflict;
pub mod constants;
pub mod cpu;
pub mod error;
pub mod eventlog;
pub mod harness;
pub mod puppet;
pub mod ring;
pub mod scheduler;
pub mod txn;
pub mod watchdog;
pub mod workload;

pub use error::{PmError, Result};
