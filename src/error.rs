//! Error types for the Puppetmaster Runner.
//!
//! Errors are split along the taxonomy in the runner's error handling
//! design: usage errors (bad CLI flags, malformed CSV) are returned to the
//! caller before any thread starts; runtime-fatal conditions are detected
//! on a hot-path thread and abort the process after logging, since they
//! indicate a broken invariant rather than something a caller can recover
//! from. Ordinary backpressure (a full ring) is never represented as an
//! `Err` — see `ring::SpscRing`.

use std::io::IsTerminal;

/// Result type alias for Puppetmaster operations.
pub type Result<T> = std::result::Result<T, PmError>;

/// Errors produced while configuring or running the harness.
#[derive(thiserror::Error, Debug)]
pub enum PmError {
    /// Malformed command-line invocation or configuration value.
    #[error("usage error: {message}")]
    Usage {
        /// Description of what was wrong.
        message: String,
    },

    /// Malformed workload CSV.
    #[error("workload error: {message}")]
    Workload {
        /// Description of the parse failure.
        message: String,
    },

    /// I/O error reading/writing a workload, binary log, or dump file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A runtime invariant was violated: completion for an unknown
    /// transaction, event log capacity exceeded, or a capacity assertion
    /// that should have been prevented by a guard. These are programming
    /// errors, not recoverable conditions.
    #[error("fatal: {message}")]
    Fatal {
        /// Description of the violated invariant.
        message: String,
    },

    /// The progress watchdog observed no puppet completions across a
    /// full sampling interval while the run was still active.
    #[error("stalled: no progress since last watchdog poll")]
    Stalled,

    /// The configured wall-clock budget elapsed before the workload
    /// finished draining.
    #[error("timeout: run did not complete within the configured budget")]
    Timeout,

    /// Failed to pin a thread to a CPU core.
    #[error("CPU affinity error: {0}")]
    CpuAffinity(#[from] nix::Error),
}

impl PmError {
    /// Construct a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage { message: message.into() }
    }

    /// Construct a workload parse error.
    pub fn workload(message: impl Into<String>) -> Self {
        Self::Workload { message: message.into() }
    }

    /// Construct a fatal invariant-violation error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal { message: message.into() }
    }

    /// Process exit code this error should map to, per the runner's
    /// exit-code contract: 1 for usage/config errors, 2 for everything
    /// encountered once the run is under way.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage { .. } | Self::Workload { .. } => 1,
            _ => 2,
        }
    }
}

/// Install a panic hook that prints diagnostics in the style of the
/// original harness's `FATAL` macro: `[FATAL] file:line: message`,
/// colored only when stderr is a terminal. Hot-path invariant violations
/// (capacity overflow, completion for an unknown transaction) are raised
/// as ordinary panics from library code — this hook is what gives them
/// the runner's diagnostic shape; the binary entry point is responsible
/// for mapping the resulting unwind to exit code 2.
pub fn install_fatal_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let is_tty = std::io::stderr().is_terminal();
        let (red, reset) = if is_tty { ("\x1b[1;31m", "\x1b[0m") } else { ("", "") };
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "<unknown>".to_string());
        eprintln!("{red}[FATAL]{reset} {location}: {info}");
    }));
}
