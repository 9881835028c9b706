//! Command-line surface for the runner harness.
//!
//! Parsed by hand from `argv`, in the style of this author's other
//! driver binaries (`kaos-driver`'s `main.rs` scans `std::env::args()`
//! directly rather than pulling in an argument-parsing crate) — there's
//! exactly one flat set of flags here, no subcommands, so a parsing
//! crate would buy little.

use std::path::PathBuf;

use crate::error::{PmError, Result};

/// Fully resolved configuration for one run of the harness.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Workload CSV path.
    pub input: PathBuf,
    /// Wall-clock budget, in seconds; the run aborts with a timeout error
    /// if not complete within this window.
    pub timeout_secs: u64,
    /// Simulated per-transaction puppet work, in microseconds.
    pub work_us: u64,
    /// Number of client driver threads.
    pub clients: usize,
    /// Number of puppet driver threads.
    pub puppets: usize,
    /// Event log sample period (`2^sample_shift`); `None` disables
    /// sampling (equivalent to a negative shift).
    pub sample_period: Option<u64>,
    /// Binary event log output path, if any.
    pub log_path: Option<PathBuf>,
    /// Human-readable event dump output path, if any. Requires sampling.
    pub dump_path: Option<PathBuf>,
    /// Whether to report periodic progress to stderr.
    pub status: bool,
    /// Whether to stream events to stdout as they happen.
    pub live_dump: bool,
    /// Whether to rate-limit clients for clean latency distributions.
    pub limit: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("transactions.csv"),
            timeout_secs: 30,
            work_us: 0,
            clients: 1,
            puppets: 4,
            sample_period: Some(1),
            log_path: None,
            dump_path: None,
            status: false,
            live_dump: false,
            limit: false,
        }
    }
}

impl RunConfig {
    /// Parse a `RunConfig` from an argv-style iterator (excluding the
    /// program name). Returns a usage error on malformed or nonsensical
    /// flags, before any thread is started.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut cfg = RunConfig::default();
        let mut args = args.into_iter().peekable();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--input" => cfg.input = PathBuf::from(require_value(&mut args, "--input")?),
                "--timeout" => {
                    let v = parse_value::<i64>(&mut args, "--timeout")?;
                    if v <= 0 {
                        return Err(PmError::usage("--timeout must be a positive integer"));
                    }
                    cfg.timeout_secs = v as u64;
                }
                "--work-us" => {
                    let v = parse_value::<i64>(&mut args, "--work-us")?;
                    if v < 0 {
                        return Err(PmError::usage("--work-us must be >= 0"));
                    }
                    cfg.work_us = v as u64;
                }
                "--clients" => {
                    let v = parse_value::<i64>(&mut args, "--clients")?;
                    if v < 1 || (v as usize) > crate::constants::MAX_CLIENTS {
                        return Err(PmError::usage(format!(
                            "--clients must be between 1 and {}",
                            crate::constants::MAX_CLIENTS
                        )));
                    }
                    cfg.clients = v as usize;
                }
                "--puppets" => {
                    let v = parse_value::<i64>(&mut args, "--puppets")?;
                    if v < 1 || (v as usize) > crate::constants::MAX_PUPPETS {
                        return Err(PmError::usage(format!(
                            "--puppets must be between 1 and {}",
                            crate::constants::MAX_PUPPETS
                        )));
                    }
                    cfg.puppets = v as usize;
                }
                "--sample-shift" => {
                    let v = parse_value::<i32>(&mut args, "--sample-shift")?;
                    cfg.sample_period = if v < 0 { None } else { Some(1u64 << v) };
                }
                "--log" => {
                    let v = require_value(&mut args, "--log")?;
                    cfg.log_path = if v.is_empty() { None } else { Some(PathBuf::from(v)) };
                }
                "--dump" => {
                    cfg.dump_path = Some(PathBuf::from(require_value(&mut args, "--dump")?));
                }
                "--status" => cfg.status = true,
                "--live-dump" => cfg.live_dump = true,
                "--limit" => cfg.limit = true,
                other => return Err(PmError::usage(format!("unknown flag: {other}"))),
            }
        }

        if cfg.dump_path.is_some() && cfg.sample_period.is_none() {
            return Err(PmError::usage("--dump requires sampling to be enabled (see --sample-shift)"));
        }

        Ok(cfg)
    }
}

fn require_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next().ok_or_else(|| PmError::usage(format!("{flag} requires a value")))
}

fn parse_value<T: std::str::FromStr>(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<T> {
    let raw = require_value(args, flag)?;
    raw.parse().map_err(|_| PmError::usage(format!("{flag} expects a numeric value, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn defaults_are_sane() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.clients, 1);
        assert_eq!(cfg.puppets, 4);
        assert_eq!(cfg.sample_period, Some(1));
    }

    #[test]
    fn parses_full_surface() {
        let cfg = RunConfig::parse(args(
            "--input wl.csv --timeout 5 --work-us 10 --clients 2 --puppets 8 --sample-shift 3 --status --live-dump --limit"
        ))
        .unwrap();
        assert_eq!(cfg.input, PathBuf::from("wl.csv"));
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.work_us, 10);
        assert_eq!(cfg.clients, 2);
        assert_eq!(cfg.puppets, 8);
        assert_eq!(cfg.sample_period, Some(8));
        assert!(cfg.status);
        assert!(cfg.live_dump);
        assert!(cfg.limit);
    }

    #[test]
    fn negative_sample_shift_disables_sampling() {
        let cfg = RunConfig::parse(args("--sample-shift -1")).unwrap();
        assert_eq!(cfg.sample_period, None);
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(RunConfig::parse(args("--bogus")).is_err());
    }

    #[test]
    fn rejects_nonpositive_timeout() {
        assert!(RunConfig::parse(args("--timeout 0")).is_err());
        assert!(RunConfig::parse(args("--timeout -5")).is_err());
    }

    #[test]
    fn rejects_clients_out_of_range() {
        assert!(RunConfig::parse(args("--clients 0")).is_err());
        assert!(RunConfig::parse(args("--clients 9999")).is_err());
    }

    #[test]
    fn dump_without_sampling_is_rejected() {
        assert!(RunConfig::parse(args("--dump out.txt --sample-shift -1")).is_err());
    }

    #[test]
    fn empty_log_path_means_no_binary_log() {
        let cfg = RunConfig::parse(["--log".to_string(), String::new()]).unwrap();
        assert!(cfg.log_path.is_none());
    }
}
