//! Core sizing constants for the Puppetmaster Runner.
//!
//! These mirror the bounds named in the data model: active-set capacity,
//! per-transaction object limit, queue capacities, and Bloom filter
//! dimensions. All ring capacities must be powers of two.

/// Maximum number of distinct objects a single transaction may name.
pub const MAX_TXN_OBJS: usize = 16;

/// Maximum active-set capacity (`A_max`).
pub const MAX_ACTIVE: usize = 128;

/// Default active-set capacity used when not overridden by configuration.
pub const DEFAULT_ACTIVE: usize = 128;

/// Default per-client pending queue capacity (`P_max`), must be power of two.
pub const DEFAULT_PENDING_CAPACITY: usize = 1024;

/// Default per-puppet scheduled queue capacity (`S_max`).
pub const DEFAULT_SCHED_CAPACITY: usize = 256;

/// Default per-puppet done queue capacity.
pub const DEFAULT_DONE_CAPACITY: usize = 256;

/// Default preallocated event log capacity (`E_max`).
pub const DEFAULT_LOG_CAPACITY: usize = 1 << 20;

/// Default Bloom summary size in bits (64 Kibits).
pub const DEFAULT_BLOOM_BITS: usize = 64 * 1024;

/// Number of independent hash functions in the Bloom summary.
pub const BLOOM_NUM_HASHES: usize = 4;

/// Default Bloom rebuild threshold (`R_thr`): rebuild from scratch every
/// this many dispatches.
pub const DEFAULT_BLOOM_REFRESH_THRESHOLD: usize = 64;

/// Cache line size assumed for padding (bytes).
pub const CACHE_LINE_SIZE: usize = 64;

/// Maximum supported clients for a single run.
pub const MAX_CLIENTS: usize = 64;

/// Maximum supported puppets for a single run.
pub const MAX_PUPPETS: usize = 64;

/// First logical core assigned to puppet 0 for a run with the maximum
/// supported client count; puppet `p` runs on `PUPPET_BASE + p` in that
/// case. For runs with fewer clients, the harness instead bases puppet
/// cores right after the last client core actually in use (`CLIENT_BASE
/// + num_clients`), so client and puppet core ranges never overlap
/// regardless of `--clients`. See `harness::puppet_base`.
pub const PUPPET_BASE: usize = CLIENT_BASE + MAX_CLIENTS;

/// Core reserved for the scheduler's busy loop.
pub const SCHEDULER_CORE: usize = 2;

/// First core reserved for client driver threads; client `c` runs on
/// `CLIENT_BASE + c`.
pub const CLIENT_BASE: usize = 3;

/// Core reserved for the main/orchestrator thread.
pub const MAIN_CORE: usize = 0;

/// Watchdog polling interval.
pub const WATCHDOG_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);
