//! CPU pinning and the TSC-equivalent timing base.
//!
//! Every thread in a run is pinned to a distinct logical core (see
//! `constants` for the fixed role map). Timestamps come from a
//! monotonic, high-resolution cycle counter — the real TSC on x86_64, the
//! architected virtual counter on aarch64, and a coarse but still
//! monotonic fallback elsewhere.

use crate::error::{PmError, Result};

/// Pin the calling thread to a single logical core, modulo the machine's
/// core count. Warns (via `tracing`) if the requested core index had to
/// be truncated.
pub fn pin_to_cpu(core: usize) -> Result<()> {
    let available = num_cpus::get();
    let target = if core >= available {
        tracing::warn!(requested = core, available, "core index truncated to available core count");
        core % available
    } else {
        core
    };

    pin_to_cpu_exact(target)
}

#[cfg(target_os = "linux")]
fn pin_to_cpu_exact(core: usize) -> Result<()> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut set = CpuSet::new();
    set.set(core).map_err(PmError::CpuAffinity)?;
    sched_setaffinity(Pid::from_raw(0), &set).map_err(PmError::CpuAffinity)?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn pin_to_cpu_exact(_core: usize) -> Result<()> {
    // Affinity pinning is a Linux-specific optimization here; on other
    // platforms we simply run unpinned rather than fail the run.
    Ok(())
}

/// Read the current value of the monotonic cycle counter.
#[inline(always)]
pub fn read_cycles() -> u64 {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        std::arch::x86_64::_rdtsc()
    }

    #[cfg(target_arch = "aarch64")]
    unsafe {
        let val: u64;
        std::arch::asm!("mrs {}, cntvct_el0", out(reg) val, options(nomem, nostack));
        val
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        // Fallback: nanoseconds since an arbitrary epoch, monotonic but
        // not a true cycle counter.
        use std::time::Instant;
        use std::sync::OnceLock;
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        let epoch = EPOCH.get_or_init(Instant::now);
        epoch.elapsed().as_nanos() as u64
    }
}

/// Measure cycles-per-second by differencing two cycle-counter readings
/// across a 100ms monotonic sleep interval.
pub fn measure_cpu_freq() -> f64 {
    let interval = std::time::Duration::from_millis(100);
    let start = read_cycles();
    std::thread::sleep(interval);
    let end = read_cycles();
    (end.wrapping_sub(start)) as f64 / interval.as_secs_f64()
}

/// Busy-wait until `read_cycles()` has advanced by at least `cycles`.
#[inline]
pub fn busy_wait_cycles(cycles: u64) {
    if cycles == 0 {
        return;
    }
    let start = read_cycles();
    while read_cycles().wrapping_sub(start) < cycles {
        std::hint::spin_loop();
    }
}
