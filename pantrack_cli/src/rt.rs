//! Real-time scheduling helpers (Linux SCHED_FIFO / affinity / mlockall).
//!
//! Applied once per process, before the tracker spawns its threads, so the
//! pulse loop and the interlock monitor inherit policy and affinity.

use crate::cli::RtLock;

#[derive(Debug, Clone, Copy)]
pub struct RtOpts {
    pub prio: Option<i32>,
    pub lock: RtLock,
    pub cpu: Option<usize>,
}

#[cfg(target_os = "linux")]
pub fn setup_rt_once(opts: RtOpts) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    RT_ONCE.get_or_init(|| {
        match lock_memory(opts.lock) {
            Ok(()) => tracing::info!(mode = ?opts.lock, "rt: memory locked"),
            Err(e) => tracing::warn!(error = %e, "rt: mlockall failed"),
        }
        match set_fifo(opts.prio) {
            Ok(prio) => tracing::info!(prio, "rt: SCHED_FIFO applied"),
            Err(e) => tracing::warn!(
                error = %e,
                "rt: SCHED_FIFO not applied; needs CAP_SYS_NICE or root"
            ),
        }
        let cpu = opts.cpu.unwrap_or(0);
        match pin_cpu(cpu) {
            Ok(()) => tracing::info!(cpu, "rt: pinned"),
            Err(e) => tracing::warn!(cpu, error = %e, "rt: affinity not applied"),
        }
    });
}

#[cfg(target_os = "linux")]
fn lock_memory(lock: RtLock) -> std::io::Result<()> {
    let flags = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => libc::MCL_CURRENT,
        RtLock::All => libc::MCL_CURRENT | libc::MCL_FUTURE,
    };
    // SAFETY: mlockall takes no pointers.
    let rc = unsafe { libc::mlockall(flags) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(target_os = "linux")]
fn set_fifo(prio: Option<i32>) -> std::io::Result<i32> {
    // SAFETY: plain queries without pointers.
    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_FIFO),
            libc::sched_get_priority_max(libc::SCHED_FIFO),
        )
    };
    let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
    let prio = prio.unwrap_or(max).clamp(min, max);
    let param = libc::sched_param {
        sched_priority: prio,
    };
    // SAFETY: `param` outlives the call.
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc == 0 {
        Ok(prio)
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(target_os = "linux")]
fn pin_cpu(cpu: usize) -> std::io::Result<()> {
    let capacity = std::mem::size_of::<libc::cpu_set_t>() * 8;
    if cpu >= capacity {
        return Err(std::io::Error::other(format!(
            "cpu {cpu} exceeds cpu_set_t capacity {capacity}"
        )));
    }
    // SAFETY: cpu_set_t is plain data; zeroed is a valid empty set and `cpu` is in range.
    let rc = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(opts: RtOpts) {
    let _ = opts;
    tracing::warn!("rt: real-time mode is only supported on Linux; ignoring --rt");
}
