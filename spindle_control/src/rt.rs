//! Real-time thread setup for the command thread.
//!
//! `mlockall`, stack prefault, CPU pinning and `SCHED_FIFO`. Every system
//! call is compiled in only with the `rt` feature; without it `rt_setup` is
//! a no-op so development hosts run unprivileged.

use thiserror::Error;

/// Errors during RT setup.
#[derive(Debug, Error)]
pub enum RtError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
}

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), RtError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| RtError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), RtError> {
    Ok(())
}

/// Touch 256 KiB of stack so ramp waits never page-fault.
#[cfg(feature = "rt")]
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(not(feature = "rt"))]
fn prefault_stack() {}

/// Pin the current thread to `cpu`.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), RtError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| RtError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| RtError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), RtError> {
    Ok(())
}

/// Switch the current thread to SCHED_FIFO at `priority`.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), RtError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(RtError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), RtError> {
    Ok(())
}

/// Perform the full RT setup sequence.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), RtError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}
