//! OS process primitives
//!
//! Everything above this module speaks in pids and [`StopSignal`]s; the
//! per-platform files translate that into psutil/nix calls on Unix and
//! sysinfo/taskkill on Windows.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::*;

/// The two signals this crate ever sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGTERM / `taskkill` without `/F`
    Graceful,
    /// SIGKILL / TerminateProcess
    Forceful,
}

/// What happened when a signal was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    Delivered,
    AlreadyExited,
    PermissionDenied,
    Failed(String),
}

pub fn current_pid() -> u32 {
    std::process::id()
}
