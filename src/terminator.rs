//! Graceful-then-forceful process termination
//!
//! Browser helpers can hold the profile lock while shutting down, and killing
//! them outright leaves a corrupt profile behind. So every target first gets
//! a graceful stop and a bounded wait; only survivors are killed, followed by
//! a second bounded wait. Nothing escalates beyond that: whatever is still
//! alive is returned for diagnostics.

use crate::config::EXIT_POLL_INTERVAL;
use crate::core::models::{ProcessId, ProcessSet};
use crate::platform::{self, SignalOutcome, StopSignal};
use std::time::Duration;
use tokio::time::Instant;

/// OS operations the terminator needs.
pub trait ProcessControl: Send + Sync {
    fn is_alive(&self, pid: ProcessId) -> bool;
    fn signal(&self, pid: ProcessId, signal: StopSignal) -> SignalOutcome;
}

/// [`ProcessControl`] backed by the real OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessControl;

impl ProcessControl for SystemProcessControl {
    fn is_alive(&self, pid: ProcessId) -> bool {
        platform::process_alive(pid)
    }

    fn signal(&self, pid: ProcessId, signal: StopSignal) -> SignalOutcome {
        platform::send_signal(pid, signal)
    }
}

/// What a [`ProcessTerminator::terminate`] call left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminationReport {
    /// Signalled but still alive after the kill period.
    pub unreached: ProcessSet,
    /// Not ours to signal and still alive.
    pub denied: ProcessSet,
}

impl TerminationReport {
    pub fn is_clean(&self) -> bool {
        self.unreached.is_empty() && self.denied.is_empty()
    }

    /// Every pid that is still running.
    pub fn survivors(&self) -> ProcessSet {
        self.unreached.union(&self.denied).copied().collect()
    }
}

#[derive(Debug, Clone)]
pub struct ProcessTerminator<C = SystemProcessControl> {
    control: C,
    poll_interval: Duration,
}

impl Default for ProcessTerminator<SystemProcessControl> {
    fn default() -> Self {
        Self::new(SystemProcessControl)
    }
}

impl<C: ProcessControl> ProcessTerminator<C> {
    pub fn new(control: C) -> Self {
        Self {
            control,
            poll_interval: EXIT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    /// Stop every process in `targets` and report what survived.
    ///
    /// Already-exited targets are success. Targets we may not signal are
    /// logged and left alone, and reported back only if still alive.
    pub async fn terminate(
        &self,
        targets: &ProcessSet,
        grace_period: Duration,
        kill_period: Duration,
    ) -> TerminationReport {
        let me = platform::current_pid();
        let mut pending: ProcessSet = targets
            .iter()
            .copied()
            .filter(|pid| *pid != me && self.control.is_alive(*pid))
            .collect();
        if pending.is_empty() {
            return TerminationReport::default();
        }

        tracing::debug!(count = pending.len(), pids = ?pending, "stopping processes");
        let mut denied = self.signal_all(&mut pending, StopSignal::Graceful);
        let survivors = self.wait_for_exit(pending, grace_period).await;

        let unreached = if survivors.is_empty() {
            survivors
        } else {
            tracing::debug!(
                count = survivors.len(),
                pids = ?survivors,
                "grace period over, killing"
            );
            let mut survivors = survivors;
            denied.extend(self.signal_all(&mut survivors, StopSignal::Forceful));
            self.wait_for_exit(survivors, kill_period).await
        };

        let report = TerminationReport {
            unreached,
            denied: denied
                .into_iter()
                .filter(|pid| self.control.is_alive(*pid))
                .collect(),
        };
        if !report.is_clean() {
            tracing::warn!(
                unreached = ?report.unreached,
                denied = ?report.denied,
                "processes survived termination"
            );
        }
        report
    }

    /// Send `signal` to each pid; drops exited and unsignalable ones from
    /// `pids` and returns the unsignalable ones.
    fn signal_all(&self, pids: &mut ProcessSet, signal: StopSignal) -> ProcessSet {
        let mut denied = ProcessSet::new();
        pids.retain(|pid| match self.control.signal(*pid, signal) {
            SignalOutcome::Delivered => true,
            SignalOutcome::AlreadyExited => false,
            SignalOutcome::PermissionDenied => {
                tracing::warn!(pid, ?signal, "permission denied, skipping");
                denied.insert(*pid);
                false
            }
            SignalOutcome::Failed(message) => {
                tracing::warn!(pid, ?signal, %message, "signal failed");
                true
            }
        });
        denied
    }

    /// Poll until every pid is gone or `timeout` elapses; returns the rest.
    async fn wait_for_exit(&self, mut pids: ProcessSet, timeout: Duration) -> ProcessSet {
        let deadline = Instant::now() + timeout;
        loop {
            pids.retain(|pid| self.control.is_alive(*pid));
            if pids.is_empty() || Instant::now() >= deadline {
                return pids;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, Default)]
    struct FakeProcess {
        ignores_graceful: bool,
        unkillable: bool,
        denied: bool,
    }

    #[derive(Default)]
    struct FakeControl {
        live: Mutex<HashMap<ProcessId, FakeProcess>>,
        sent: Mutex<Vec<(ProcessId, StopSignal)>>,
    }

    impl FakeControl {
        fn with(processes: &[(ProcessId, FakeProcess)]) -> Self {
            let control = Self::default();
            control.live.lock().unwrap().extend(processes.iter().copied());
            control
        }

        fn sent(&self) -> Vec<(ProcessId, StopSignal)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl ProcessControl for FakeControl {
        fn is_alive(&self, pid: ProcessId) -> bool {
            self.live.lock().unwrap().contains_key(&pid)
        }

        fn signal(&self, pid: ProcessId, signal: StopSignal) -> SignalOutcome {
            let mut live = self.live.lock().unwrap();
            let Some(process) = live.get(&pid).copied() else {
                return SignalOutcome::AlreadyExited;
            };
            if process.denied {
                return SignalOutcome::PermissionDenied;
            }
            self.sent.lock().unwrap().push((pid, signal));
            let dies = match signal {
                StopSignal::Graceful => !process.ignores_graceful,
                StopSignal::Forceful => !process.unkillable,
            };
            if dies {
                live.remove(&pid);
            }
            SignalOutcome::Delivered
        }
    }

    fn terminator(control: FakeControl) -> ProcessTerminator<FakeControl> {
        ProcessTerminator::new(control).with_poll_interval(Duration::from_millis(5))
    }

    const GRACE: Duration = Duration::from_millis(50);
    const KILL: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_graceful_stop_needs_no_kill() {
        let t = terminator(FakeControl::with(&[
            (1, FakeProcess::default()),
            (2, FakeProcess::default()),
        ]));
        let report = t.terminate(&ProcessSet::from([1, 2]), GRACE, KILL).await;
        assert!(report.is_clean());
        assert!(t.control().sent().iter().all(|(_, s)| *s == StopSignal::Graceful));
    }

    #[tokio::test]
    async fn test_survivor_is_killed() {
        let stubborn = FakeProcess {
            ignores_graceful: true,
            ..Default::default()
        };
        let t = terminator(FakeControl::with(&[(1, FakeProcess::default()), (7, stubborn)]));
        let report = t.terminate(&ProcessSet::from([1, 7]), GRACE, KILL).await;
        assert!(report.is_clean());
        assert_eq!(
            t.control().sent(),
            vec![
                (1, StopSignal::Graceful),
                (7, StopSignal::Graceful),
                (7, StopSignal::Forceful),
            ]
        );
    }

    #[tokio::test]
    async fn test_unkillable_is_reported_not_escalated() {
        let zombie_like = FakeProcess {
            ignores_graceful: true,
            unkillable: true,
            ..Default::default()
        };
        let t = terminator(FakeControl::with(&[(9, zombie_like)]));
        let report = t.terminate(&ProcessSet::from([9]), GRACE, KILL).await;
        assert_eq!(report.unreached, ProcessSet::from([9]));
        assert!(report.denied.is_empty());
        assert_eq!(t.control().sent().len(), 2);
    }

    #[tokio::test]
    async fn test_permission_denied_is_skipped() {
        let foreign = FakeProcess {
            denied: true,
            ..Default::default()
        };
        let t = terminator(FakeControl::with(&[(3, foreign), (4, FakeProcess::default())]));
        let report = t.terminate(&ProcessSet::from([3, 4]), GRACE, KILL).await;
        assert_eq!(report.denied, ProcessSet::from([3]));
        assert!(report.unreached.is_empty());
        assert_eq!(report.survivors(), ProcessSet::from([3]));
        assert_eq!(t.control().sent(), vec![(4, StopSignal::Graceful)]);
    }

    #[tokio::test]
    async fn test_termination_is_idempotent() {
        let t = terminator(FakeControl::with(&[(5, FakeProcess::default())]));
        let targets = ProcessSet::from([5, 6]);
        assert!(t.terminate(&targets, GRACE, KILL).await.is_clean());
        assert!(t.terminate(&targets, GRACE, KILL).await.is_clean());
        assert_eq!(t.control().sent(), vec![(5, StopSignal::Graceful)]);
    }

    #[tokio::test]
    async fn test_never_signals_self() {
        let me = platform::current_pid();
        let t = terminator(FakeControl::with(&[(me, FakeProcess::default())]));
        assert!(t.terminate(&ProcessSet::from([me]), GRACE, KILL).await.is_clean());
        assert!(t.control().sent().is_empty());
    }
}
